use crate::error::MediaError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// The local capture pair for one session. Owned by the media pipeline;
/// nothing else stops or mutates these tracks.
pub struct LocalTrackSet {
    pub audio: Arc<TrackLocalStaticSample>,
    pub video: Arc<TrackLocalStaticSample>,
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl LocalTrackSet {
    pub fn new(audio: Arc<TrackLocalStaticSample>, video: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            audio,
            video,
            enabled: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns `true` the first time only; capture pumps shut down on the
    /// next tick.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn handles(&self) -> (Arc<AtomicBool>, Arc<AtomicBool>) {
        (Arc::clone(&self.enabled), Arc::clone(&self.stopped))
    }
}

/// Where local media comes from. Device capture backends implement this;
/// acquisition may suspend on a user permission prompt and reports
/// permission and missing-device failures as distinct errors.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<LocalTrackSet, MediaError>;
}

/// In-tree source pumping silence and black frames. Stands in for device
/// capture in development and tests.
#[derive(Debug, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaSource for SyntheticSource {
    async fn acquire(&self) -> Result<LocalTrackSet, MediaError> {
        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                ..Default::default()
            },
            "video".to_owned(),
            "teleconsult".to_owned(),
        ));
        let audio = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            "teleconsult".to_owned(),
        ));

        let set = LocalTrackSet::new(audio, video);
        spawn_pump(
            Arc::clone(&set.video),
            Duration::from_millis(33),
            vec![0u8; 1024],
            set.handles(),
        );
        spawn_pump(
            Arc::clone(&set.audio),
            Duration::from_millis(20),
            vec![0u8; 160],
            set.handles(),
        );
        Ok(set)
    }
}

fn spawn_pump(
    track: Arc<TrackLocalStaticSample>,
    tick: Duration,
    frame: Vec<u8>,
    (enabled, stopped): (Arc<AtomicBool>, Arc<AtomicBool>),
) {
    tokio::spawn(async move {
        let data = Bytes::from(frame);
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            if stopped.load(Ordering::SeqCst) {
                debug!("capture pump for {} stopped", track.id());
                break;
            }
            if !enabled.load(Ordering::SeqCst) {
                continue;
            }
            let sample = Sample {
                data: data.clone(),
                duration: tick,
                ..Default::default()
            };
            // Writes on an unbound track are a no-op; errors here only mean
            // the transport went away under us.
            let _ = track.write_sample(&sample).await;
        }
    });
}
