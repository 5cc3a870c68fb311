use crate::error::{MediaError, NegotiationError};
use crate::media::{LocalTrackSet, MediaSource};
use crate::session::PeerSession;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Snapshot of the remote party's media. Replaced wholesale on every track
/// arrival; never patched in place, so a reader holding one never sees a
/// half-updated mix.
#[derive(Clone)]
pub struct RemoteStream {
    pub stream_id: String,
    pub tracks: Vec<Arc<TrackRemote>>,
}

/// Owns the local capture set for the session lifetime and the slot holding
/// the latest remote stream snapshot.
pub struct MediaPipeline {
    source: Arc<dyn MediaSource>,
    local: Mutex<Option<LocalTrackSet>>,
    remote: StdMutex<Option<Arc<RemoteStream>>>,
}

impl MediaPipeline {
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self {
            source,
            local: Mutex::new(None),
            remote: StdMutex::new(None),
        }
    }

    /// Idempotent: a second acquire keeps the existing track set.
    pub async fn acquire(&self) -> Result<(), MediaError> {
        let mut local = self.local.lock().await;
        if local.is_some() {
            return Ok(());
        }
        *local = Some(self.source.acquire().await?);
        info!("local media acquired");
        Ok(())
    }

    /// Attach the local tracks to a session, before its description work so
    /// they land in the offer or answer.
    pub async fn bind(&self, session: &PeerSession) -> Result<(), NegotiationError> {
        let local = self.local.lock().await;
        let Some(set) = local.as_ref() else {
            return Ok(());
        };
        let audio: Arc<dyn TrackLocal + Send + Sync> = set.audio.clone();
        let video: Arc<dyn TrackLocal + Send + Sync> = set.video.clone();
        session.add_track(audio).await?;
        session.add_track(video).await?;
        Ok(())
    }

    /// Stops and releases the local tracks. Only the first call does
    /// anything.
    pub async fn stop(&self) {
        let mut local = self.local.lock().await;
        if let Some(set) = local.take() {
            if set.stop() {
                info!("local media stopped");
            }
        }
    }

    pub async fn set_enabled(&self, on: bool) -> bool {
        let local = self.local.lock().await;
        if let Some(set) = local.as_ref() {
            set.set_enabled(on);
            on
        } else {
            false
        }
    }

    pub async fn toggle(&self) -> bool {
        let local = self.local.lock().await;
        match local.as_ref() {
            Some(set) => {
                let next = !set.is_enabled();
                set.set_enabled(next);
                next
            }
            None => false,
        }
    }

    pub async fn is_enabled(&self) -> bool {
        self.local
            .lock()
            .await
            .as_ref()
            .is_some_and(LocalTrackSet::is_enabled)
    }

    /// Fold a newly arrived remote track into the slot. The slot is swapped
    /// as a whole: a new stream id replaces everything, a track for the
    /// current stream produces a fresh snapshot with it appended.
    pub fn on_remote_track(&self, track: Arc<TrackRemote>) {
        let stream_id = track.stream_id();
        let mut slot = self.remote.lock().unwrap();
        let next = match slot.as_ref() {
            Some(current) if current.stream_id == stream_id => {
                let mut tracks = current.tracks.clone();
                tracks.push(track);
                RemoteStream { stream_id, tracks }
            }
            _ => RemoteStream {
                stream_id,
                tracks: vec![track],
            },
        };
        debug!(
            "remote stream {} now has {} track(s)",
            next.stream_id,
            next.tracks.len()
        );
        *slot = Some(Arc::new(next));
    }

    pub fn clear_remote(&self) {
        *self.remote.lock().unwrap() = None;
    }

    /// Latest remote snapshot, or `None` when the peer is gone.
    pub fn remote(&self) -> Option<Arc<RemoteStream>> {
        self.remote.lock().unwrap().clone()
    }
}
