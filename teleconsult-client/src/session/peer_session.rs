use crate::error::NegotiationError;
use crate::session::{CandidateBuffer, SessionEvent};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use teleconsult_core::IceServerConfig;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::track::track_local::TrackLocal;

pub const DATA_CHANNEL_LABEL: &str = "consult-events";

/// Lifecycle of one negotiated connection attempt. `Closed` and `Failed`
/// are terminal for the instance; a fresh `PeerSession` is constructed for
/// any subsequent attempt so no negotiation state carries over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    Negotiating,
    Connected,
    Failed,
    Closed,
}

/// One peer connection attempt: owns the transport, generates and applies
/// session descriptions, and exchanges candidates. Remote candidates that
/// beat the remote description are buffered and replayed in arrival order.
pub struct PeerSession {
    pc: Arc<RTCPeerConnection>,
    state: Arc<StdMutex<NegotiationState>>,
    candidates: StdMutex<CandidateBuffer>,
    event_tx: mpsc::Sender<SessionEvent>,
    closed: Arc<AtomicBool>,
}

impl PeerSession {
    pub async fn new(
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Result<Self, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);
        let state = Arc::new(StdMutex::new(NegotiationState::Negotiating));
        let closed = Arc::new(AtomicBool::new(false));

        let state_tx = event_tx.clone();
        let state_slot = Arc::clone(&state);
        let closed_flag = Arc::clone(&closed);
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            let slot = Arc::clone(&state_slot);
            let closed = Arc::clone(&closed_flag);
            Box::pin(async move {
                info!("peer connection state: {s}");
                if closed.load(Ordering::SeqCst) {
                    return;
                }
                let mapped = match s {
                    RTCPeerConnectionState::Connected => NegotiationState::Connected,
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
                        NegotiationState::Failed
                    }
                    _ => return,
                };
                Self::transition(&slot, &tx, mapped).await;
            })
        }));

        let ice_tx = event_tx.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(json) = serde_json::to_string(&init) else {
                    return;
                };
                let _ = tx.send(SessionEvent::CandidateGenerated(json)).await;
            })
        }));

        // The offering side creates the channel itself; the answering side
        // receives it here. Either way the wiring is identical.
        let dc_tx = event_tx.clone();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            Box::pin(async move {
                debug!("data channel offered by remote: {:?}", dc.label());
                Self::wire_data_channel(&dc, tx);
            })
        }));

        let track_tx = event_tx.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            Box::pin(async move {
                debug!(
                    "remote track arrived: {} ({})",
                    track.id(),
                    track.kind()
                );
                let _ = tx.send(SessionEvent::RemoteTrack(track)).await;
            })
        }));

        Ok(Self {
            pc,
            state,
            candidates: StdMutex::new(CandidateBuffer::new()),
            event_tx,
            closed,
        })
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.lock().unwrap()
    }

    async fn transition(
        slot: &Arc<StdMutex<NegotiationState>>,
        tx: &mpsc::Sender<SessionEvent>,
        next: NegotiationState,
    ) {
        {
            let mut state = slot.lock().unwrap();
            if *state == next {
                return;
            }
            *state = next;
        }
        let _ = tx.send(SessionEvent::StateChanged(next)).await;
    }

    fn wire_data_channel(dc: &Arc<RTCDataChannel>, tx: mpsc::Sender<SessionEvent>) {
        let open_tx = tx.clone();
        let dc_open = Arc::clone(dc);
        dc.on_open(Box::new(move || {
            let tx = open_tx.clone();
            let dc = Arc::clone(&dc_open);
            Box::pin(async move {
                info!("data channel open: {:?}", dc.label());
                let _ = tx.send(SessionEvent::DataChannelOpened(dc)).await;
            })
        }));

        let msg_tx = tx;
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let tx = msg_tx.clone();
            Box::pin(async move {
                let bytes = Bytes::from(msg.data.to_vec());
                let _ = tx.send(SessionEvent::ChannelMessage(bytes)).await;
            })
        }));
    }

    /// Attach a local track before the description exchange so it lands in
    /// the offer/answer.
    pub async fn add_track(
        &self,
        track: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Result<(), NegotiationError> {
        let sender = self.pc.add_track(track).await?;
        // Drain RTCP for this sender so the interceptors keep flowing.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
        Ok(())
    }

    /// Initiator path: optionally create the data channel, then produce the
    /// local offer.
    pub async fn start_offer(&self, with_data_channel: bool) -> Result<String, NegotiationError> {
        if with_data_channel {
            let init = RTCDataChannelInit {
                ordered: Some(true),
                ..Default::default()
            };
            let dc = self.pc.create_data_channel(DATA_CHANNEL_LABEL, Some(init)).await?;
            Self::wire_data_channel(&dc, self.event_tx.clone());
        }

        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Self::transition(&self.state, &self.event_tx, NegotiationState::Negotiating).await;
        Ok(offer.sdp)
    }

    /// Re-run the exchange on a live session to recover a stalled path.
    /// Distinct from teardown-and-rebuild: the session object survives.
    pub async fn restart_ice(&self) -> Result<String, NegotiationError> {
        let options = RTCOfferOptions {
            ice_restart: true,
            ..Default::default()
        };
        let offer = self.pc.create_offer(Some(options)).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Self::transition(&self.state, &self.event_tx, NegotiationState::Negotiating).await;
        Ok(offer.sdp)
    }

    /// Responder path: apply the remote offer, release any candidates that
    /// arrived ahead of it, and produce the local answer.
    pub async fn accept_offer(&self, sdp: String) -> Result<String, NegotiationError> {
        Self::transition(&self.state, &self.event_tx, NegotiationState::Negotiating).await;
        let offer = RTCSessionDescription::offer(sdp)?;
        self.pc.set_remote_description(offer).await?;
        self.flush_candidates().await;

        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(answer.sdp)
    }

    /// Initiator path, step two: the remote answer arrived.
    pub async fn apply_answer(&self, sdp: String) -> Result<(), NegotiationError> {
        let answer = RTCSessionDescription::answer(sdp)?;
        self.pc.set_remote_description(answer).await?;
        self.flush_candidates().await;
        Ok(())
    }

    /// Apply a relayed candidate, or buffer it when the remote description
    /// has not been set yet.
    pub async fn add_remote_candidate(&self, candidate_json: String) -> Result<(), NegotiationError> {
        let ready = self.candidates.lock().unwrap().offer(candidate_json);
        match ready {
            Some(json) => self.apply_candidate(json).await,
            None => {
                debug!("candidate arrived before remote description, buffered");
                Ok(())
            }
        }
    }

    async fn flush_candidates(&self) {
        let drained = self
            .candidates
            .lock()
            .unwrap()
            .mark_remote_description_set();
        for json in drained {
            if let Err(e) = self.apply_candidate(json).await {
                warn!("failed to apply buffered candidate: {e}");
            }
        }
    }

    async fn apply_candidate(&self, json: String) -> Result<(), NegotiationError> {
        let init: RTCIceCandidateInit = serde_json::from_str(&json)?;
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    /// Terminal for this instance. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        Self::transition(&self.state, &self.event_tx, NegotiationState::Closed).await;
        if let Err(e) = self.pc.close().await {
            warn!("error closing peer connection: {e}");
        }
    }
}
