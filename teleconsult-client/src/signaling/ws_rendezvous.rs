use crate::error::RendezvousError;
use crate::signaling::{Rendezvous, RendezvousEvent};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use teleconsult_core::{ClientSignal, JoinAck, PeerRole, RoomCode, ServerSignal};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket rendezvous client. One persistent connection; `join`/`leave`
/// are interpreted by the relay, everything else is forwarded verbatim to
/// the other room occupant.
pub struct WsRendezvous {
    url: String,
    connected: AtomicBool,
    outbound: StdMutex<Option<mpsc::UnboundedSender<Message>>>,
    event_tx: mpsc::UnboundedSender<RendezvousEvent>,
    event_rx: StdMutex<Option<mpsc::UnboundedReceiver<RendezvousEvent>>>,
    pending_ack: Arc<StdMutex<Option<oneshot::Sender<JoinAck>>>>,
    ack_timeout: Duration,
}

impl WsRendezvous {
    pub fn new(url: impl Into<String>, auth_token: Option<&str>) -> Self {
        let mut url = url.into();
        if let Some(token) = auth_token {
            let sep = if url.contains('?') { '&' } else { '?' };
            url = format!("{url}{sep}token={token}");
        }
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            url,
            connected: AtomicBool::new(false),
            outbound: StdMutex::new(None),
            event_tx,
            event_rx: StdMutex::new(Some(event_rx)),
            pending_ack: Arc::new(StdMutex::new(None)),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    fn send_signal(&self, signal: &ClientSignal) {
        let Ok(json) = serde_json::to_string(signal) else {
            warn!("failed to serialize client signal");
            return;
        };
        let outbound = self.outbound.lock().unwrap();
        match outbound.as_ref() {
            Some(tx) => {
                if tx.send(Message::Text(json)).is_err() {
                    warn!("rendezvous writer is gone, dropping signal");
                }
            }
            None => warn!("not connected to rendezvous server, dropping signal"),
        }
    }
}

#[async_trait]
impl Rendezvous for WsRendezvous {
    async fn connect(&self) -> Result<(), RendezvousError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (stream, _) = match connect_async(self.url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(RendezvousError::Transport(e.to_string()));
            }
        };
        info!("rendezvous connection established");

        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound.lock().unwrap() = Some(out_tx);

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let _ = self.event_tx.send(RendezvousEvent::Connected);

        // Reader task: decode server signals, route the join ack to the
        // pending join call, forward the rest as events. Malformed frames
        // are logged and dropped.
        let event_tx = self.event_tx.clone();
        let pending_ack = Arc::clone(&self.pending_ack);
        tokio::spawn(async move {
            let mut reason = "connection closed by server".to_string();
            while let Some(frame) = source.next().await {
                let msg = match frame {
                    Ok(m) => m,
                    Err(e) => {
                        reason = e.to_string();
                        break;
                    }
                };
                let text = match msg {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let signal: ServerSignal = match serde_json::from_str(&text) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("malformed server signal, dropping: {e}");
                        continue;
                    }
                };
                let event = match signal {
                    ServerSignal::JoinAck(ack) => {
                        match pending_ack.lock().unwrap().take() {
                            Some(tx) => {
                                let _ = tx.send(ack);
                            }
                            None => warn!("unsolicited join ack, dropping"),
                        }
                        continue;
                    }
                    ServerSignal::PeerJoined { role, .. } => RendezvousEvent::PeerJoined { role },
                    ServerSignal::PeerLeft => RendezvousEvent::PeerLeft,
                    ServerSignal::Offer { sdp } => RendezvousEvent::Offer(sdp),
                    ServerSignal::Answer { sdp } => RendezvousEvent::Answer(sdp),
                    ServerSignal::IceCandidate { candidate } => RendezvousEvent::Candidate(candidate),
                };
                if event_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = event_tx.send(RendezvousEvent::Disconnected(reason));
        });

        Ok(())
    }

    async fn join(&self, room: &RoomCode, role: PeerRole) -> Result<JoinAck, RendezvousError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RendezvousError::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        *self.pending_ack.lock().unwrap() = Some(tx);

        self.send_signal(&ClientSignal::Join {
            room_id: room.clone(),
            role,
        });

        let ack = match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(ack)) => ack,
            Ok(Err(_)) => return Err(RendezvousError::Transport("ack channel dropped".into())),
            Err(_) => {
                *self.pending_ack.lock().unwrap() = None;
                return Err(RendezvousError::AckTimeout);
            }
        };

        if ack.ok {
            return Ok(ack);
        }
        let reason = ack.error.unwrap_or_else(|| "join refused".to_string());
        if reason.to_ascii_lowercase().contains("full") {
            Err(RendezvousError::RoomFull(room.to_string()))
        } else {
            Err(RendezvousError::Rejected(reason))
        }
    }

    fn leave(&self, room: &RoomCode) {
        self.send_signal(&ClientSignal::Leave {
            room_id: room.clone(),
        });
    }

    async fn send_offer(&self, room: &RoomCode, sdp: String) {
        self.send_signal(&ClientSignal::Offer {
            room_id: room.clone(),
            sdp,
        });
    }

    async fn send_answer(&self, room: &RoomCode, sdp: String) {
        self.send_signal(&ClientSignal::Answer {
            room_id: room.clone(),
            sdp,
        });
    }

    async fn send_candidate(&self, room: &RoomCode, candidate: String) {
        self.send_signal(&ClientSignal::IceCandidate {
            room_id: room.clone(),
            candidate,
        });
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RendezvousEvent>> {
        self.event_rx.lock().unwrap().take()
    }
}
