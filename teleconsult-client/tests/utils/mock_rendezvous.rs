use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use teleconsult_client::{Rendezvous, RendezvousError, RendezvousEvent};
use teleconsult_core::{JoinAck, PeerRole, RoomCode};
use tokio::sync::mpsc;

struct Occupant {
    id: u64,
    tx: mpsc::UnboundedSender<RendezvousEvent>,
}

/// In-process stand-in for the relay server: room bookkeeping plus verbatim
/// forwarding to the other occupant, nothing more.
#[derive(Default, Clone)]
pub struct MockRelay {
    rooms: Arc<DashMap<String, Vec<Occupant>>>,
    next_id: Arc<AtomicU64>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> Arc<MockRendezvous> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Arc::new(MockRendezvous {
            relay: self.clone(),
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            event_tx,
            event_rx: StdMutex::new(Some(event_rx)),
        })
    }
}

/// One client's view of the mock relay.
pub struct MockRendezvous {
    relay: MockRelay,
    id: u64,
    event_tx: mpsc::UnboundedSender<RendezvousEvent>,
    event_rx: StdMutex<Option<mpsc::UnboundedReceiver<RendezvousEvent>>>,
}

impl MockRendezvous {
    fn to_other(&self, room: &RoomCode, event: RendezvousEvent) {
        if let Some(entry) = self.relay.rooms.get(room.as_str()) {
            for other in entry.iter().filter(|o| o.id != self.id) {
                let _ = other.tx.send(event.clone());
            }
        }
    }
}

#[async_trait]
impl Rendezvous for MockRendezvous {
    async fn connect(&self) -> Result<(), RendezvousError> {
        Ok(())
    }

    async fn join(&self, room: &RoomCode, role: PeerRole) -> Result<JoinAck, RendezvousError> {
        let mut entry = self.relay.rooms.entry(room.to_string()).or_default();
        if entry.len() >= 2 {
            return Err(RendezvousError::RoomFull(room.to_string()));
        }
        for other in entry.iter() {
            let _ = other.tx.send(RendezvousEvent::PeerJoined { role });
        }
        entry.push(Occupant {
            id: self.id,
            tx: self.event_tx.clone(),
        });
        Ok(JoinAck {
            ok: true,
            role: Some(role),
            participant_count: Some(entry.len() as u8),
            error: None,
        })
    }

    fn leave(&self, room: &RoomCode) {
        if let Some(mut entry) = self.relay.rooms.get_mut(room.as_str()) {
            let before = entry.len();
            entry.retain(|o| o.id != self.id);
            if entry.len() < before {
                for other in entry.iter() {
                    let _ = other.tx.send(RendezvousEvent::PeerLeft);
                }
            }
        }
    }

    async fn send_offer(&self, room: &RoomCode, sdp: String) {
        self.to_other(room, RendezvousEvent::Offer(sdp));
    }

    async fn send_answer(&self, room: &RoomCode, sdp: String) {
        self.to_other(room, RendezvousEvent::Answer(sdp));
    }

    async fn send_candidate(&self, room: &RoomCode, candidate: String) {
        self.to_other(room, RendezvousEvent::Candidate(candidate));
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RendezvousEvent>> {
        self.event_rx.lock().unwrap().take()
    }
}

/// A rendezvous endpoint whose server is unreachable.
pub struct UnreachableRendezvous;

#[async_trait]
impl Rendezvous for UnreachableRendezvous {
    async fn connect(&self) -> Result<(), RendezvousError> {
        Err(RendezvousError::Transport("connection refused".to_string()))
    }

    async fn join(&self, _room: &RoomCode, _role: PeerRole) -> Result<JoinAck, RendezvousError> {
        Err(RendezvousError::NotConnected)
    }

    fn leave(&self, _room: &RoomCode) {}

    async fn send_offer(&self, _room: &RoomCode, _sdp: String) {}

    async fn send_answer(&self, _room: &RoomCode, _sdp: String) {}

    async fn send_candidate(&self, _room: &RoomCode, _candidate: String) {}

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RendezvousEvent>> {
        None
    }
}
