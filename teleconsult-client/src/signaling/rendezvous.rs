use crate::error::RendezvousError;
use async_trait::async_trait;
use teleconsult_core::{JoinAck, PeerRole, RoomCode};
use tokio::sync::mpsc;

/// Everything the relay can tell a client after it has joined a room.
#[derive(Debug, Clone)]
pub enum RendezvousEvent {
    Connected,
    Disconnected(String),
    PeerJoined { role: PeerRole },
    PeerLeft,
    Offer(String),
    Answer(String),
    /// JSON-encoded candidate-init, relayed opaquely.
    Candidate(String),
}

/// The seam between the session layer and the relay server. The controller
/// takes any implementation; tests substitute an in-process pair.
#[async_trait]
pub trait Rendezvous: Send + Sync {
    /// Idempotent: a no-op when the connection is already up.
    async fn connect(&self) -> Result<(), RendezvousError>;

    /// Request to join; the ack carries the confirmed role and occupancy.
    /// Bounded by the implementation's ack timeout.
    async fn join(&self, room: &RoomCode, role: PeerRole) -> Result<JoinAck, RendezvousError>;

    /// Fire-and-forget; must never block the caller.
    fn leave(&self, room: &RoomCode);

    async fn send_offer(&self, room: &RoomCode, sdp: String);

    async fn send_answer(&self, room: &RoomCode, sdp: String);

    async fn send_candidate(&self, room: &RoomCode, candidate: String);

    /// Single consumer. Returns `None` once the stream has been taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<RendezvousEvent>>;
}
