use crate::model::peer::PeerRole;
use crate::model::room::RoomCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Signals a client sends to the rendezvous relay. The relay interprets
/// `join`/`leave` for room bookkeeping and forwards everything else verbatim
/// to the other room occupant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientSignal {
    #[serde(rename_all = "camelCase")]
    Join { room_id: RoomCode, role: PeerRole },
    #[serde(rename_all = "camelCase")]
    Leave { room_id: RoomCode },
    #[serde(rename_all = "camelCase")]
    Offer { room_id: RoomCode, sdp: String },
    #[serde(rename_all = "camelCase")]
    Answer { room_id: RoomCode, sdp: String },
    /// `candidate` is the JSON-encoded candidate-init, relayed opaquely.
    #[serde(rename_all = "camelCase")]
    IceCandidate { room_id: RoomCode, candidate: String },
}

/// Acknowledgment of a `join` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<PeerRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Signals the relay delivers to a client: the join acknowledgment, room
/// membership events, and the other occupant's relayed negotiation messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerSignal {
    JoinAck(JoinAck),
    #[serde(rename_all = "camelCase")]
    PeerJoined { socket_id: String, role: PeerRole },
    PeerLeft,
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate { candidate: String },
}
