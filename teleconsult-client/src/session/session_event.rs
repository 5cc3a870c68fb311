use crate::session::NegotiationState;
use bytes::Bytes;
use std::sync::Arc;
use webrtc::data_channel::RTCDataChannel;
use webrtc::track::track_remote::TrackRemote;

/// Events a peer session pushes into the controller's loop. Callbacks fire
/// on the transport's own tasks and may interleave in any order.
pub enum SessionEvent {
    StateChanged(NegotiationState),
    /// A data channel reached `open`, whether created locally or offered by
    /// the remote side.
    DataChannelOpened(Arc<RTCDataChannel>),
    /// Raw inbound frame from the data channel, in delivery order.
    ChannelMessage(Bytes),
    /// A remote media track arrived.
    RemoteTrack(Arc<TrackRemote>),
    /// Locally gathered candidate, JSON-encoded for the relay.
    CandidateGenerated(String),
}
