use thiserror::Error;

/// Failures of the rendezvous transport and room membership.
#[derive(Debug, Error)]
pub enum RendezvousError {
    #[error("rendezvous transport error: {0}")]
    Transport(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("join rejected: {0}")]
    Rejected(String),
    #[error("timed out waiting for the join acknowledgment")]
    AckTimeout,
    #[error("not connected to the rendezvous server")]
    NotConnected,
}

/// Failures acquiring or driving local capture devices.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("camera or microphone permission denied")]
    PermissionDenied,
    #[error("no capture device found")]
    DeviceNotFound,
    #[error("media pipeline failure: {0}")]
    Failed(String),
}

/// Failures of offer/answer/candidate application on a peer session.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Rtc(#[from] webrtc::Error),
    #[error("malformed ICE candidate: {0}")]
    BadCandidate(#[from] serde_json::Error),
}

/// The controller-level taxonomy. Each variant maps to a different
/// actionable user-facing message: a camera problem is not a room problem
/// is not a stalled negotiation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("camera or microphone permission denied")]
    CameraDenied,
    #[error("no camera or microphone found")]
    CameraNotFound,
    #[error("media failure: {0}")]
    Media(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("data channel never opened")]
    ChannelNeverOpened,
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("already in a session")]
    AlreadyJoined,
    #[error("not in a session")]
    NotJoined,
    #[error("operation not available for this role")]
    WrongRole,
}

impl From<MediaError> for SessionError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::PermissionDenied => SessionError::CameraDenied,
            MediaError::DeviceNotFound => SessionError::CameraNotFound,
            MediaError::Failed(msg) => SessionError::Media(msg),
        }
    }
}

impl From<RendezvousError> for SessionError {
    fn from(e: RendezvousError) -> Self {
        match e {
            RendezvousError::RoomFull(room) => SessionError::RoomFull(room),
            RendezvousError::AckTimeout => SessionError::Timeout("join acknowledgment"),
            other => SessionError::Network(other.to_string()),
        }
    }
}

impl From<NegotiationError> for SessionError {
    fn from(e: NegotiationError) -> Self {
        SessionError::Negotiation(e.to_string())
    }
}
