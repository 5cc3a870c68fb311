mod candidate_buffer;
mod peer_session;
mod session_event;

pub use candidate_buffer::*;
pub use peer_session::*;
pub use session_event::*;
