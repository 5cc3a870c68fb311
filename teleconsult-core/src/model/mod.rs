mod app_message;
mod peer;
mod room;
mod signaling;

pub use app_message::*;
pub use peer::*;
pub use room::*;
pub use signaling::*;
