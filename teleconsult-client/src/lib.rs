pub mod channel;
pub mod controller;
pub mod error;
pub mod media;
pub mod session;
pub mod signaling;

pub use channel::*;
pub use controller::*;
pub use error::*;
pub use media::*;
pub use session::*;
pub use signaling::*;
