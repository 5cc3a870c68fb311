pub mod media_sources;
pub mod mock_rendezvous;
pub mod signal_helpers;

pub use media_sources::*;
pub use mock_rendezvous::*;
pub use signal_helpers::*;
