mod rendezvous;
mod ws_rendezvous;

pub use rendezvous::*;
pub use ws_rendezvous::*;
