mod config;
mod controller;
mod scan;

pub use config::*;
pub use controller::*;
pub use scan::*;
