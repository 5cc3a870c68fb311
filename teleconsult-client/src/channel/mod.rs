mod app_channel;

pub use app_channel::*;
