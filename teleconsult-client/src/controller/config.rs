use std::time::Duration;
use teleconsult_core::IceServerConfig;

/// Session tuning knobs. The timeouts bound waits, they are not protocol
/// invariants; adjust per deployment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rendezvous_url: String,
    pub auth_token: Option<String>,
    pub ice_servers: Vec<IceServerConfig>,
    /// Wait for the relay to acknowledge a join.
    pub join_ack_timeout: Duration,
    /// Wait for the data channel to open before a send fails.
    pub channel_open_timeout: Duration,
    /// Wait for remote media after the transport connects, before recovery
    /// kicks in.
    pub remote_media_timeout: Duration,
    /// Wait for scan results after a scan request.
    pub scan_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rendezvous_url: "ws://127.0.0.1:8443/ws".to_string(),
            auth_token: None,
            ice_servers: Vec::new(),
            join_ack_timeout: Duration::from_secs(10),
            channel_open_timeout: Duration::from_secs(15),
            remote_media_timeout: Duration::from_secs(30),
            scan_timeout: Duration::from_secs(120),
        }
    }
}
