use crate::error::SessionError;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use teleconsult_core::AppMessage;
use tokio::sync::watch;
use tracing::{debug, warn};
use webrtc::data_channel::RTCDataChannel;

/// Outbound side of the clinical-event channel. Messages sent before the
/// channel opens are queued and flushed, in order, the moment it does; a
/// fresh channel instance after renegotiation starts from an open event
/// again, so consumers treat every open as a reset point.
pub struct AppChannel {
    dc: StdMutex<Option<Arc<RTCDataChannel>>>,
    queue: StdMutex<Vec<AppMessage>>,
    open_tx: watch::Sender<bool>,
    open_rx: watch::Receiver<bool>,
}

impl Default for AppChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AppChannel {
    pub fn new() -> Self {
        let (open_tx, open_rx) = watch::channel(false);
        Self {
            dc: StdMutex::new(None),
            queue: StdMutex::new(Vec::new()),
            open_tx,
            open_rx,
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open_rx.borrow()
    }

    /// A channel instance reached `open`. Flushes everything queued so far,
    /// in send order, ahead of any later send.
    pub async fn attach(&self, dc: Arc<RTCDataChannel>) {
        let queued: Vec<AppMessage> = {
            *self.dc.lock().unwrap() = Some(Arc::clone(&dc));
            let mut queue = self.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        for msg in queued {
            Self::transmit(&dc, &msg).await;
        }
        let _ = self.open_tx.send(true);
    }

    /// The channel is gone (peer left, session closed). Queued messages are
    /// discarded rather than resent into a dead channel.
    pub fn detach(&self) {
        *self.dc.lock().unwrap() = None;
        self.queue.lock().unwrap().clear();
        let _ = self.open_tx.send(false);
    }

    /// Send when open; queue with a logged warning when not.
    pub async fn send(&self, msg: AppMessage) {
        let dc = self.dc.lock().unwrap().clone();
        match dc {
            Some(dc) if self.is_open() => Self::transmit(&dc, &msg).await,
            _ => {
                warn!("data channel not open yet, queueing message");
                self.queue.lock().unwrap().push(msg);
            }
        }
    }

    async fn transmit(dc: &Arc<RTCDataChannel>, msg: &AppMessage) {
        let json = match msg.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to encode app message: {e}");
                return;
            }
        };
        if let Err(e) = dc.send_text(json).await {
            warn!("failed to send app message: {e}");
        }
    }

    /// Bounded wait for the channel to open; elapses to a distinct error so
    /// callers can tell "never opened" from a peer that never responded.
    pub async fn wait_open(&self, timeout: Duration) -> Result<(), SessionError> {
        let mut rx = self.open_rx.clone();
        tokio::time::timeout(timeout, rx.wait_for(|open| *open))
            .await
            .map_err(|_| SessionError::ChannelNeverOpened)?
            .map_err(|_| SessionError::ChannelNeverOpened)?;
        Ok(())
    }

    /// Receive contract: parse, recognize, dispatch. Parse failures and
    /// unknown types are logged and dropped, never fatal.
    pub fn decode(data: &[u8]) -> Option<AppMessage> {
        let text = std::str::from_utf8(data)
            .map_err(|e| warn!("non-utf8 frame on data channel: {e}"))
            .ok()?;
        match AppMessage::decode(text) {
            Ok(AppMessage::Unknown) => {
                debug!("unknown app message type, ignoring");
                None
            }
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!("malformed app message, dropping: {e}");
                None
            }
        }
    }
}
