use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Events posted by the embedded facial-scan provider flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanProviderEvent {
    AnalysisStarted,
    /// Terminal result payload, forwarded verbatim over the data channel.
    AnalysisFinished(Value),
    AnalysisFailed(String),
}

/// Explicit subscription point for scan-provider events. The embedding
/// layer publishes what the provider posts; each subscriber holds a
/// [`ScanSubscription`] that unsubscribes itself on drop, so no listener
/// outlives its owner.
#[derive(Default)]
pub struct ScanEventHub {
    subscribers: Arc<DashMap<u64, mpsc::UnboundedSender<ScanProviderEvent>>>,
    next_id: AtomicU64,
}

impl ScanEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ScanSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        ScanSubscription {
            id,
            rx,
            registry: Arc::clone(&self.subscribers),
        }
    }

    pub fn publish(&self, event: ScanProviderEvent) {
        self.subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Map a raw provider action. Actions this build does not recognize are
    /// ignored, mirroring the unknown-message tolerance of the data channel.
    pub fn publish_action(&self, action: &str, payload: Option<Value>) {
        let event = match action {
            "onAnalysisStart" => ScanProviderEvent::AnalysisStarted,
            "onHealthAnalysisFinished" => {
                ScanProviderEvent::AnalysisFinished(payload.unwrap_or(Value::Null))
            }
            "failedToGetHealthAnalysisResult" => {
                let reason = payload
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or("scan provider reported a failure")
                    .to_string();
                ScanProviderEvent::AnalysisFailed(reason)
            }
            other => {
                debug!("ignoring scan provider action {other:?}");
                return;
            }
        };
        self.publish(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

pub struct ScanSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ScanProviderEvent>,
    registry: Arc<DashMap<u64, mpsc::UnboundedSender<ScanProviderEvent>>>,
}

impl ScanSubscription {
    pub async fn recv(&mut self) -> Option<ScanProviderEvent> {
        self.rx.recv().await
    }
}

impl Drop for ScanSubscription {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
