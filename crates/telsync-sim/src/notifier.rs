// # Simulated Capability Notifier
//
// In-memory implementation of CapabilityNotifier.
//
// `subscribe()` hands out the receiving half of an unbounded channel;
// `push()` feeds events to the subscriber for a line. Dropping a
// subscription closes the channel, which ends the registry's consumer task.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use telsync_core::traits::capability_notifier::{CapabilityNotifier, LineEvent, LineEventStream};
use telsync_core::{Error, LineId};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// In-memory capability notifier
#[derive(Debug, Clone, Default)]
pub struct SimNotifier {
    subscribers: Arc<Mutex<HashMap<LineId, mpsc::UnboundedSender<LineEvent>>>>,
}

impl SimNotifier {
    /// Create a notifier with no subscriptions
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event to the subscriber for a line
    ///
    /// Returns `false` when no live subscription exists, mirroring the real
    /// system's at-most-once delivery to current subscribers.
    pub async fn push(&self, line_id: LineId, event: LineEvent) -> bool {
        let subscribers = self.subscribers.lock().await;
        match subscribers.get(&line_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Number of live subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

#[async_trait]
impl CapabilityNotifier for SimNotifier {
    async fn subscribe(&self, line_id: LineId) -> Result<LineEventStream, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock().await;
        debug!(line = %line_id, "sim notifier subscribe");
        subscribers.insert(line_id, tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn unsubscribe(&self, line_id: LineId) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.remove(&line_id);
    }
}
