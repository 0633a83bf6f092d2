// # Simulated Change Source
//
// In-memory implementation of ChangeSource.
//
// `push()` injects change events; `watch()` hands out the single consuming
// stream. A configurable number of leading `watch()` failures simulates the
// surrounding system coming up after the controller, which exercises the
// registry's listener-registration backoff.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use telsync_core::traits::change_source::{ChangeEvent, ChangeEventStream, ChangeSource};
use telsync_core::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// In-memory change source
#[derive(Clone)]
pub struct SimChangeSource {
    sender: mpsc::UnboundedSender<ChangeEvent>,
    receiver: Arc<Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>>,
    /// Remaining `watch()` calls that will fail
    failures_left: Arc<AtomicUsize>,
}

impl SimChangeSource {
    /// Create a source whose first `watch()` succeeds
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    /// Create a source whose first `attempts` watch calls fail
    pub fn failing_first(attempts: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: tx,
            receiver: Arc::new(Mutex::new(Some(rx))),
            failures_left: Arc::new(AtomicUsize::new(attempts)),
        }
    }

    /// Inject a change event
    ///
    /// Events pushed before a successful `watch()` are buffered and
    /// delivered once the stream is consumed.
    pub fn push(&self, event: ChangeEvent) {
        // Send only fails when the stream was dropped, which the sim treats
        // as "nobody listening".
        let _ = self.sender.send(event);
    }
}

impl Default for SimChangeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeSource for SimChangeSource {
    async fn watch(&self) -> Result<ChangeEventStream, Error> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            debug!("sim change source not ready yet");
            return Err(Error::listener("notification system unavailable"));
        }
        let mut receiver = self.receiver.lock().await;
        match receiver.take() {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(Error::listener("change stream already consumed")),
        }
    }
}
