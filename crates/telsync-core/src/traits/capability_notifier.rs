// # Capability Notifier Trait
//
// Defines the interface for per-line capability push notifications.
//
// ## Design
//
// Each subscription yields a stream of typed [`LineEvent`]s rather than a
// callback object. The registry owns the consuming task, which re-checks
// entry membership under the collection lock before applying any event, so
// a late event for a torn-down entry is a no-op.

use crate::account::LineId;
use crate::traits::line_provider::ImsRegState;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::pin::Pin;
use tokio_stream::Stream;

/// A per-line capability notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// MMTEL capability status changed
    CapabilityStatus {
        /// Whether video calling is currently available
        video_capable: bool,
        /// Whether call composer is currently available
        call_composer_capable: bool,
    },

    /// IMS registration state changed
    RegistrationState(ImsRegState),

    /// The set of lines this line supports simultaneous calling with changed
    SimultaneousCalling(BTreeSet<LineId>),
}

/// Stream of per-line capability events
pub type LineEventStream = Pin<Box<dyn Stream<Item = LineEvent> + Send + 'static>>;

/// Trait for the per-line capability notification collaborator
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait CapabilityNotifier: Send + Sync {
    /// Subscribe to capability events for one line
    ///
    /// # Errors
    ///
    /// Fails when the notification system is unavailable or the line id has
    /// no stable identity to subscribe against. Callers treat a failure as
    /// "no further automatic capability updates for this line" rather than a
    /// fatal condition.
    async fn subscribe(&self, line_id: LineId) -> Result<LineEventStream, crate::Error>;

    /// Drop the subscription for one line
    ///
    /// Idempotent; unsubscribing a line that was never subscribed is a no-op.
    /// Dropping the event stream has the same effect, but teardown calls this
    /// explicitly so the collaborator can release per-line state promptly.
    async fn unsubscribe(&self, line_id: LineId);
}
