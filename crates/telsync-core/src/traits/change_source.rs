// # Change Source Trait
//
// Defines the interface for the aggregated stream of external change
// notifications that drive reconciliation.
//
// ## Registration
//
// `watch()` is the fallible listener-registration step: the surrounding
// system may not be ready to hand out notifications yet. The registry
// retries failed registrations with exponential backoff on a dedicated
// task, and keeps serving accounts in the meantime.

use crate::account::{LineId, UserId};
use crate::traits::line_provider::ServiceState;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// An external change notification, already translated into core vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A subscription was added, removed, or modified
    LineSetChanged,

    /// Voice service state changed
    ServiceStateChanged(ServiceState),

    /// The active data line moved (temporary data switch)
    ActiveDataLineChanged(LineId),

    /// The foreground user switched
    UserSwitched(UserId),

    /// Device locale changed
    LocaleChanged,

    /// The network-reported country changed
    NetworkCountryChanged,

    /// Carrier configuration for one line changed
    CarrierConfigChanged(LineId),

    /// The system-wide RTT setting was toggled
    RttSettingChanged,

    /// The contact-discovery (presence) setting was toggled
    ContactDiscoverySettingChanged,
}

/// Stream of change events
pub type ChangeEventStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send + 'static>>;

/// Trait for the aggregated change-notification collaborator
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Register for change notifications
    ///
    /// # Errors
    ///
    /// Fails when the underlying notification system is not yet available.
    /// Safe to call again after a failure; the stream from the successful
    /// call is the only one consumed.
    async fn watch(&self) -> Result<ChangeEventStream, crate::Error>;
}
