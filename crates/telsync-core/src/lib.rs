// # telsync-core
//
// Core library for the eventually-consistent telephony account registry.
//
// ## Architecture Overview
//
// This library keeps the set of externally published calling accounts
// consistent with the device's current set of lines:
// - **LineProvider**: Trait for enumerating lines and subscription records
// - **AccountAuthority**: Trait for the external registration authority
// - **CapabilityNotifier**: Trait for per-line capability push notifications
// - **ChangeSource**: Trait for the aggregated change-notification stream
// - **CarrierConfig / Platform**: Synchronous lookup collaborators
// - **AccountRegistry**: Controller that reconciles lines to accounts
// - **AccountEntry**: Lifecycle of one published account
// - **BackoffScheduler**: Exponential-backoff retry primitive
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Event-Driven**: Typed async streams carry all external notifications
// 3. **Eventual Consistency**: Reconciliation rebuilds from observed state,
//    never from remembered intent
// 4. **Library-First**: All core functionality can be used as a library

pub mod account;
pub mod backoff;
pub mod capability;
pub mod config;
pub mod entry;
pub mod error;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use account::{AccountHandle, AccountRecord, Address, Capabilities, LineId, UserId};
pub use backoff::{BackoffAction, BackoffScheduler};
pub use config::{BackoffConfig, RegistryConfig};
pub use entry::{AccountEntry, EntryCapability};
pub use error::{Error, Result};
pub use registry::{
    AccountRegistry, Collaborators, ListenerState, RegistryEvent, RegistryStatus,
};
pub use traits::account_authority::AccountAuthority;
pub use traits::capability_notifier::{CapabilityNotifier, LineEvent, LineEventStream};
pub use traits::carrier_config::{CarrierConfig, ConfigBundle, ConfigValue};
pub use traits::change_source::{ChangeEvent, ChangeEventStream, ChangeSource};
pub use traits::line_provider::{ImsRegState, Line, LineProvider, LineRecord, ServiceState};
pub use traits::platform::Platform;
