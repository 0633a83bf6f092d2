//! Collaborator traits for the reconciliation core
//!
//! Everything the core needs from the surrounding system is expressed as a
//! trait here: line enumeration, the account-registration authority, per-line
//! capability notification, carrier configuration, and platform resources.
//! The core never looks behind these contracts.

pub mod account_authority;
pub mod capability_notifier;
pub mod carrier_config;
pub mod change_source;
pub mod line_provider;
pub mod platform;

pub use account_authority::AccountAuthority;
pub use capability_notifier::{CapabilityNotifier, LineEvent, LineEventStream};
pub use carrier_config::{keys, CarrierConfig, ConfigBundle, ConfigValue};
pub use change_source::{ChangeEvent, ChangeEventStream, ChangeSource};
pub use line_provider::{ImsRegState, Line, LineProvider, LineRecord, ServiceState};
pub use platform::Platform;
