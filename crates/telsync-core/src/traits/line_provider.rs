// # Line Provider Trait
//
// Defines the interface for enumerating the underlying lines (telephony
// subscriptions) the controller derives its accounts from.
//
// ## Usage
//
// ```rust,ignore
// use telsync_core::traits::LineProvider;
//
// async fn dump(provider: &dyn LineProvider) -> anyhow::Result<()> {
//     for line in provider.enumerate_lines().await? {
//         println!("line {} in slot {}", line.id, line.slot_index);
//     }
//     Ok(())
// }
// ```

use crate::account::LineId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An underlying dialable subscription, read-only to the core
///
/// Supplied by the line provider on each enumeration; the core never mutates
/// a line and does not own its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Line identifier
    pub id: LineId,
    /// Carrier display name (may be empty)
    pub display_name: String,
    /// Dialable number, if known
    pub number: Option<String>,
    /// Physical slot index
    pub slot_index: usize,
    /// Per-line icon resource, if one resolves
    pub icon: Option<String>,
    /// ARGB highlight color
    pub highlight_color: u32,
    /// Shared subscriber identity for merged-SIM grouping, if any
    pub group_identity: Option<String>,
    /// Whether this is an opportunistic subscription
    pub opportunistic: bool,
    /// Whether the line is currently roaming
    pub roaming: bool,
    /// Whether the line is registered for calling over WiFi
    pub wifi_calling: bool,
    /// Whether IMS voice is currently available on this line
    pub ims_voice_available: bool,
    /// Whether video calling is available at enumeration time; kept current
    /// afterwards via capability notifications
    pub video_capable: bool,
    /// Current IMS registration state
    pub ims_registration: ImsRegState,
}

/// IMS registration state of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImsRegState {
    Registered,
    Registering,
    Unregistered,
}

/// Voice service state reported by the change source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Normal operation, calls can be placed
    InService,
    /// No service
    OutOfService,
    /// Only emergency calls can be placed
    EmergencyOnly,
    /// Radio is off
    PowerOff,
}

/// Subscription record backing a line
///
/// The reconciliation pass consults this to decide whether a line is
/// eligible for a published account at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// The line this record describes
    pub line_id: LineId,
    /// Opportunistic subscriptions never get their own account
    pub opportunistic: bool,
    /// Provisioning/bootstrap profiles never get their own account
    pub provisioning: bool,
    /// Satellite-only subscriptions never get their own account
    pub satellite_only: bool,
}

/// Trait for the line-enumeration collaborator
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait LineProvider: Send + Sync {
    /// Enumerate all current lines
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Line>)`: the current line set (possibly empty)
    /// - `Err(Error)`: enumeration failure
    async fn enumerate_lines(&self) -> Result<Vec<Line>, crate::Error>;

    /// Fetch the current state of a single line
    ///
    /// Used by targeted re-registration to refresh one line's snapshot
    /// without a full enumeration.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Line))`: the line's current state
    /// - `Ok(None)`: the line no longer exists
    /// - `Err(Error)`: lookup failure
    async fn line(&self, line_id: LineId) -> Result<Option<Line>, crate::Error>;

    /// Fetch the subscription record backing a line
    ///
    /// # Returns
    ///
    /// - `Ok(Some(LineRecord))`: the record
    /// - `Ok(None)`: no record exists for this line
    /// - `Err(Error)`: lookup failure
    async fn subscription_record(&self, line_id: LineId)
        -> Result<Option<LineRecord>, crate::Error>;

    /// The user's default data line, or [`LineId::INVALID`]
    async fn default_data_line(&self) -> LineId;

    /// The user's default voice line, or [`LineId::INVALID`]
    async fn default_voice_line(&self) -> LineId;

    /// The currently active data line, or [`LineId::INVALID`]
    ///
    /// May differ from the default data line while temporary data switching
    /// is in effect.
    async fn active_data_line(&self) -> LineId;

    /// The designated default line
    ///
    /// Used as the anchor for the emergency-only account when no line
    /// qualifies for a regular account. Always resolvable: a device without
    /// any usable subscription still has a default line to dial emergency
    /// calls through.
    async fn default_line(&self) -> Result<Line, crate::Error>;

    /// Subscriber identities participating in a merged-SIM group
    async fn merged_group_identities(&self) -> Result<Vec<String>, crate::Error>;

    /// Dialable number of the primary line, used to derive merged group ids
    async fn primary_line_number(&self) -> Result<Option<String>, crate::Error>;
}
