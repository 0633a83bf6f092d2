// # Platform Trait
//
// Defines the interface for device-level lookups: resource strings, user
// settings, and device capability flags. Like carrier config, these are
// synchronous lookups consumed by the pure capability evaluator and the
// record-build algorithm.

use crate::account::{LineId, UserId};

/// Trait for the platform/resources collaborator
pub trait Platform: Send + Sync {
    /// Current network country code (ISO), if known
    fn country_code(&self) -> Option<String>;

    /// Whether the given user is allowed to place video calls
    fn user_supports_video(&self, user: UserId) -> bool;

    /// Whether the device supports RTT at all
    fn device_rtt_supported(&self) -> bool;

    /// Whether the device supports RTT on emergency calls
    fn emergency_rtt_supported(&self) -> bool;

    /// Whether the user has enabled the RTT setting for a line
    fn rtt_setting_enabled(&self, line_id: LineId) -> bool;

    /// Whether the user has enabled call composer for a line
    fn call_composer_enabled(&self, line_id: LineId) -> bool;

    /// Whether the user has enabled contact discovery (presence) for a line
    fn contact_discovery_enabled(&self, line_id: LineId) -> bool;

    /// Number of currently active subscriptions
    fn active_subscription_count(&self) -> usize;

    /// Whether the device has more than one SIM slot
    fn multi_sim(&self) -> bool;

    /// Display label for the emergency-only account
    fn emergency_account_label(&self) -> String;

    /// Description for the emergency-only account
    fn emergency_account_description(&self) -> String;

    /// Generated fallback label for a line without a display name
    fn fallback_line_label(&self, slot_index: usize) -> String;

    /// Resource gate: ongoing calls can be handed over *from* this line
    fn supports_handover_from(&self, line_id: LineId) -> bool;

    /// Resource gate: video calls fall back to voice when they cannot connect
    fn supports_video_calling_fallback(&self, line_id: LineId) -> bool;
}
