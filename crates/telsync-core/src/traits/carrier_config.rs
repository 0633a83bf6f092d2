// # Carrier Config Trait
//
// Defines the interface for carrier-configuration lookups.
//
// ## Fail-closed contract
//
// `config_for` returning `None` (no bundle available for the line) must make
// every dependent boolean predicate in the capability evaluator return its
// fail-closed default. See `capability` for the one documented fail-open
// exception.

use crate::account::LineId;
use std::collections::HashMap;

/// Well-known carrier config keys consumed by the capability evaluator
pub mod keys {
    /// Video calls can be paused
    pub const SUPPORTS_VIDEO_PAUSE: &str = "supports_video_pause";
    /// Video capability must be confirmed via presence
    pub const USE_RCS_PRESENCE: &str = "use_rcs_presence";
    /// Instant lettering (call subject) is supported
    pub const SUPPORTS_INSTANT_LETTERING: &str = "supports_instant_lettering";
    /// Maximum instant-lettering message length
    pub const INSTANT_LETTERING_MAX_LENGTH: &str = "instant_lettering_max_length";
    /// Instant-lettering character encoding
    pub const INSTANT_LETTERING_ENCODING: &str = "instant_lettering_encoding";
    /// Ad-hoc conference calling is supported
    pub const SUPPORTS_ADHOC_CONFERENCE: &str = "supports_adhoc_conference";
    /// Calls can be merged into a conference
    pub const SUPPORTS_MERGE_CALL: &str = "supports_merge_call";
    /// IMS calls can be merged into a conference
    pub const SUPPORTS_MERGE_IMS_CALL: &str = "supports_merge_ims_call";
    /// Emergency video calls are supported
    pub const SUPPORTS_EMERGENCY_VIDEO: &str = "supports_emergency_video";
    /// Video conferencing is supported
    pub const SUPPORTS_VIDEO_CONFERENCING: &str = "supports_video_conferencing";
    /// WiFi calls can be merged while VoWiFi is off
    pub const SUPPORTS_MERGE_WIFI_CALLS_WHEN_VOWIFI_OFF: &str =
        "supports_merge_wifi_calls_when_vowifi_off";
    /// IMS conferences can be managed (participants listed/disconnected)
    pub const SUPPORTS_MANAGE_IMS_CONFERENCE: &str = "supports_manage_ims_conference";
    /// Calls are delegated to a sim call manager
    pub const USES_SIM_CALL_MANAGER: &str = "uses_sim_call_manager";
    /// Show the precise cause when a call fails
    pub const SHOW_PRECISE_FAILED_CAUSE: &str = "show_precise_failed_cause";
    /// Play a tone while a call is being recorded
    pub const PLAY_CALL_RECORDING_TONE: &str = "play_call_recording_tone";
    /// RTT stays usable while roaming
    pub const ALLOW_RTT_WHILE_ROAMING: &str = "allow_rtt_while_roaming";
    /// Service capabilities include voice
    pub const VOICE_CAPABLE_BY_SERVICE_LIST: &str = "voice_capable_by_service_list";
}

/// A typed value in a carrier config bundle
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// A carrier configuration bundle for one line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigBundle {
    values: HashMap<String, ConfigValue>,
}

impl ConfigBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous one for the key
    pub fn put(&mut self, key: impl Into<String>, value: ConfigValue) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Convenience for boolean flags
    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.put(key, ConfigValue::Bool(value))
    }

    /// Boolean lookup with an explicit default for a missing or mistyped key
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ConfigValue::Bool(v)) => *v,
            _ => default,
        }
    }

    /// Integer lookup
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(ConfigValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// String lookup
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ConfigValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Trait for the carrier-configuration collaborator
///
/// Lookups are synchronous: the evaluator is pure and called inline during
/// record builds.
pub trait CarrierConfig: Send + Sync {
    /// The config bundle for a line, or `None` if carrier configuration is
    /// unavailable for it
    fn config_for(&self, line_id: LineId) -> Option<ConfigBundle>;
}
