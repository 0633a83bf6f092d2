//! Capability evaluation
//!
//! Pure functions deriving per-line capability decisions from the carrier
//! config and platform collaborators. Nothing here caches or mutates state;
//! callers (account entries) cache results as needed for change detection.
//!
//! ## Config-absence defaults
//!
//! Every carrier-config predicate fails closed when no bundle is available
//! for the line, with a single deliberate exception:
//! [`is_voice_capable_by_service_list`] fails *open*, treating absence of an
//! explicit service-capability restriction as "assume voice-capable".

use crate::account::LineId;
use crate::traits::carrier_config::{keys, CarrierConfig};
use crate::traits::line_provider::Line;
use crate::traits::platform::Platform;

/// Inputs to the emergency-preference decision
///
/// Gathered by the registry at evaluation time so the decision itself stays
/// pure and synchronous.
#[derive(Debug, Clone, Copy)]
pub struct EmergencyPreference {
    /// Device policy requires a default-data preference for emergency SUPL
    pub require_default_data_for_emergency_supl: bool,
    /// The line being evaluated
    pub queried: LineId,
    /// The currently active data line
    pub active_data: LineId,
    /// Whether the active data line is opportunistic
    pub active_data_opportunistic: bool,
    /// The user's default data line
    pub user_default_data: LineId,
}

/// Whether a line should carry the emergency-preferred capability
///
/// Fail-closed: any missing or invalid input yields `false`.
pub fn is_emergency_preferred(platform: &dyn Platform, inputs: &EmergencyPreference) -> bool {
    if !inputs.require_default_data_for_emergency_supl {
        return false;
    }
    if platform.active_subscription_count() < 2 {
        return false;
    }
    if !inputs.queried.is_valid() {
        return false;
    }
    // While a temporary data switch to a non-opportunistic line is in
    // effect, that line carries the preference; otherwise the user's own
    // default data line does.
    if inputs.active_data.is_valid() && !inputs.active_data_opportunistic {
        inputs.queried == inputs.active_data
    } else {
        inputs.queried == inputs.user_default_data
    }
}

/// Whether RTT calling is supported on a line
///
/// The emergency account requires device and emergency RTT support plus a
/// country on the supported list (case-insensitive exact match). Regular
/// accounts require IMS voice availability and the user's RTT setting, and
/// are suppressed while roaming without WiFi calling unless the carrier
/// always allows roaming RTT.
pub fn is_rtt_supported(
    platform: &dyn Platform,
    carrier: &dyn CarrierConfig,
    line: &Line,
    is_emergency: bool,
    supported_countries: &[String],
) -> bool {
    if is_emergency {
        if !platform.device_rtt_supported() || !platform.emergency_rtt_supported() {
            return false;
        }
        let country = match platform.country_code() {
            Some(c) => c,
            None => return false,
        };
        return supported_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&country));
    }

    if !line.ims_voice_available || !platform.rtt_setting_enabled(line.id) {
        return false;
    }
    !(line.roaming && !line.wifi_calling && !allow_rtt_while_roaming(carrier, line.id))
}

fn flag(carrier: &dyn CarrierConfig, line_id: LineId, key: &str, default: bool) -> bool {
    match carrier.config_for(line_id) {
        Some(bundle) => bundle.get_bool(key, default),
        None => default,
    }
}

/// Video calls can be paused
pub fn supports_video_pause(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_VIDEO_PAUSE, false)
}

/// Video capability must be confirmed via presence before being offered
pub fn supports_video_presence(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::USE_RCS_PRESENCE, false)
}

/// Instant lettering (call subject) is supported
pub fn supports_instant_lettering(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_INSTANT_LETTERING, false)
}

/// Ad-hoc conference calling is supported by the carrier
pub fn supports_adhoc_conference(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_ADHOC_CONFERENCE, false)
}

/// Calls can be merged into a conference
pub fn supports_merge_call(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_MERGE_CALL, false)
}

/// IMS calls can be merged into a conference
pub fn supports_merge_ims_call(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_MERGE_IMS_CALL, false)
}

/// Emergency video calls are supported
pub fn supports_emergency_video(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_EMERGENCY_VIDEO, false)
}

/// Video conferencing is supported
pub fn supports_video_conferencing(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_VIDEO_CONFERENCING, false)
}

/// WiFi calls can be merged while VoWiFi is off
pub fn supports_merge_wifi_calls_when_vowifi_off(
    carrier: &dyn CarrierConfig,
    line_id: LineId,
) -> bool {
    flag(
        carrier,
        line_id,
        keys::SUPPORTS_MERGE_WIFI_CALLS_WHEN_VOWIFI_OFF,
        false,
    )
}

/// IMS conferences can be managed (participants listed and disconnected)
pub fn supports_manage_ims_conference(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SUPPORTS_MANAGE_IMS_CONFERENCE, false)
}

/// Calls on this line are delegated to a sim call manager
pub fn uses_sim_call_manager(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::USES_SIM_CALL_MANAGER, false)
}

/// Show the precise cause when a call fails
pub fn show_precise_failed_cause(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::SHOW_PRECISE_FAILED_CAUSE, false)
}

/// Play a tone while a call is being recorded
pub fn supports_call_recording_tone(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::PLAY_CALL_RECORDING_TONE, false)
}

/// RTT stays usable while roaming
pub fn allow_rtt_while_roaming(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::ALLOW_RTT_WHILE_ROAMING, false)
}

/// The line's service capability list includes voice
///
/// Fail-open: an absent bundle (or absent key) means "no evidence the line
/// is voice-restricted", so the device is assumed voice-capable. This is the
/// single deliberate exception to the fail-closed rule above.
pub fn is_voice_capable_by_service_list(carrier: &dyn CarrierConfig, line_id: LineId) -> bool {
    flag(carrier, line_id, keys::VOICE_CAPABLE_BY_SERVICE_LIST, true)
}

/// Instant-lettering parameters, when the capability is configured
///
/// Returns `(max_length, encoding)` only when both are present; partial
/// configuration yields `None` and the corresponding extras keys are omitted.
pub fn instant_lettering_params(
    carrier: &dyn CarrierConfig,
    line_id: LineId,
) -> Option<(i64, String)> {
    let bundle = carrier.config_for(line_id)?;
    let max_length = bundle.get_int(keys::INSTANT_LETTERING_MAX_LENGTH)?;
    let encoding = bundle.get_str(keys::INSTANT_LETTERING_ENCODING)?.to_string();
    Some((max_length, encoding))
}
