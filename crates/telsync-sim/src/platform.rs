// # Simulated Platform
//
// In-memory implementation of Platform.
//
// All device-level lookups read from one mutable state struct. Defaults
// describe a single-SIM device with every optional feature off, so tests
// only set what they exercise.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use telsync_core::traits::platform::Platform;
use telsync_core::{LineId, UserId};

#[derive(Debug)]
struct PlatformState {
    country_code: Option<String>,
    video_restricted_users: HashSet<UserId>,
    device_rtt: bool,
    emergency_rtt: bool,
    rtt_enabled_lines: HashSet<LineId>,
    composer_enabled_lines: HashSet<LineId>,
    contact_discovery_lines: HashSet<LineId>,
    handover_from_lines: HashSet<LineId>,
    video_fallback_lines: HashSet<LineId>,
    active_subscription_count: usize,
    multi_sim: bool,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            country_code: None,
            video_restricted_users: HashSet::new(),
            device_rtt: false,
            emergency_rtt: false,
            rtt_enabled_lines: HashSet::new(),
            composer_enabled_lines: HashSet::new(),
            contact_discovery_lines: HashSet::new(),
            handover_from_lines: HashSet::new(),
            video_fallback_lines: HashSet::new(),
            active_subscription_count: 1,
            multi_sim: false,
        }
    }
}

/// In-memory platform lookups
#[derive(Debug, Clone, Default)]
pub struct SimPlatform {
    state: Arc<RwLock<PlatformState>>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_country_code(&self, country: Option<String>) {
        self.write().country_code = country;
    }

    /// Forbid video calling for a user
    pub fn restrict_video_for_user(&self, user: UserId) {
        self.write().video_restricted_users.insert(user);
    }

    pub fn set_device_rtt(&self, device: bool, emergency: bool) {
        let mut state = self.write();
        state.device_rtt = device;
        state.emergency_rtt = emergency;
    }

    pub fn set_rtt_enabled(&self, line_id: LineId, enabled: bool) {
        Self::toggle(&mut self.write().rtt_enabled_lines, line_id, enabled);
    }

    pub fn set_call_composer_enabled(&self, line_id: LineId, enabled: bool) {
        Self::toggle(&mut self.write().composer_enabled_lines, line_id, enabled);
    }

    pub fn set_contact_discovery_enabled(&self, line_id: LineId, enabled: bool) {
        Self::toggle(&mut self.write().contact_discovery_lines, line_id, enabled);
    }

    pub fn set_handover_from(&self, line_id: LineId, enabled: bool) {
        Self::toggle(&mut self.write().handover_from_lines, line_id, enabled);
    }

    pub fn set_video_fallback(&self, line_id: LineId, enabled: bool) {
        Self::toggle(&mut self.write().video_fallback_lines, line_id, enabled);
    }

    pub fn set_active_subscription_count(&self, count: usize) {
        self.write().active_subscription_count = count;
    }

    pub fn set_multi_sim(&self, multi_sim: bool) {
        self.write().multi_sim = multi_sim;
    }

    fn toggle(set: &mut HashSet<LineId>, line_id: LineId, on: bool) {
        if on {
            set.insert(line_id);
        } else {
            set.remove(&line_id);
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, PlatformState> {
        self.state.write().expect("platform state lock poisoned")
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PlatformState> {
        self.state.read().expect("platform state lock poisoned")
    }
}

impl Platform for SimPlatform {
    fn country_code(&self) -> Option<String> {
        self.read().country_code.clone()
    }

    fn user_supports_video(&self, user: UserId) -> bool {
        !self.read().video_restricted_users.contains(&user)
    }

    fn device_rtt_supported(&self) -> bool {
        self.read().device_rtt
    }

    fn emergency_rtt_supported(&self) -> bool {
        self.read().emergency_rtt
    }

    fn rtt_setting_enabled(&self, line_id: LineId) -> bool {
        self.read().rtt_enabled_lines.contains(&line_id)
    }

    fn call_composer_enabled(&self, line_id: LineId) -> bool {
        self.read().composer_enabled_lines.contains(&line_id)
    }

    fn contact_discovery_enabled(&self, line_id: LineId) -> bool {
        self.read().contact_discovery_lines.contains(&line_id)
    }

    fn active_subscription_count(&self) -> usize {
        self.read().active_subscription_count
    }

    fn multi_sim(&self) -> bool {
        self.read().multi_sim
    }

    fn emergency_account_label(&self) -> String {
        "Emergency calls".to_string()
    }

    fn emergency_account_description(&self) -> String {
        "Emergency calling only".to_string()
    }

    fn fallback_line_label(&self, slot_index: usize) -> String {
        format!("SIM {}", slot_index + 1)
    }

    fn supports_handover_from(&self, line_id: LineId) -> bool {
        self.read().handover_from_lines.contains(&line_id)
    }

    fn supports_video_calling_fallback(&self, line_id: LineId) -> bool {
        self.read().video_fallback_lines.contains(&line_id)
    }
}
