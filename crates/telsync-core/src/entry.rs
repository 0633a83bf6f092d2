//! Account entries
//!
//! An [`AccountEntry`] owns the lifecycle of exactly one published account
//! derived from one line: it computes the published record, holds the cached
//! capability values used for change detection, and re-publishes when a
//! relevant value changes.
//!
//! ## Lifecycle invariant
//!
//! An entry is either fully registered with the account authority (from
//! construction until teardown) or does not exist. Construction registers
//! the initial record before the entry is handed to the registry; there is
//! no "constructed but unregistered" state.
//!
//! ## Updates
//!
//! All `update_*` operations are invoked by the registry while holding the
//! collection lock, after re-checking that the entry is still a member of
//! the current set. A value equal to the cached one is a no-op; a changed
//! value triggers a rebuild, and the rebuilt record is published only when
//! it differs structurally from the one currently registered.

use crate::account::{
    AccountHandle, AccountRecord, Address, Capabilities, ComponentName, ExtraValue, Icon, LineId,
    UserId, EXTRA_CALL_SUBJECT_ENCODING, EXTRA_CALL_SUBJECT_MAX_LENGTH,
    EXTRA_PLAY_CALL_RECORDING_TONE, EXTRA_SORT_ORDER, EXTRA_SUPPORTS_HANDOVER_FROM,
    EXTRA_SUPPORTS_VIDEO_CALLING_FALLBACK, GROUP_PREFIX,
};
use crate::capability;
use crate::config::RegistryConfig;
use crate::error::Result;
use crate::registry::Collaborators;
use crate::traits::capability_notifier::LineEventStream;
use crate::traits::line_provider::{ImsRegState, Line};
use std::collections::{BTreeMap, BTreeSet};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Entry-level capabilities queried through the registry's query surface
///
/// These do not appear as record bits; they describe what the connection
/// layer may do with calls on the entry's line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCapability {
    MergeCall,
    MergeImsCall,
    MergeWifiCallsWhenVowifiOff,
    ManageImsConference,
    VideoConferencing,
    ShowPreciseFailedCause,
    CallRecordingTone,
    UsesSimCallManager,
    VoiceByServiceList,
}

/// Cached carrier-derived booleans consulted by the query surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ConnectionCaps {
    merge_call: bool,
    merge_ims_call: bool,
    merge_wifi_when_vowifi_off: bool,
    manage_ims_conference: bool,
    video_conferencing: bool,
    show_precise_failed_cause: bool,
    call_recording_tone: bool,
    uses_sim_call_manager: bool,
    voice_by_service_list: bool,
}

impl ConnectionCaps {
    fn evaluate(collab: &Collaborators, line_id: LineId) -> Self {
        let carrier = collab.carrier.as_ref();
        Self {
            merge_call: capability::supports_merge_call(carrier, line_id),
            merge_ims_call: capability::supports_merge_ims_call(carrier, line_id),
            merge_wifi_when_vowifi_off: capability::supports_merge_wifi_calls_when_vowifi_off(
                carrier, line_id,
            ),
            manage_ims_conference: capability::supports_manage_ims_conference(carrier, line_id),
            video_conferencing: capability::supports_video_conferencing(carrier, line_id),
            show_precise_failed_cause: capability::show_precise_failed_cause(carrier, line_id),
            call_recording_tone: capability::supports_call_recording_tone(carrier, line_id),
            uses_sim_call_manager: capability::uses_sim_call_manager(carrier, line_id),
            voice_by_service_list: capability::is_voice_capable_by_service_list(carrier, line_id),
        }
    }
}

/// Context gathered by the registry before building records
///
/// Collected outside the record build so the build itself stays synchronous.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordContext {
    /// Subscriber identities participating in a merged-SIM group
    pub merged_identities: Vec<String>,
    /// Primary line number used to derive the merged group id
    pub primary_number: Option<String>,
    /// Whether the current user may place video calls
    pub user_supports_video: bool,
}

/// Owns one published account derived from one line
pub struct AccountEntry {
    handle: AccountHandle,
    line: Line,
    emergency: bool,
    test: bool,
    user: UserId,

    /// The record currently registered with the authority
    record: AccountRecord,

    // Cached values for change detection
    video_capable: bool,
    call_composer_capable: bool,
    adhoc_conference_capable: bool,
    rtt_enabled: bool,
    video_presence_enabled: bool,
    emergency_preferred: bool,
    simultaneous_calling: Option<BTreeSet<LineId>>,
    connection_caps: ConnectionCaps,

    /// Whether the per-line capability subscription is live
    subscribed: bool,
    /// Task consuming the per-line event stream; owned so teardown can stop it
    watcher: Option<JoinHandle<()>>,
    torn_down: bool,
}

impl AccountEntry {
    /// Build, register, and subscribe a new entry
    ///
    /// Registers the initial record before returning; an error here means no
    /// entry exists. Emergency and test entries have no stable external
    /// identity to subscribe against, so they return no event stream, and a
    /// failed subscription for a regular entry degrades to "no automatic
    /// capability updates" rather than failing construction.
    pub(crate) async fn new(
        collab: &Collaborators,
        config: &RegistryConfig,
        ctx: &RecordContext,
        line: Line,
        emergency: bool,
        test: bool,
        user: UserId,
        emergency_preferred: bool,
    ) -> Result<(AccountEntry, Option<LineEventStream>)> {
        let handle = AccountHandle::for_line(
            ComponentName::new(config.component.clone()),
            line.id,
            emergency,
            test,
            user,
        );

        let rtt_enabled = capability::is_rtt_supported(
            collab.platform.as_ref(),
            collab.carrier.as_ref(),
            &line,
            emergency,
            &config.emergency_rtt_countries,
        );
        let video_presence_enabled =
            capability::supports_video_presence(collab.carrier.as_ref(), line.id)
                && collab.platform.contact_discovery_enabled(line.id);

        let mut entry = AccountEntry {
            handle: handle.clone(),
            emergency,
            test,
            user,
            video_capable: line.video_capable,
            call_composer_capable: collab.platform.call_composer_enabled(line.id),
            adhoc_conference_capable: line.ims_registration == ImsRegState::Registered,
            rtt_enabled,
            video_presence_enabled,
            emergency_preferred,
            simultaneous_calling: None,
            connection_caps: ConnectionCaps::evaluate(collab, line.id),
            subscribed: false,
            watcher: None,
            torn_down: false,
            // Placeholder; replaced right below once the caches are in place
            record: AccountRecord {
                handle,
                label: String::new(),
                description: String::new(),
                icon: Icon::DefaultGlyph { tint: 0 },
                highlight_color: 0,
                capabilities: Capabilities::empty(),
                address: None,
                subscription_address: None,
                extras: BTreeMap::new(),
                group_id: String::new(),
                simultaneous_calling_restriction: None,
            },
            line,
        };

        entry.record = entry.build_record(collab, ctx);
        collab.authority.register(&entry.record).await?;
        info!(handle = %entry.handle, emergency, test, "registered account");

        let stream = if emergency || test {
            None
        } else {
            match collab.notifier.subscribe(entry.line.id).await {
                Ok(stream) => {
                    entry.subscribed = true;
                    Some(stream)
                }
                Err(e) => {
                    // Degraded mode: the entry stays functional but will not
                    // receive automatic capability updates.
                    warn!(line = %entry.line.id, error = %e, "capability subscription failed");
                    None
                }
            }
        };

        Ok((entry, stream))
    }

    /// The entry's stable identity
    pub fn handle(&self) -> &AccountHandle {
        &self.handle
    }

    /// The line backing this entry
    pub fn line_id(&self) -> LineId {
        self.line.id
    }

    /// Whether this is the emergency-only entry
    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// Whether this is a test-scoped entry
    pub fn is_test(&self) -> bool {
        self.test
    }

    /// The user the entry was published for
    pub fn user(&self) -> UserId {
        self.user
    }

    /// The currently published record
    pub fn record(&self) -> &AccountRecord {
        &self.record
    }

    /// Entry-level capability lookup for the query surface
    pub fn entry_capability(&self, capability: EntryCapability) -> bool {
        let caps = &self.connection_caps;
        match capability {
            EntryCapability::MergeCall => caps.merge_call,
            EntryCapability::MergeImsCall => caps.merge_ims_call,
            EntryCapability::MergeWifiCallsWhenVowifiOff => caps.merge_wifi_when_vowifi_off,
            EntryCapability::ManageImsConference => caps.manage_ims_conference,
            EntryCapability::VideoConferencing => caps.video_conferencing,
            EntryCapability::ShowPreciseFailedCause => caps.show_precise_failed_cause,
            EntryCapability::CallRecordingTone => caps.call_recording_tone,
            EntryCapability::UsesSimCallManager => caps.uses_sim_call_manager,
            EntryCapability::VoiceByServiceList => caps.voice_by_service_list,
        }
    }

    /// Rebuild from current state and publish when anything changed
    ///
    /// Refreshes the line snapshot and every carrier/platform-derived cache,
    /// then publishes only if the rebuilt record differs structurally from
    /// the registered one. Idempotent: a second call with no intervening
    /// change publishes nothing.
    pub(crate) async fn re_register(
        &mut self,
        collab: &Collaborators,
        config: &RegistryConfig,
        ctx: &RecordContext,
    ) -> Result<bool> {
        if let Some(line) = collab.lines.line(self.line.id).await? {
            self.line = line;
        }
        // The change-detection caches follow the refreshed snapshot, exactly
        // as the targeted update paths keep them in step with events
        self.video_capable = self.line.video_capable;
        self.adhoc_conference_capable = self.line.ims_registration == ImsRegState::Registered;
        self.rtt_enabled = capability::is_rtt_supported(
            collab.platform.as_ref(),
            collab.carrier.as_ref(),
            &self.line,
            self.emergency,
            &config.emergency_rtt_countries,
        );
        self.video_presence_enabled =
            capability::supports_video_presence(collab.carrier.as_ref(), self.line.id)
                && collab.platform.contact_discovery_enabled(self.line.id);
        self.call_composer_capable = collab.platform.call_composer_enabled(self.line.id);
        self.connection_caps = ConnectionCaps::evaluate(collab, self.line.id);

        self.publish_if_changed(collab, ctx).await
    }

    /// Apply a video-capability change
    pub(crate) async fn update_video_capability(
        &mut self,
        collab: &Collaborators,
        ctx: &RecordContext,
        video_capable: bool,
    ) -> Result<bool> {
        if self.video_capable == video_capable {
            return Ok(false);
        }
        self.video_capable = video_capable;
        self.line.video_capable = video_capable;
        self.publish_if_changed(collab, ctx).await
    }

    /// Apply a call-composer-capability change
    pub(crate) async fn update_call_composer(
        &mut self,
        collab: &Collaborators,
        ctx: &RecordContext,
        call_composer_capable: bool,
    ) -> Result<bool> {
        if self.call_composer_capable == call_composer_capable {
            return Ok(false);
        }
        self.call_composer_capable = call_composer_capable;
        self.publish_if_changed(collab, ctx).await
    }

    /// Re-derive ad-hoc conference capability from a registration change
    pub(crate) async fn update_registration_state(
        &mut self,
        collab: &Collaborators,
        ctx: &RecordContext,
        state: ImsRegState,
    ) -> Result<bool> {
        self.line.ims_registration = state;
        let capable = state == ImsRegState::Registered;
        if self.adhoc_conference_capable == capable {
            return Ok(false);
        }
        self.adhoc_conference_capable = capable;
        self.publish_if_changed(collab, ctx).await
    }

    /// Apply a simultaneous-calling support change
    pub(crate) async fn update_simultaneous_calling(
        &mut self,
        collab: &Collaborators,
        ctx: &RecordContext,
        supported: BTreeSet<LineId>,
    ) -> Result<bool> {
        let supported = Some(supported);
        if self.simultaneous_calling == supported {
            return Ok(false);
        }
        self.simultaneous_calling = supported;
        self.publish_if_changed(collab, ctx).await
    }

    /// Re-evaluate RTT support from current settings and line state
    pub(crate) async fn refresh_rtt(
        &mut self,
        collab: &Collaborators,
        config: &RegistryConfig,
        ctx: &RecordContext,
    ) -> Result<bool> {
        let rtt = capability::is_rtt_supported(
            collab.platform.as_ref(),
            collab.carrier.as_ref(),
            &self.line,
            self.emergency,
            &config.emergency_rtt_countries,
        );
        if self.rtt_enabled == rtt {
            return Ok(false);
        }
        self.rtt_enabled = rtt;
        self.publish_if_changed(collab, ctx).await
    }

    /// Re-evaluate video presence from the contact-discovery setting
    pub(crate) async fn refresh_video_presence(
        &mut self,
        collab: &Collaborators,
        ctx: &RecordContext,
    ) -> Result<bool> {
        let enabled = capability::supports_video_presence(collab.carrier.as_ref(), self.line.id)
            && collab.platform.contact_discovery_enabled(self.line.id);
        if self.video_presence_enabled == enabled {
            return Ok(false);
        }
        self.video_presence_enabled = enabled;
        self.publish_if_changed(collab, ctx).await
    }

    /// Apply an emergency-preference change after an active-data-line move
    pub(crate) async fn update_emergency_preferred(
        &mut self,
        collab: &Collaborators,
        ctx: &RecordContext,
        preferred: bool,
    ) -> Result<bool> {
        if self.emergency_preferred == preferred {
            return Ok(false);
        }
        self.emergency_preferred = preferred;
        self.publish_if_changed(collab, ctx).await
    }

    /// Attach the event-stream consumer task
    pub(crate) fn set_watcher(&mut self, watcher: JoinHandle<()>) {
        self.watcher = Some(watcher);
    }

    /// Unsubscribe and stop the event consumer; idempotent
    pub(crate) async fn teardown(&mut self, collab: &Collaborators) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if self.subscribed {
            collab.notifier.unsubscribe(self.line.id).await;
            self.subscribed = false;
        }
        debug!(handle = %self.handle, "entry torn down");
    }

    async fn publish_if_changed(
        &mut self,
        collab: &Collaborators,
        ctx: &RecordContext,
    ) -> Result<bool> {
        let rebuilt = self.build_record(collab, ctx);
        if rebuilt.published_eq(&self.record) {
            return Ok(false);
        }
        collab.authority.register(&rebuilt).await?;
        debug!(handle = %self.handle, "republished account");
        self.record = rebuilt;
        Ok(true)
    }

    /// Deterministic record build from the entry's current state
    fn build_record(&self, collab: &Collaborators, ctx: &RecordContext) -> AccountRecord {
        let platform = collab.platform.as_ref();
        let carrier = collab.carrier.as_ref();
        let line = &self.line;

        // Label priority: emergency, then single-SIM display name, then the
        // multi-SIM slot form with a generated fallback for nameless SIMs.
        let (label, description) = if self.emergency {
            (
                platform.emergency_account_label(),
                platform.emergency_account_description(),
            )
        } else if !platform.multi_sim() {
            (line.display_name.clone(), line.display_name.clone())
        } else {
            let slot_label = platform.fallback_line_label(line.slot_index);
            if line.display_name.is_empty() {
                (slot_label.clone(), slot_label)
            } else {
                (
                    line.display_name.clone(),
                    format!("{} ({})", line.display_name, slot_label),
                )
            }
        };

        let mut caps = Capabilities::empty();
        caps.set(Capabilities::PLACE_EMERGENCY_CALLS | Capabilities::MULTI_USER);
        if self.emergency {
            caps.set(Capabilities::EMERGENCY_CALLS_ONLY);
        } else {
            caps.set(Capabilities::SIM_SUBSCRIPTION);
            // Lines restricted away from voice by their service capability
            // list, or delegated to a sim call manager, are not offered as
            // call providers.
            if self.connection_caps.voice_by_service_list
                && !self.connection_caps.uses_sim_call_manager
            {
                caps.set(Capabilities::CALL_PROVIDER);
            }
        }
        if self.video_capable && ctx.user_supports_video {
            caps.set(Capabilities::VIDEO_CALLING);
            if capability::supports_video_pause(carrier, line.id) {
                caps.set(Capabilities::SUPPORTS_VIDEO_PAUSE);
            }
            if self.video_presence_enabled {
                caps.set(Capabilities::VIDEO_CALLING_RELIES_ON_PRESENCE);
            }
            if capability::supports_emergency_video(carrier, line.id) {
                caps.set(Capabilities::EMERGENCY_VIDEO_CALLING);
            }
        }
        if self.rtt_enabled {
            caps.set(Capabilities::RTT);
        }
        let instant_lettering = capability::supports_instant_lettering(carrier, line.id);
        if instant_lettering {
            caps.set(Capabilities::CALL_SUBJECT);
        }
        if self.call_composer_capable {
            caps.set(Capabilities::CALL_COMPOSER);
        }
        // Explicitly set or cleared, never merely left unset: a previously
        // published record may have carried the bit.
        caps.put(
            Capabilities::ADHOC_CONFERENCE_CALLING,
            self.adhoc_conference_capable
                && capability::supports_adhoc_conference(carrier, line.id),
        );
        if self.emergency_preferred {
            caps.set(Capabilities::EMERGENCY_PREFERRED);
        }

        let icon = match &line.icon {
            Some(resource) => Icon::Resource(resource.clone()),
            None => Icon::DefaultGlyph {
                tint: line.highlight_color,
            },
        };

        let group_id = match (&line.group_identity, &ctx.primary_number) {
            (Some(identity), Some(primary))
                if !self.emergency && ctx.merged_identities.contains(identity) =>
            {
                format!("{GROUP_PREFIX}{primary}")
            }
            _ => String::new(),
        };

        let mut extras = BTreeMap::new();
        if platform.supports_handover_from(line.id) {
            extras.insert(EXTRA_SUPPORTS_HANDOVER_FROM.to_string(), ExtraValue::Bool(true));
        }
        if capability::supports_call_recording_tone(carrier, line.id) {
            extras.insert(
                EXTRA_PLAY_CALL_RECORDING_TONE.to_string(),
                ExtraValue::Bool(true),
            );
        }
        if platform.supports_video_calling_fallback(line.id) {
            extras.insert(
                EXTRA_SUPPORTS_VIDEO_CALLING_FALLBACK.to_string(),
                ExtraValue::Bool(true),
            );
        }
        if instant_lettering {
            if let Some((max_length, encoding)) =
                capability::instant_lettering_params(carrier, line.id)
            {
                extras.insert(
                    EXTRA_CALL_SUBJECT_MAX_LENGTH.to_string(),
                    ExtraValue::Int(max_length),
                );
                extras.insert(
                    EXTRA_CALL_SUBJECT_ENCODING.to_string(),
                    ExtraValue::Str(encoding),
                );
            }
        }
        if !self.emergency {
            extras.insert(
                EXTRA_SORT_ORDER.to_string(),
                ExtraValue::Int(line.slot_index as i64),
            );
        }

        let address = line.number.as_deref().map(Address::tel);

        AccountRecord {
            handle: self.handle.clone(),
            label,
            description,
            icon,
            highlight_color: line.highlight_color,
            capabilities: caps,
            subscription_address: address.clone(),
            address,
            extras,
            group_id,
            simultaneous_calling_restriction: self.simultaneous_calling.clone(),
        }
    }
}

impl std::fmt::Debug for AccountEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountEntry")
            .field("handle", &self.handle)
            .field("line", &self.line.id)
            .field("emergency", &self.emergency)
            .field("test", &self.test)
            .field("subscribed", &self.subscribed)
            .finish()
    }
}
