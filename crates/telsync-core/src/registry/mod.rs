//! Account registry
//!
//! The AccountRegistry is responsible for:
//! - Keeping the published account set consistent with the current line set
//! - Registering the change listener, with backoff while the surrounding
//!   system is unavailable
//! - Dispatching change events to full reconciliation or targeted updates
//! - Cleaning up orphaned registrations left behind by earlier runs
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                      ┌────────────────────┐
//! │ ChangeSource │─── ChangeEvent ─────▶│  AccountRegistry   │
//! └──────────────┘                      │  (entries, lock)   │
//! ┌──────────────┐                      └────────────────────┘
//! │ Capability   │─── LineEvent ──────────▲      │
//! │ Notifier     │   (per entry)          │      │ register/unregister
//! └──────────────┘                        │      ▼
//!                         ┌──────────────┴──┐ ┌──────────────────┐
//!                         │  LineProvider   │ │ AccountAuthority │
//!                         │ CarrierConfig   │ └──────────────────┘
//!                         │   Platform      │
//!                         └─────────────────┘
//! ```
//!
//! ## Event Flow
//!
//! 1. `start()` attempts change-listener registration; failures retry with
//!    exponential backoff (1s doubling to 60s by default)
//! 2. Successful registration triggers the initial reconciliation pass; if
//!    the account authority is not ready yet, readiness is polled with its
//!    own backoff (250ms doubling to 4s) and the pass runs once it is
//! 3. Structural events (line set, coming into service, user switch, locale
//!    or network country) rerun the full pass; everything else updates only
//!    the affected entries
//!
//! ## Concurrency
//!
//! All entries live behind a single async mutex. A reconciliation pass tears
//! the old set down and builds the new one under one lock acquisition, so no
//! observer sees a half-built set. Per-line event consumers re-check that
//! their entry is still a member under the same lock before applying an
//! event, which makes late events for torn-down entries harmless.

use crate::account::{AccountHandle, Address, LineId, UserId};
use crate::backoff::BackoffScheduler;
use crate::capability::{self, EmergencyPreference};
use crate::config::RegistryConfig;
use crate::entry::{AccountEntry, EntryCapability, RecordContext};
use crate::error::Result;
use crate::traits::account_authority::AccountAuthority;
use crate::traits::capability_notifier::{CapabilityNotifier, LineEvent, LineEventStream};
use crate::traits::carrier_config::CarrierConfig;
use crate::traits::change_source::{ChangeEvent, ChangeSource};
use crate::traits::line_provider::{Line, LineProvider, ServiceState};
use crate::traits::platform::Platform;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// The collaborator bundle threaded through entry construction and updates
pub struct Collaborators {
    /// Line enumeration and lookups
    pub lines: Arc<dyn LineProvider>,
    /// External registration authority
    pub authority: Arc<dyn AccountAuthority>,
    /// Per-line capability notifications
    pub notifier: Arc<dyn CapabilityNotifier>,
    /// Carrier configuration lookups
    pub carrier: Arc<dyn CarrierConfig>,
    /// Device-level lookups
    pub platform: Arc<dyn Platform>,
}

/// Events emitted by the registry for external monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// The registry started
    Started,

    /// The change listener registered successfully
    ListenerRegistered,

    /// A listener registration attempt failed; retry is scheduled
    ListenerRegistrationFailed { error: String },

    /// The change stream ended; re-registration is in progress
    ListenerLost,

    /// A reconciliation pass completed
    ReconcileCompleted {
        accounts: usize,
        emergency_active: bool,
    },

    /// A stale registration from an earlier run was removed
    OrphanRemoved { handle: AccountHandle },

    /// The registry stopped
    Stopped { reason: String },
}

/// Change-listener registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListenerState {
    /// No registration attempt has succeeded yet
    Unregistered,
    /// A failed attempt is waiting out its backoff delay
    Backoff,
    /// The change stream is live
    Registered,
}

/// Point-in-time snapshot of the registry for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub listener: ListenerState,
    pub accounts: Vec<String>,
    pub emergency_active: bool,
    pub last_reconcile: Option<DateTime<Utc>>,
}

struct EntryTable {
    entries: Vec<AccountEntry>,
    /// Reverse lookup, rebuilt at the end of every reconciliation pass
    handle_to_line: HashMap<AccountHandle, LineId>,
    last_reconcile: Option<DateTime<Utc>>,
}

/// Eventually-consistent mapping from lines to published accounts
///
/// ## Lifecycle
///
/// 1. Create with [`AccountRegistry::new()`]
/// 2. Start with [`AccountRegistry::start()`]
/// 3. The registry runs on its own tasks until [`AccountRegistry::stop()`]
pub struct AccountRegistry {
    collab: Collaborators,
    change_source: Arc<dyn ChangeSource>,
    config: RegistryConfig,

    table: Mutex<EntryTable>,

    /// The foreground user accounts are published for
    current_user: AtomicU32,

    /// Last observed voice service state, for transition detection
    service_state: std::sync::Mutex<Option<ServiceState>>,

    listener_state: std::sync::Mutex<ListenerState>,
    listener_retry: Arc<BackoffScheduler>,
    readiness_poll: Arc<BackoffScheduler>,

    /// Task consuming the change stream while the listener is registered
    dispatch: std::sync::Mutex<Option<JoinHandle<()>>>,

    event_tx: mpsc::Sender<RegistryEvent>,
}

impl AccountRegistry {
    /// Create a new registry
    ///
    /// Nothing runs until [`AccountRegistry::start`] is called.
    ///
    /// # Parameters
    ///
    /// - `collab`: the line/authority/notifier/carrier/platform collaborators
    /// - `change_source`: the aggregated change-notification stream
    /// - `config`: registry configuration (validated here)
    /// - `user`: the foreground user to publish accounts for
    ///
    /// # Returns
    ///
    /// A tuple of (registry, event_receiver) where event_receiver yields
    /// registry events for monitoring
    pub fn new(
        collab: Collaborators,
        change_source: Arc<dyn ChangeSource>,
        config: RegistryConfig,
        user: UserId,
    ) -> Result<(Arc<Self>, mpsc::Receiver<RegistryEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let listener_backoff = config.listener_backoff.clone();
        let readiness_backoff = config.readiness_backoff.clone();

        let registry = Arc::new_cyclic(|weak: &Weak<AccountRegistry>| {
            let retry_target = weak.clone();
            let listener_retry = BackoffScheduler::new(
                listener_backoff,
                Arc::new(move || {
                    let target = retry_target.clone();
                    Box::pin(async move {
                        if let Some(registry) = target.upgrade() {
                            registry.attempt_listener_registration().await;
                        }
                    })
                }),
            );

            let poll_target = weak.clone();
            let readiness_poll = BackoffScheduler::new(
                readiness_backoff,
                Arc::new(move || {
                    let target = poll_target.clone();
                    Box::pin(async move {
                        if let Some(registry) = target.upgrade() {
                            registry.poll_authority_readiness().await;
                        }
                    })
                }),
            );

            Self {
                collab,
                change_source,
                config,
                table: Mutex::new(EntryTable {
                    entries: Vec::new(),
                    handle_to_line: HashMap::new(),
                    last_reconcile: None,
                }),
                current_user: AtomicU32::new(user.0),
                service_state: std::sync::Mutex::new(None),
                listener_state: std::sync::Mutex::new(ListenerState::Unregistered),
                listener_retry,
                readiness_poll,
                dispatch: std::sync::Mutex::new(None),
                event_tx: tx,
            }
        });

        Ok((registry, rx))
    }

    /// Start the registry
    ///
    /// Kicks off the first listener registration attempt. Reconciliation
    /// follows from successful registration; until then, nothing is
    /// published.
    pub async fn start(self: &Arc<Self>) {
        self.emit_event(RegistryEvent::Started);
        self.attempt_listener_registration().await;
    }

    /// Stop the registry
    ///
    /// Cancels retries, stops the change-stream consumer, and tears down
    /// every entry. Published registrations are left in place for the next
    /// run's orphan cleanup, matching a process restart.
    pub async fn stop(&self, reason: &str) {
        self.listener_retry.stop();
        self.readiness_poll.stop();
        if let Some(dispatch) = self.take_dispatch() {
            dispatch.abort();
        }
        self.set_listener_state(ListenerState::Unregistered);

        let mut table = self.table.lock().await;
        for entry in table.entries.iter_mut() {
            entry.teardown(&self.collab).await;
        }
        table.entries.clear();
        table.handle_to_line.clear();
        drop(table);

        info!(reason, "registry stopped");
        self.emit_event(RegistryEvent::Stopped {
            reason: reason.to_string(),
        });
    }

    // ---- listener registration ---------------------------------------------

    async fn attempt_listener_registration(self: &Arc<Self>) {
        match self.change_source.watch().await {
            Ok(stream) => {
                self.listener_retry.stop();
                self.set_listener_state(ListenerState::Registered);
                info!("change listener registered");
                self.emit_event(RegistryEvent::ListenerRegistered);

                let registry = Arc::downgrade(self);
                let dispatch = tokio::spawn(async move {
                    Self::dispatch_loop(registry, stream).await;
                });
                if let Some(previous) = self.replace_dispatch(dispatch) {
                    previous.abort();
                }

                if let Err(e) = self.reconcile().await {
                    error!(error = %e, "initial reconciliation failed");
                }
            }
            Err(e) => {
                let first_failure = {
                    let mut state =
                        self.listener_state.lock().expect("listener state lock poisoned");
                    let first = *state == ListenerState::Unregistered;
                    *state = ListenerState::Backoff;
                    first
                };
                warn!(error = %e, "change listener registration failed");
                self.emit_event(RegistryEvent::ListenerRegistrationFailed {
                    error: e.to_string(),
                });
                if first_failure {
                    self.listener_retry.start();
                } else {
                    self.listener_retry.notify_failed();
                }
            }
        }
    }

    async fn dispatch_loop(
        registry: Weak<AccountRegistry>,
        mut stream: crate::traits::change_source::ChangeEventStream,
    ) {
        while let Some(event) = stream.next().await {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            if let Err(e) = registry.handle_change_event(event).await {
                error!(error = %e, "failed to handle change event");
            }
        }

        // Stream end means the notification system went away. Recovery goes
        // through the retry scheduler; awaiting the registration attempt here
        // would make this future and the attempt mutually recursive.
        if let Some(registry) = registry.upgrade() {
            warn!("change stream ended, scheduling listener re-registration");
            registry.set_listener_state(ListenerState::Unregistered);
            registry.emit_event(RegistryEvent::ListenerLost);
            registry.listener_retry.start();
        }
    }

    async fn poll_authority_readiness(self: &Arc<Self>) {
        if self.collab.authority.is_ready().await {
            self.readiness_poll.stop();
            info!("account authority ready");
            if let Err(e) = self.reconcile().await {
                error!(error = %e, "reconciliation after readiness failed");
            }
        } else {
            self.readiness_poll.notify_failed();
        }
    }

    // ---- reconciliation ----------------------------------------------------

    /// Run a full teardown-then-rebuild reconciliation pass
    ///
    /// All inputs are gathered before the collection lock is taken, so a
    /// failed gather leaves the previous set untouched. The teardown and the
    /// rebuild happen under one lock acquisition; orphan cleanup and the
    /// default-outgoing repair follow after release.
    pub async fn reconcile(self: &Arc<Self>) -> Result<()> {
        if !self.collab.authority.is_ready().await {
            debug!("authority not ready, deferring reconciliation");
            self.readiness_poll.start();
            return Ok(());
        }

        let user = self.user();
        let lines = self.collab.lines.enumerate_lines().await?;
        let ctx = self.gather_context(user).await;
        let default_voice = self.collab.lines.default_voice_line().await;
        let prefs = self.gather_emergency_preference().await;

        let mut eligible: Vec<Line> = Vec::new();
        for line in lines {
            if !line.id.is_valid() {
                debug!(line = %line.id, "skipping line with invalid id");
                continue;
            }
            match self.collab.lines.subscription_record(line.id).await {
                Ok(Some(record)) => {
                    if record.opportunistic || record.provisioning || record.satellite_only {
                        debug!(line = %line.id, "line ineligible for an account");
                        continue;
                    }
                    eligible.push(line);
                }
                Ok(None) => {
                    debug!(line = %line.id, "no subscription record, skipping line");
                }
                Err(e) => {
                    warn!(line = %line.id, error = %e, "subscription record lookup failed");
                }
            }
        }

        let emergency_anchor = if eligible.is_empty() {
            Some(self.collab.lines.default_line().await?)
        } else {
            None
        };

        let mut table = self.table.lock().await;

        for entry in table.entries.iter_mut() {
            entry.teardown(&self.collab).await;
        }
        table.entries.clear();

        let mut new_entries: Vec<AccountEntry> = Vec::new();
        let mut streams: Vec<(usize, LineId, LineEventStream)> = Vec::new();

        for line in eligible {
            let preferred = capability::is_emergency_preferred(
                self.collab.platform.as_ref(),
                &prefs.for_line(line.id),
            );
            match AccountEntry::new(
                &self.collab,
                &self.config,
                &ctx,
                line,
                false,
                false,
                user,
                preferred,
            )
            .await
            {
                Ok((entry, stream)) => {
                    if let Some(stream) = stream {
                        streams.push((new_entries.len(), entry.line_id(), stream));
                    }
                    new_entries.push(entry);
                }
                // The entry never existed: registration failed before any
                // partial state could leak.
                Err(e) => {
                    error!(error = %e, "failed to build account entry, skipping line");
                }
            }
        }

        let emergency_active = if let Some(line) = emergency_anchor {
            match AccountEntry::new(
                &self.collab,
                &self.config,
                &ctx,
                line,
                true,
                false,
                user,
                false,
            )
            .await
            {
                Ok((entry, _)) => {
                    info!(handle = %entry.handle(), "emergency-only account active");
                    new_entries.push(entry);
                    true
                }
                Err(e) => {
                    error!(error = %e, "failed to build emergency account");
                    false
                }
            }
        } else {
            false
        };

        for (index, line_id, stream) in streams {
            let watcher = self.spawn_line_watcher(line_id, stream);
            new_entries[index].set_watcher(watcher);
        }

        table.handle_to_line = new_entries
            .iter()
            .map(|entry| (entry.handle().clone(), entry.line_id()))
            .collect();
        let current: HashSet<AccountHandle> = table.handle_to_line.keys().cloned().collect();
        let accounts = new_entries.len();
        table.entries = new_entries;
        table.last_reconcile = Some(Utc::now());
        drop(table);

        self.repair_default_outgoing(default_voice).await;
        self.cleanup_orphans(&current).await;

        info!(accounts, emergency_active, "reconciliation completed");
        self.emit_event(RegistryEvent::ReconcileCompleted {
            accounts,
            emergency_active,
        });
        Ok(())
    }

    /// Remove registrations our component owns that the live set no longer
    /// contains
    ///
    /// Covers registrations left behind by a previous run of the process as
    /// well as entries dropped by the pass that just completed.
    async fn cleanup_orphans(&self, current: &HashSet<AccountHandle>) {
        let registered = match self
            .collab
            .authority
            .list_accounts(self.config.cleanup_call_capable_only)
            .await
        {
            Ok(handles) => handles,
            Err(e) => {
                warn!(error = %e, "orphan cleanup skipped, listing failed");
                return;
            }
        };

        for handle in registered {
            if handle.component.0 != self.config.component || current.contains(&handle) {
                continue;
            }
            match self.collab.authority.unregister(&handle).await {
                Ok(()) => {
                    info!(handle = %handle, "removed orphaned registration");
                    self.emit_event(RegistryEvent::OrphanRemoved { handle });
                }
                Err(e) => {
                    warn!(handle = %handle, error = %e, "failed to remove orphan");
                }
            }
        }
    }

    /// Point the default outgoing account at the default voice line
    ///
    /// Forces the selection when it is unset or when our own component's
    /// previous selection no longer matches the resolved handle. A selection
    /// made by a foreign component is left alone.
    async fn repair_default_outgoing(&self, default_voice: LineId) {
        if !default_voice.is_valid() {
            return;
        }
        let resolved = {
            let table = self.table.lock().await;
            table
                .entries
                .iter()
                .find(|entry| entry.line_id() == default_voice && !entry.is_emergency())
                .map(|entry| entry.handle().clone())
        };
        let Some(resolved) = resolved else { return };

        let outgoing = match self.collab.authority.outgoing_account().await {
            Ok(outgoing) => outgoing,
            Err(e) => {
                warn!(error = %e, "default-outgoing lookup failed");
                return;
            }
        };
        match &outgoing {
            Some(current) if *current == resolved => return,
            Some(current) if current.component.0 != self.config.component => return,
            _ => {}
        }

        match self.collab.authority.set_outgoing_account(&resolved).await {
            Ok(()) => info!(to = %resolved, "default outgoing repointed"),
            Err(e) => warn!(error = %e, "failed to repoint default outgoing"),
        }
    }

    // ---- change-event handling ---------------------------------------------

    async fn handle_change_event(self: &Arc<Self>, event: ChangeEvent) -> Result<()> {
        debug!(?event, "change event");
        match event {
            ChangeEvent::LineSetChanged => self.reconcile().await,
            // Only the transition into service rebuilds; repeated in-service
            // notifications and shuffling between out-of-service states just
            // re-evaluate RTT eligibility.
            ChangeEvent::ServiceStateChanged(state) => {
                let into_service = {
                    let mut last = self
                        .service_state
                        .lock()
                        .expect("service state lock poisoned");
                    let came = state == ServiceState::InService
                        && matches!(*last, Some(previous) if previous != ServiceState::InService);
                    *last = Some(state);
                    came
                };
                if into_service {
                    self.reconcile().await
                } else {
                    self.refresh_rtt_all().await
                }
            }
            ChangeEvent::UserSwitched(user) => {
                self.current_user.store(user.0, Ordering::SeqCst);
                self.reconcile().await
            }
            ChangeEvent::ActiveDataLineChanged(_) => self.refresh_emergency_preference().await,
            // Emergency-RTT country eligibility is locale-derived, so these
            // rebuild rather than refresh
            ChangeEvent::LocaleChanged | ChangeEvent::NetworkCountryChanged => {
                self.reconcile().await
            }
            ChangeEvent::RttSettingChanged => self.refresh_rtt_all().await,
            ChangeEvent::ContactDiscoverySettingChanged => self.refresh_video_presence_all().await,
            ChangeEvent::CarrierConfigChanged(line_id) => self.re_register_line(line_id).await,
        }
    }

    /// Rebuild the entries anchored on one line after its carrier config
    /// changed
    async fn re_register_line(self: &Arc<Self>, line_id: LineId) -> Result<()> {
        let ctx = self.gather_context(self.user()).await;
        let mut table = self.table.lock().await;
        let mut touched = false;
        for entry in table.entries.iter_mut() {
            if entry.line_id() != line_id {
                continue;
            }
            touched = true;
            if let Err(e) = entry.re_register(&self.collab, &self.config, &ctx).await {
                warn!(handle = %entry.handle(), error = %e, "re-registration failed");
            }
        }
        if !touched {
            debug!(line = %line_id, "carrier config change for line without an entry");
        }
        Ok(())
    }

    async fn refresh_emergency_preference(self: &Arc<Self>) -> Result<()> {
        let ctx = self.gather_context(self.user()).await;
        let prefs = self.gather_emergency_preference().await;
        let mut table = self.table.lock().await;
        for entry in table.entries.iter_mut() {
            if entry.is_emergency() {
                continue;
            }
            let preferred = capability::is_emergency_preferred(
                self.collab.platform.as_ref(),
                &prefs.for_line(entry.line_id()),
            );
            if let Err(e) = entry
                .update_emergency_preferred(&self.collab, &ctx, preferred)
                .await
            {
                warn!(handle = %entry.handle(), error = %e, "emergency-preference update failed");
            }
        }
        Ok(())
    }

    async fn refresh_rtt_all(self: &Arc<Self>) -> Result<()> {
        let ctx = self.gather_context(self.user()).await;
        let mut table = self.table.lock().await;
        for entry in table.entries.iter_mut() {
            if let Err(e) = entry.refresh_rtt(&self.collab, &self.config, &ctx).await {
                warn!(handle = %entry.handle(), error = %e, "RTT refresh failed");
            }
        }
        Ok(())
    }

    async fn refresh_video_presence_all(self: &Arc<Self>) -> Result<()> {
        let ctx = self.gather_context(self.user()).await;
        let mut table = self.table.lock().await;
        for entry in table.entries.iter_mut() {
            if let Err(e) = entry.refresh_video_presence(&self.collab, &ctx).await {
                warn!(handle = %entry.handle(), error = %e, "video-presence refresh failed");
            }
        }
        Ok(())
    }

    // ---- per-line capability events ----------------------------------------

    fn spawn_line_watcher(self: &Arc<Self>, line_id: LineId, mut stream: LineEventStream) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                registry.apply_line_event(line_id, event).await;
            }
        })
    }

    /// Apply one capability event to the entry for a line
    ///
    /// The membership check and the update happen under the same lock
    /// acquisition, so an event that raced a reconciliation pass either sees
    /// the entry it was meant for or is dropped.
    async fn apply_line_event(self: &Arc<Self>, line_id: LineId, event: LineEvent) {
        let ctx = self.gather_context(self.user()).await;
        let mut table = self.table.lock().await;
        let entry = table
            .entries
            .iter_mut()
            .find(|entry| entry.line_id() == line_id && !entry.is_emergency() && !entry.is_test());
        let Some(entry) = entry else {
            debug!(line = %line_id, ?event, "late capability event, entry gone");
            return;
        };

        let result = match event {
            LineEvent::CapabilityStatus {
                video_capable,
                call_composer_capable,
            } => {
                let video = entry
                    .update_video_capability(&self.collab, &ctx, video_capable)
                    .await;
                let composer = entry
                    .update_call_composer(&self.collab, &ctx, call_composer_capable)
                    .await;
                video.and(composer)
            }
            LineEvent::RegistrationState(state) => {
                entry
                    .update_registration_state(&self.collab, &ctx, state)
                    .await
            }
            LineEvent::SimultaneousCalling(supported) => {
                entry
                    .update_simultaneous_calling(&self.collab, &ctx, supported)
                    .await
            }
        };
        if let Err(e) = result {
            warn!(line = %line_id, error = %e, "capability event update failed");
        }
    }

    // ---- query surface -----------------------------------------------------

    /// Whether an account for this handle is currently published
    pub async fn has_account(&self, handle: &AccountHandle) -> bool {
        self.table.lock().await.handle_to_line.contains_key(handle)
    }

    /// The published handle for a line's regular account, if any
    pub async fn handle_for_line(&self, line_id: LineId) -> Option<AccountHandle> {
        let table = self.table.lock().await;
        table
            .entries
            .iter()
            .find(|entry| entry.line_id() == line_id && !entry.is_emergency() && !entry.is_test())
            .map(|entry| entry.handle().clone())
    }

    /// The line backing a published handle, if any
    pub async fn line_for_handle(&self, handle: &AccountHandle) -> Option<LineId> {
        self.table.lock().await.handle_to_line.get(handle).copied()
    }

    /// Whether an entry-level capability holds for a published handle
    ///
    /// `false` for unknown handles.
    pub async fn is_capability_supported(
        &self,
        handle: &AccountHandle,
        capability: EntryCapability,
    ) -> bool {
        let table = self.table.lock().await;
        table
            .entries
            .iter()
            .find(|entry| entry.handle() == handle)
            .map(|entry| entry.entry_capability(capability))
            .unwrap_or(false)
    }

    /// The published address of a handle, if any
    pub async fn address_for_handle(&self, handle: &AccountHandle) -> Option<Address> {
        let table = self.table.lock().await;
        table
            .entries
            .iter()
            .find(|entry| entry.handle() == handle)
            .and_then(|entry| entry.record().address.clone())
    }

    /// Point-in-time status snapshot
    pub async fn status(&self) -> RegistryStatus {
        let table = self.table.lock().await;
        RegistryStatus {
            listener: *self.listener_state.lock().expect("listener state lock poisoned"),
            accounts: table
                .entries
                .iter()
                .map(|entry| entry.handle().to_string())
                .collect(),
            emergency_active: table.entries.iter().any(AccountEntry::is_emergency),
            last_reconcile: table.last_reconcile,
        }
    }

    // ---- internals ---------------------------------------------------------

    fn user(&self) -> UserId {
        UserId(self.current_user.load(Ordering::SeqCst))
    }

    async fn gather_context(&self, user: UserId) -> RecordContext {
        let merged_identities = match self.collab.lines.merged_group_identities().await {
            Ok(identities) => identities,
            Err(e) => {
                warn!(error = %e, "merged-group lookup failed, grouping disabled");
                Vec::new()
            }
        };
        let primary_number = match self.collab.lines.primary_line_number().await {
            Ok(number) => number,
            Err(e) => {
                warn!(error = %e, "primary-number lookup failed, grouping disabled");
                None
            }
        };
        RecordContext {
            merged_identities,
            primary_number,
            user_supports_video: self.collab.platform.user_supports_video(user),
        }
    }

    async fn gather_emergency_preference(&self) -> PreferenceInputs {
        let active_data = self.collab.lines.active_data_line().await;
        let user_default_data = self.collab.lines.default_data_line().await;
        let active_data_opportunistic = if active_data.is_valid() {
            match self.collab.lines.line(active_data).await {
                Ok(Some(line)) => line.opportunistic,
                _ => false,
            }
        } else {
            false
        };
        PreferenceInputs {
            require_default_data_for_emergency_supl: self
                .config
                .require_default_data_for_emergency_supl,
            active_data,
            active_data_opportunistic,
            user_default_data,
        }
    }

    fn set_listener_state(&self, state: ListenerState) {
        *self.listener_state.lock().expect("listener state lock poisoned") = state;
    }

    fn replace_dispatch(&self, handle: JoinHandle<()>) -> Option<JoinHandle<()>> {
        self.dispatch
            .lock()
            .expect("dispatch lock poisoned")
            .replace(handle)
    }

    fn take_dispatch(&self) -> Option<JoinHandle<()>> {
        self.dispatch.lock().expect("dispatch lock poisoned").take()
    }

    fn emit_event(&self, event: RegistryEvent) {
        // Monitoring is best-effort; a full channel drops the event rather
        // than blocking reconciliation.
        if self.event_tx.try_send(event).is_err() {
            warn!("registry event channel full, dropping event");
        }
    }
}

/// Line-independent emergency-preference inputs, gathered once per pass
struct PreferenceInputs {
    require_default_data_for_emergency_supl: bool,
    active_data: LineId,
    active_data_opportunistic: bool,
    user_default_data: LineId,
}

impl PreferenceInputs {
    fn for_line(&self, queried: LineId) -> EmergencyPreference {
        EmergencyPreference {
            require_default_data_for_emergency_supl: self.require_default_data_for_emergency_supl,
            queried,
            active_data: self.active_data,
            active_data_opportunistic: self.active_data_opportunistic,
            user_default_data: self.user_default_data,
        }
    }
}
