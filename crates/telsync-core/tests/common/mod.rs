//! Test doubles and common utilities for reconciliation contract tests
//!
//! The doubles here count calls and record what was published, so tests can
//! assert on the registry's externally visible behavior without a real
//! telephony stack behind the collaborator traits.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use telsync_core::account::{AccountHandle, AccountRecord, Capabilities, LineId, UserId};
use telsync_core::traits::account_authority::AccountAuthority;
use telsync_core::traits::capability_notifier::{CapabilityNotifier, LineEvent, LineEventStream};
use telsync_core::traits::carrier_config::{CarrierConfig, ConfigBundle};
use telsync_core::traits::change_source::{ChangeEvent, ChangeEventStream, ChangeSource};
use telsync_core::traits::line_provider::{ImsRegState, Line, LineProvider, LineRecord};
use telsync_core::traits::platform::Platform;
use telsync_core::{
    AccountRegistry, BackoffConfig, Collaborators, Error, RegistryConfig, Result,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Registry config with short backoffs suitable for sleep-based tests
pub fn test_config() -> RegistryConfig {
    RegistryConfig {
        listener_backoff: BackoffConfig {
            initial_delay_ms: 20,
            ceiling_ms: 160,
            multiplier: 2,
        },
        readiness_backoff: BackoffConfig {
            initial_delay_ms: 10,
            ceiling_ms: 80,
            multiplier: 2,
        },
        ..RegistryConfig::default()
    }
}

/// A baseline line with sane defaults for tests
pub fn test_line(id: i32, slot_index: usize, name: &str) -> Line {
    Line {
        id: LineId(id),
        display_name: name.to_string(),
        number: Some(format!("+1555000{id:04}")),
        slot_index,
        icon: None,
        highlight_color: 0xFF112233,
        group_identity: None,
        opportunistic: false,
        roaming: false,
        wifi_calling: false,
        ims_voice_available: true,
        video_capable: false,
        ims_registration: ImsRegState::Registered,
    }
}

/// A subscription record that makes a line account-eligible
pub fn eligible_record(id: i32) -> LineRecord {
    LineRecord {
        line_id: LineId(id),
        opportunistic: false,
        provisioning: false,
        satellite_only: false,
    }
}

// ---- line provider ---------------------------------------------------------

#[derive(Default)]
struct FakeLineState {
    lines: Vec<Line>,
    records: HashMap<LineId, LineRecord>,
    default_data: Option<LineId>,
    default_voice: Option<LineId>,
    active_data: Option<LineId>,
    default_line: Option<Line>,
    merged_identities: Vec<String>,
    primary_number: Option<String>,
}

/// A line provider whose table tests mutate directly
#[derive(Default)]
pub struct FakeLineProvider {
    state: Mutex<FakeLineState>,
    enumerate_calls: AtomicUsize,
}

impl FakeLineProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_line(&self, line: Line, record: LineRecord) {
        let mut state = self.state.lock().unwrap();
        state.records.insert(line.id, record);
        if state.default_line.is_none() {
            state.default_line = Some(line.clone());
        }
        if let Some(existing) = state.lines.iter_mut().find(|l| l.id == line.id) {
            *existing = line;
        } else {
            state.lines.push(line);
        }
    }

    pub fn remove_line(&self, line_id: LineId) {
        let mut state = self.state.lock().unwrap();
        state.lines.retain(|l| l.id != line_id);
        state.records.remove(&line_id);
    }

    pub fn set_line(&self, line: Line) {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.lines.iter_mut().find(|l| l.id == line.id) {
            *existing = line;
        }
    }

    pub fn set_default_line(&self, line: Line) {
        self.state.lock().unwrap().default_line = Some(line);
    }

    pub fn set_defaults(&self, data: LineId, voice: LineId, active: LineId) {
        let mut state = self.state.lock().unwrap();
        state.default_data = Some(data);
        state.default_voice = Some(voice);
        state.active_data = Some(active);
    }

    pub fn set_active_data(&self, line_id: LineId) {
        self.state.lock().unwrap().active_data = Some(line_id);
    }

    pub fn set_merged_group(&self, identities: Vec<String>, primary_number: Option<String>) {
        let mut state = self.state.lock().unwrap();
        state.merged_identities = identities;
        state.primary_number = primary_number;
    }

    pub fn enumerate_call_count(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LineProvider for FakeLineProvider {
    async fn enumerate_lines(&self) -> Result<Vec<Line>> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().lines.clone())
    }

    async fn line(&self, line_id: LineId) -> Result<Option<Line>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .lines
            .iter()
            .find(|l| l.id == line_id)
            .cloned())
    }

    async fn subscription_record(&self, line_id: LineId) -> Result<Option<LineRecord>> {
        Ok(self.state.lock().unwrap().records.get(&line_id).cloned())
    }

    async fn default_data_line(&self) -> LineId {
        self.state
            .lock()
            .unwrap()
            .default_data
            .unwrap_or(LineId::INVALID)
    }

    async fn default_voice_line(&self) -> LineId {
        self.state
            .lock()
            .unwrap()
            .default_voice
            .unwrap_or(LineId::INVALID)
    }

    async fn active_data_line(&self) -> LineId {
        self.state
            .lock()
            .unwrap()
            .active_data
            .unwrap_or(LineId::INVALID)
    }

    async fn default_line(&self) -> Result<Line> {
        self.state
            .lock()
            .unwrap()
            .default_line
            .clone()
            .ok_or_else(|| Error::line_provider("no default line configured"))
    }

    async fn merged_group_identities(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().merged_identities.clone())
    }

    async fn primary_line_number(&self) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().primary_number.clone())
    }
}

// ---- account authority -----------------------------------------------------

#[derive(Default)]
struct AuthorityState {
    accounts: HashMap<AccountHandle, AccountRecord>,
    outgoing: Option<AccountHandle>,
    register_calls_per_handle: HashMap<AccountHandle, usize>,
    unregistered: Vec<AccountHandle>,
}

/// An authority that records every register/unregister call
pub struct RecordingAuthority {
    ready: AtomicBool,
    state: Mutex<AuthorityState>,
    register_calls: AtomicUsize,
}

impl RecordingAuthority {
    pub fn new() -> Arc<Self> {
        Self::with_readiness(true)
    }

    pub fn with_readiness(ready: bool) -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(ready),
            state: Mutex::new(AuthorityState::default()),
            register_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().unwrap().accounts.len()
    }

    pub fn registered_handles(&self) -> Vec<AccountHandle> {
        self.state.lock().unwrap().accounts.keys().cloned().collect()
    }

    pub fn record_for(&self, handle: &AccountHandle) -> Option<AccountRecord> {
        self.state.lock().unwrap().accounts.get(handle).cloned()
    }

    pub fn register_call_count(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn register_call_count_for(&self, handle: &AccountHandle) -> usize {
        self.state
            .lock()
            .unwrap()
            .register_calls_per_handle
            .get(handle)
            .copied()
            .unwrap_or(0)
    }

    pub fn unregistered_handles(&self) -> Vec<AccountHandle> {
        self.state.lock().unwrap().unregistered.clone()
    }

    /// Pre-seed a registration, simulating leftovers from an earlier run
    pub fn seed_registration(&self, record: AccountRecord) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(record.handle.clone(), record);
    }

    pub fn seed_outgoing(&self, handle: AccountHandle) {
        self.state.lock().unwrap().outgoing = Some(handle);
    }

    pub fn outgoing(&self) -> Option<AccountHandle> {
        self.state.lock().unwrap().outgoing.clone()
    }
}

#[async_trait]
impl AccountAuthority for RecordingAuthority {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn register(&self, record: &AccountRecord) -> Result<()> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(Error::AuthorityNotReady);
        }
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        *state
            .register_calls_per_handle
            .entry(record.handle.clone())
            .or_insert(0) += 1;
        state.accounts.insert(record.handle.clone(), record.clone());
        Ok(())
    }

    async fn unregister(&self, handle: &AccountHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.accounts.remove(handle);
        state.unregistered.push(handle.clone());
        if state.outgoing.as_ref() == Some(handle) {
            state.outgoing = None;
        }
        Ok(())
    }

    async fn outgoing_account(&self) -> Result<Option<AccountHandle>> {
        Ok(self.state.lock().unwrap().outgoing.clone())
    }

    async fn set_outgoing_account(&self, handle: &AccountHandle) -> Result<()> {
        self.state.lock().unwrap().outgoing = Some(handle.clone());
        Ok(())
    }

    async fn list_accounts(&self, call_capable_only: bool) -> Result<Vec<AccountHandle>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .values()
            .filter(|record| {
                !call_capable_only || record.capabilities.has(Capabilities::CALL_PROVIDER)
            })
            .map(|record| record.handle.clone())
            .collect())
    }
}

// ---- capability notifier ---------------------------------------------------

/// A notifier that hands out channels and lets tests push events
#[derive(Default)]
pub struct FakeNotifier {
    subscribers: Mutex<HashMap<LineId, mpsc::UnboundedSender<LineEvent>>>,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Push an event; `false` when no live subscription exists
    pub fn push(&self, line_id: LineId, event: LineEvent) -> bool {
        let subscribers = self.subscribers.lock().unwrap();
        match subscribers.get(&line_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn subscribe_call_count(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_call_count(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn live_subscription_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait]
impl CapabilityNotifier for FakeNotifier {
    async fn subscribe(&self, line_id: LineId) -> Result<LineEventStream> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().insert(line_id, tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn unsubscribe(&self, line_id: LineId) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().remove(&line_id);
    }
}

// ---- carrier config --------------------------------------------------------

/// A carrier-config table tests fill per line
#[derive(Default)]
pub struct StaticCarrierConfig {
    bundles: Mutex<HashMap<LineId, ConfigBundle>>,
}

impl StaticCarrierConfig {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_config(&self, line_id: LineId, bundle: ConfigBundle) {
        self.bundles.lock().unwrap().insert(line_id, bundle);
    }
}

impl CarrierConfig for StaticCarrierConfig {
    fn config_for(&self, line_id: LineId) -> Option<ConfigBundle> {
        self.bundles.lock().unwrap().get(&line_id).cloned()
    }
}

// ---- platform --------------------------------------------------------------

/// Platform double with per-field knobs
pub struct FakePlatform {
    pub country: Mutex<Option<String>>,
    pub video_allowed: AtomicBool,
    pub device_rtt: AtomicBool,
    pub emergency_rtt: AtomicBool,
    pub rtt_lines: Mutex<BTreeMap<LineId, bool>>,
    pub composer_lines: Mutex<BTreeMap<LineId, bool>>,
    pub discovery_lines: Mutex<BTreeMap<LineId, bool>>,
    pub subscription_count: AtomicUsize,
    pub multi_sim: AtomicBool,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            country: Mutex::new(Some("us".to_string())),
            video_allowed: AtomicBool::new(true),
            device_rtt: AtomicBool::new(false),
            emergency_rtt: AtomicBool::new(false),
            rtt_lines: Mutex::new(BTreeMap::new()),
            composer_lines: Mutex::new(BTreeMap::new()),
            discovery_lines: Mutex::new(BTreeMap::new()),
            subscription_count: AtomicUsize::new(1),
            multi_sim: AtomicBool::new(false),
        })
    }
}

impl Platform for FakePlatform {
    fn country_code(&self) -> Option<String> {
        self.country.lock().unwrap().clone()
    }

    fn user_supports_video(&self, _user: UserId) -> bool {
        self.video_allowed.load(Ordering::SeqCst)
    }

    fn device_rtt_supported(&self) -> bool {
        self.device_rtt.load(Ordering::SeqCst)
    }

    fn emergency_rtt_supported(&self) -> bool {
        self.emergency_rtt.load(Ordering::SeqCst)
    }

    fn rtt_setting_enabled(&self, line_id: LineId) -> bool {
        self.rtt_lines
            .lock()
            .unwrap()
            .get(&line_id)
            .copied()
            .unwrap_or(false)
    }

    fn call_composer_enabled(&self, line_id: LineId) -> bool {
        self.composer_lines
            .lock()
            .unwrap()
            .get(&line_id)
            .copied()
            .unwrap_or(false)
    }

    fn contact_discovery_enabled(&self, line_id: LineId) -> bool {
        self.discovery_lines
            .lock()
            .unwrap()
            .get(&line_id)
            .copied()
            .unwrap_or(false)
    }

    fn active_subscription_count(&self) -> usize {
        self.subscription_count.load(Ordering::SeqCst)
    }

    fn multi_sim(&self) -> bool {
        self.multi_sim.load(Ordering::SeqCst)
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

    fn supports_handover_from(&self, _line_id: LineId) -> bool {
        false
    }

    fn supports_video_calling_fallback(&self, _line_id: LineId) -> bool {
        false
    }
}

// ---- change source ---------------------------------------------------------

/// A change source tests drive; the first `failing` watch calls fail
pub struct FakeChangeSource {
    sender: Mutex<Option<mpsc::UnboundedSender<ChangeEvent>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ChangeEvent>>>,
    failures_left: AtomicUsize,
    watch_calls: AtomicUsize,
}

impl FakeChangeSource {
    pub fn new() -> Arc<Self> {
        Self::failing_first(0)
    }

    pub fn failing_first(failing: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            failures_left: AtomicUsize::new(failing),
            watch_calls: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, event: ChangeEvent) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            let _ = sender.send(event);
        }
    }

    /// Drop the sending half, ending a handed-out stream
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }

    pub fn watch_call_count(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeSource for FakeChangeSource {
    async fn watch(&self) -> Result<ChangeEventStream> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::listener("notification system unavailable"));
        }
        match self.receiver.lock().unwrap().take() {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(Error::listener("change stream already consumed")),
        }
    }
}

// ---- harness ---------------------------------------------------------------

/// Everything a contract test needs, with handles to every double
pub struct Harness {
    pub registry: Arc<AccountRegistry>,
    pub lines: Arc<FakeLineProvider>,
    pub authority: Arc<RecordingAuthority>,
    pub notifier: Arc<FakeNotifier>,
    pub carrier: Arc<StaticCarrierConfig>,
    pub platform: Arc<FakePlatform>,
    pub changes: Arc<FakeChangeSource>,
}

/// Build a registry wired to fresh doubles
pub fn harness(config: RegistryConfig) -> Harness {
    harness_with(
        config,
        FakeLineProvider::new(),
        RecordingAuthority::new(),
        FakeChangeSource::new(),
    )
}

pub fn harness_with(
    config: RegistryConfig,
    lines: Arc<FakeLineProvider>,
    authority: Arc<RecordingAuthority>,
    changes: Arc<FakeChangeSource>,
) -> Harness {
    let notifier = FakeNotifier::new();
    let carrier = StaticCarrierConfig::new();
    let platform = FakePlatform::new();

    let collab = Collaborators {
        lines: lines.clone(),
        authority: authority.clone(),
        notifier: notifier.clone(),
        carrier: carrier.clone(),
        platform: platform.clone(),
    };
    let (registry, _events) = AccountRegistry::new(collab, changes.clone(), config, UserId(0))
        .expect("registry construction succeeds");

    Harness {
        registry,
        lines,
        authority,
        notifier,
        carrier,
        platform,
        changes,
    }
}

/// The handle the registry publishes for a regular line account
pub fn regular_handle(config: &RegistryConfig, id: i32) -> AccountHandle {
    AccountHandle::for_line(
        telsync_core::account::ComponentName::new(config.component.clone()),
        LineId(id),
        false,
        false,
        UserId(0),
    )
}

/// The handle the registry publishes for the emergency-only account
pub fn emergency_handle(config: &RegistryConfig, id: i32) -> AccountHandle {
    AccountHandle::for_line(
        telsync_core::account::ComponentName::new(config.component.clone()),
        LineId(id),
        true,
        false,
        UserId(0),
    )
}
