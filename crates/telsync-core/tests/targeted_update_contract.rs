//! Contract Test: Targeted Updates
//!
//! Verifies that non-structural changes update only the affected entry and
//! only when the underlying value actually changed:
//! - Capability events republish the record with the new bits
//! - An event carrying the cached value publishes nothing
//! - The ad-hoc conference bit is explicitly cleared, not merely left unset
//! - A carrier-config change rebuilds only the matching line's entry
//! - Service-state notifications rebuild only on the transition into service
//! - The emergency-preferred capability follows the active data line
//!
//! If one of these fails, the registry has regressed to full rebuilds for
//! targeted changes, or worse, to publishing records that never converge.

mod common;

use common::*;
use std::time::Duration;
use telsync_core::account::{Capabilities, LineId};
use telsync_core::traits::capability_notifier::LineEvent;
use telsync_core::traits::carrier_config::{keys, ConfigBundle};
use telsync_core::traits::change_source::ChangeEvent;
use telsync_core::traits::line_provider::{ImsRegState, ServiceState};

#[tokio::test]
async fn capability_event_republishes_changed_bits() {
    let config = test_config();
    let h = harness(config.clone());
    h.lines.add_line(test_line(1, 0, "Carrier"), eligible_record(1));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    let handle = regular_handle(&config, 1);
    let before = h.authority.record_for(&handle).expect("registered");
    assert!(!before.capabilities.has(Capabilities::VIDEO_CALLING));

    assert!(h.notifier.push(
        LineId(1),
        LineEvent::CapabilityStatus {
            video_capable: true,
            call_composer_capable: false,
        },
    ));
    tokio::time::sleep(Duration::from_millis(80)).await;

    let after = h.authority.record_for(&handle).expect("still registered");
    assert!(after.capabilities.has(Capabilities::VIDEO_CALLING));
}

#[tokio::test]
async fn event_carrying_cached_value_publishes_nothing() {
    let config = test_config();
    let h = harness(config.clone());
    h.lines.add_line(test_line(1, 0, "Carrier"), eligible_record(1));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    let handle = regular_handle(&config, 1);
    let baseline = h.authority.register_call_count_for(&handle);

    // video_capable is already false and composer is already off
    h.notifier.push(
        LineId(1),
        LineEvent::CapabilityStatus {
            video_capable: false,
            call_composer_capable: false,
        },
    );
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(
        h.authority.register_call_count_for(&handle),
        baseline,
        "an event matching the cache must not republish"
    );
}

#[tokio::test]
async fn adhoc_conference_bit_is_explicitly_cleared() {
    let config = test_config();
    let h = harness(config.clone());

    let mut bundle = ConfigBundle::new();
    bundle.put_bool(keys::SUPPORTS_ADHOC_CONFERENCE, true);
    h.carrier.set_config(LineId(1), bundle);

    h.lines.add_line(test_line(1, 0, "Carrier"), eligible_record(1));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    let handle = regular_handle(&config, 1);
    let registered = h.authority.record_for(&handle).expect("registered");
    assert!(
        registered
            .capabilities
            .has(Capabilities::ADHOC_CONFERENCE_CALLING),
        "IMS registered plus carrier support sets the bit"
    );

    h.notifier.push(
        LineId(1),
        LineEvent::RegistrationState(ImsRegState::Unregistered),
    );
    tokio::time::sleep(Duration::from_millis(80)).await;

    let deregistered = h.authority.record_for(&handle).expect("still registered");
    assert!(
        !deregistered
            .capabilities
            .has(Capabilities::ADHOC_CONFERENCE_CALLING),
        "losing IMS registration must clear the previously published bit"
    );
}

#[tokio::test]
async fn carrier_config_change_rebuilds_only_matching_line() {
    let config = test_config();
    let h = harness(config.clone());
    h.lines.add_line(test_line(1, 0, "Carrier One"), eligible_record(1));
    h.lines.add_line(test_line(2, 1, "Carrier Two"), eligible_record(2));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    let handle_one = regular_handle(&config, 1);
    let handle_two = regular_handle(&config, 2);
    let baseline_one = h.authority.register_call_count_for(&handle_one);
    let baseline_two = h.authority.register_call_count_for(&handle_two);

    let mut bundle = ConfigBundle::new();
    bundle.put_bool(keys::SUPPORTS_VIDEO_PAUSE, true);
    bundle.put_bool(keys::SUPPORTS_INSTANT_LETTERING, true);
    h.carrier.set_config(LineId(1), bundle);
    h.changes.push(ChangeEvent::CarrierConfigChanged(LineId(1)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        h.authority.register_call_count_for(&handle_one),
        baseline_one + 1,
        "the changed line's record is republished once"
    );
    assert_eq!(
        h.authority.register_call_count_for(&handle_two),
        baseline_two,
        "the unrelated line's record is untouched"
    );
    let record = h.authority.record_for(&handle_one).expect("registered");
    assert!(record.capabilities.has(Capabilities::CALL_SUBJECT));

    // Re-registration is idempotent: the same event with no intervening
    // config change rebuilds an identical record and publishes nothing
    h.changes.push(ChangeEvent::CarrierConfigChanged(LineId(1)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        h.authority.register_call_count_for(&handle_one),
        baseline_one + 1
    );
}

#[tokio::test]
async fn only_the_transition_into_service_rebuilds() {
    let config = test_config();
    let h = harness(config.clone());
    h.lines.add_line(test_line(1, 0, "Carrier"), eligible_record(1));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    // Every full pass re-subscribes the line, so the subscribe count is a
    // reliable rebuild counter
    let baseline = h.notifier.subscribe_call_count();

    for _ in 0..3 {
        h.changes
            .push(ChangeEvent::ServiceStateChanged(ServiceState::InService));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        h.notifier.subscribe_call_count(),
        baseline,
        "in-service notifications without a transition must not rebuild"
    );

    h.changes
        .push(ChangeEvent::ServiceStateChanged(ServiceState::OutOfService));
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(
        h.notifier.subscribe_call_count(),
        baseline,
        "dropping out of service takes the RTT-refresh path"
    );

    h.changes
        .push(ChangeEvent::ServiceStateChanged(ServiceState::InService));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        h.notifier.subscribe_call_count(),
        baseline + 1,
        "coming back into service rebuilds exactly once"
    );
}

#[tokio::test]
async fn re_registration_follows_the_refreshed_line_snapshot() {
    let config = test_config();
    let h = harness(config.clone());
    h.lines.add_line(test_line(1, 0, "Carrier"), eligible_record(1));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    let handle = regular_handle(&config, 1);
    let before = h.authority.record_for(&handle).expect("registered");
    assert!(!before.capabilities.has(Capabilities::VIDEO_CALLING));

    // The provider's view of the line changed without a capability event
    let mut updated = test_line(1, 0, "Carrier");
    updated.video_capable = true;
    h.lines.set_line(updated);

    h.changes.push(ChangeEvent::CarrierConfigChanged(LineId(1)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let after = h.authority.record_for(&handle).expect("still registered");
    assert!(
        after.capabilities.has(Capabilities::VIDEO_CALLING),
        "the rebuilt record must reflect the refreshed line, not stale caches"
    );
}

#[tokio::test]
async fn emergency_preference_follows_active_data_line() {
    let mut config = test_config();
    config.require_default_data_for_emergency_supl = true;
    let h = harness(config.clone());
    h.platform
        .subscription_count
        .store(2, std::sync::atomic::Ordering::SeqCst);

    h.lines.add_line(test_line(1, 0, "Carrier One"), eligible_record(1));
    h.lines.add_line(test_line(2, 1, "Carrier Two"), eligible_record(2));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    let handle_one = regular_handle(&config, 1);
    let handle_two = regular_handle(&config, 2);
    let record = h.authority.record_for(&handle_one).expect("registered");
    assert!(record.capabilities.has(Capabilities::EMERGENCY_PREFERRED));

    // Temporary data switch to line 2
    h.lines.set_active_data(LineId(2));
    h.changes.push(ChangeEvent::ActiveDataLineChanged(LineId(2)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let one = h.authority.record_for(&handle_one).expect("registered");
    let two = h.authority.record_for(&handle_two).expect("registered");
    assert!(
        !one.capabilities.has(Capabilities::EMERGENCY_PREFERRED),
        "preference leaves the old line"
    );
    assert!(
        two.capabilities.has(Capabilities::EMERGENCY_PREFERRED),
        "preference follows the active data line"
    );
}

#[tokio::test]
async fn rtt_setting_toggle_updates_published_records() {
    let config = test_config();
    let h = harness(config.clone());
    h.lines.add_line(test_line(1, 0, "Carrier"), eligible_record(1));
    h.lines.set_defaults(LineId(1), LineId(1), LineId(1));
    h.registry.start().await;

    let handle = regular_handle(&config, 1);
    let before = h.authority.record_for(&handle).expect("registered");
    assert!(!before.capabilities.has(Capabilities::RTT));

    h.platform.rtt_lines.lock().unwrap().insert(LineId(1), true);
    h.changes.push(ChangeEvent::RttSettingChanged);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let after = h.authority.record_for(&handle).expect("registered");
    assert!(after.capabilities.has(Capabilities::RTT));
}
