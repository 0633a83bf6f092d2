//! Minimal embedding example for telsync-core
//!
//! This example demonstrates using telsync-core as a library in a custom
//! application, with the simulated collaborators from telsync-sim standing
//! in for a real telephony stack. The registry lifecycle is fully managed
//! by the application.

use std::sync::Arc;
use telsync_core::traits::capability_notifier::LineEvent;
use telsync_core::traits::change_source::ChangeEvent;
use telsync_core::traits::line_provider::{ImsRegState, Line, LineRecord};
use telsync_core::{AccountRegistry, Collaborators, LineId, RegistryConfig, Result, UserId};
use telsync_sim::{
    SimAuthority, SimCarrierConfig, SimChangeSource, SimLineProvider, SimNotifier, SimPlatform,
};

fn line(id: i32, slot_index: usize, name: &str) -> Line {
    Line {
        id: LineId(id),
        display_name: name.to_string(),
        number: Some(format!("+1555000{id:04}")),
        slot_index,
        icon: None,
        highlight_color: 0xFF2266AA,
        group_identity: None,
        opportunistic: false,
        roaming: false,
        wifi_calling: false,
        ims_voice_available: true,
        video_capable: false,
        ims_registration: ImsRegState::Registered,
    }
}

fn record(id: i32) -> LineRecord {
    LineRecord {
        line_id: LineId(id),
        opportunistic: false,
        provisioning: false,
        satellite_only: false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    println!("=== Embedded telsync-core Example ===\n");

    // Create simulated collaborators
    let lines = SimLineProvider::new();
    let authority = SimAuthority::new();
    let notifier = SimNotifier::new();
    let changes = SimChangeSource::new();

    lines.upsert_line(line(1, 0, "Carrier One"), record(1)).await;
    lines.set_default_line(line(1, 0, "Carrier One")).await;
    lines.set_default_data(LineId(1)).await;
    lines.set_default_voice(LineId(1)).await;
    lines.set_active_data(LineId(1)).await;

    let collab = Collaborators {
        lines: Arc::new(lines.clone()),
        authority: Arc::new(authority.clone()),
        notifier: Arc::new(notifier.clone()),
        carrier: Arc::new(SimCarrierConfig::new()),
        platform: Arc::new(SimPlatform::new()),
    };

    // Create and start the registry
    println!("1. Creating registry...");
    let (registry, mut events) = AccountRegistry::new(
        collab,
        Arc::new(changes.clone()),
        RegistryConfig::default(),
        UserId(0),
    )?;

    let event_listener = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    println!("2. Starting registry...");
    registry.start().await;
    println!(
        "   {} account(s) published\n",
        authority.account_count().await
    );

    // A second line appears
    println!("3. Adding a second line...");
    lines.upsert_line(line(2, 1, "Carrier Two"), record(2)).await;
    changes.push(ChangeEvent::LineSetChanged);
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    println!(
        "   {} account(s) published\n",
        authority.account_count().await
    );

    // Video capability comes up on line 1
    println!("4. Pushing a capability event...");
    notifier
        .push(
            LineId(1),
            LineEvent::CapabilityStatus {
                video_capable: true,
                call_composer_capable: false,
            },
        )
        .await;
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let status = registry.status().await;
    println!("5. Status: {:?}\n", status.accounts);

    println!("6. Stopping registry...");
    registry.stop("example finished").await;
    event_listener.abort();

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Registry lifecycle is fully controlled by application");
    println!("- No global state");
    println!("- Collaborators are swappable trait objects");

    Ok(())
}
