// # telsync-sim
//
// In-memory implementations of every core collaborator trait.
//
// ## Purpose
//
// These simulated collaborators back the daemon in environments without a
// real telephony stack:
// - CI and integration testing
// - Local development and debugging
// - Demonstrations of the reconciliation flow
//
// Every implementation exposes mutators that change its state and, where the
// real system would emit a notification, pushes the matching event so the
// registry reacts the same way it would in production.

pub mod authority;
pub mod carrier;
pub mod changes;
pub mod lines;
pub mod notifier;
pub mod platform;

pub use authority::SimAuthority;
pub use carrier::SimCarrierConfig;
pub use changes::SimChangeSource;
pub use lines::SimLineProvider;
pub use notifier::SimNotifier;
pub use platform::SimPlatform;
