// # Account Authority Trait
//
// Defines the interface to the external call-routing authority that accepts
// account registrations and exposes the currently selected outgoing account.
//
// ## Contract
//
// - Registration with the same handle replaces the previously published
//   record (upsert semantics); the handle is the join key.
// - Calls are assumed synchronous and fast. The core performs them outside
//   its collection lock except during a reconciliation pass.
// - The authority owns no retry logic: when it is not ready, the core polls
//   `is_ready()` with backoff rather than retrying individual calls.

use crate::account::{AccountHandle, AccountRecord};
use async_trait::async_trait;

/// Trait for the external account-registration authority
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait AccountAuthority: Send + Sync {
    /// Whether the authority is ready to accept registrations
    ///
    /// Polled with backoff at startup; the initial reconciliation pass runs
    /// once this first reports `true`.
    async fn is_ready(&self) -> bool;

    /// Register (or replace) a published account record
    ///
    /// # Idempotency
    ///
    /// Registering an identical record for an already-registered handle is a
    /// no-op from the caller's perspective.
    async fn register(&self, record: &AccountRecord) -> Result<(), crate::Error>;

    /// Unregister a published account
    ///
    /// Unregistering an unknown handle is not an error.
    async fn unregister(&self, handle: &AccountHandle) -> Result<(), crate::Error>;

    /// The currently selected default outgoing account, if any
    async fn outgoing_account(&self) -> Result<Option<AccountHandle>, crate::Error>;

    /// Select the default outgoing account
    async fn set_outgoing_account(&self, handle: &AccountHandle) -> Result<(), crate::Error>;

    /// List registered handles
    ///
    /// Returns handles from every registering component; callers filter to
    /// their own. When `call_capable_only` is set, only handles whose records
    /// carry the call-provider capability are returned.
    async fn list_accounts(
        &self,
        call_capable_only: bool,
    ) -> Result<Vec<AccountHandle>, crate::Error>;
}
