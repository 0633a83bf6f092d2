// # Simulated Account Authority
//
// In-memory implementation of AccountAuthority.
//
// Stores registered records in a HashMap keyed by handle (upsert semantics,
// matching the real authority's contract) and exposes the readiness flag as
// a mutator so startup sequences can be simulated.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use telsync_core::account::{AccountHandle, AccountRecord, Capabilities};
use telsync_core::traits::account_authority::AccountAuthority;
use telsync_core::Error;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct AuthorityState {
    accounts: HashMap<AccountHandle, AccountRecord>,
    outgoing: Option<AccountHandle>,
}

/// In-memory account authority
#[derive(Debug, Clone)]
pub struct SimAuthority {
    ready: Arc<AtomicBool>,
    inner: Arc<RwLock<AuthorityState>>,
}

impl SimAuthority {
    /// Create an authority that is immediately ready
    pub fn new() -> Self {
        Self::with_readiness(true)
    }

    /// Create an authority with an explicit initial readiness
    pub fn with_readiness(ready: bool) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(ready)),
            inner: Arc::new(RwLock::new(AuthorityState::default())),
        }
    }

    /// Flip the readiness flag
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Current number of registered accounts
    pub async fn account_count(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    /// The registered record for a handle, if any
    pub async fn record_for(&self, handle: &AccountHandle) -> Option<AccountRecord> {
        self.inner.read().await.accounts.get(handle).cloned()
    }

    /// Pre-seed a registration, simulating leftovers from an earlier run
    pub async fn seed_registration(&self, record: AccountRecord) {
        let mut state = self.inner.write().await;
        state.accounts.insert(record.handle.clone(), record);
    }
}

impl Default for SimAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountAuthority for SimAuthority {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn register(&self, record: &AccountRecord) -> Result<(), Error> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(Error::AuthorityNotReady);
        }
        let mut state = self.inner.write().await;
        debug!(handle = %record.handle, "sim authority register");
        state.accounts.insert(record.handle.clone(), record.clone());
        Ok(())
    }

    async fn unregister(&self, handle: &AccountHandle) -> Result<(), Error> {
        let mut state = self.inner.write().await;
        state.accounts.remove(handle);
        if state.outgoing.as_ref() == Some(handle) {
            state.outgoing = None;
        }
        Ok(())
    }

    async fn outgoing_account(&self) -> Result<Option<AccountHandle>, Error> {
        Ok(self.inner.read().await.outgoing.clone())
    }

    async fn set_outgoing_account(&self, handle: &AccountHandle) -> Result<(), Error> {
        let mut state = self.inner.write().await;
        if !state.accounts.contains_key(handle) {
            return Err(Error::authority(format!("unknown handle {handle}")));
        }
        state.outgoing = Some(handle.clone());
        Ok(())
    }

    async fn list_accounts(&self, call_capable_only: bool) -> Result<Vec<AccountHandle>, Error> {
        let state = self.inner.read().await;
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
