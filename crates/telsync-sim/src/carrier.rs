// # Simulated Carrier Config
//
// In-memory implementation of CarrierConfig.
//
// The lookup is synchronous in the core, so the table sits behind a std
// RwLock rather than an async one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use telsync_core::traits::carrier_config::{CarrierConfig, ConfigBundle};
use telsync_core::LineId;

/// In-memory carrier-config table
#[derive(Debug, Clone, Default)]
pub struct SimCarrierConfig {
    bundles: Arc<RwLock<HashMap<LineId, ConfigBundle>>>,
}

impl SimCarrierConfig {
    /// Create a table with no per-line config
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the bundle for a line
    pub fn set_config(&self, line_id: LineId, bundle: ConfigBundle) {
        self.bundles
            .write()
            .expect("carrier table lock poisoned")
            .insert(line_id, bundle);
    }

    /// Remove the bundle for a line, restoring config-absence defaults
    pub fn clear_config(&self, line_id: LineId) {
        self.bundles
            .write()
            .expect("carrier table lock poisoned")
            .remove(&line_id);
    }
}

impl CarrierConfig for SimCarrierConfig {
    fn config_for(&self, line_id: LineId) -> Option<ConfigBundle> {
        self.bundles
            .read()
            .expect("carrier table lock poisoned")
            .get(&line_id)
            .cloned()
    }
}
