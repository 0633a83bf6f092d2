//! Configuration types for the reconciliation controller
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Component name our published handles are registered under
    #[serde(default = "default_component")]
    pub component: String,

    /// Backoff policy for retrying change-listener registration
    ///
    /// Runs until the listener registers successfully, then is stopped for
    /// the life of the process.
    #[serde(default = "default_listener_backoff")]
    pub listener_backoff: BackoffConfig,

    /// Backoff policy for polling account-authority readiness
    #[serde(default = "default_readiness_backoff")]
    pub readiness_backoff: BackoffConfig,

    /// Orphan cleanup scope
    ///
    /// When true, only call-capable registered handles are queried and
    /// reconciled against the live set; otherwise all handles belonging to
    /// our component are.
    #[serde(default)]
    pub cleanup_call_capable_only: bool,

    /// Countries (ISO codes) where emergency RTT is supported
    ///
    /// Matched case-insensitively against the current network country.
    #[serde(default)]
    pub emergency_rtt_countries: Vec<String>,

    /// Device policy: a default-data preference is required for emergency
    /// SUPL, making the emergency-preferred capability reachable at all
    #[serde(default)]
    pub require_default_data_for_emergency_supl: bool,

    /// Capacity of the change-event dispatch channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl RegistryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.component.is_empty() {
            return Err(crate::Error::config("component name cannot be empty"));
        }
        self.listener_backoff.validate("listener_backoff")?;
        self.readiness_backoff.validate("readiness_backoff")?;
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            component: default_component(),
            listener_backoff: default_listener_backoff(),
            readiness_backoff: default_readiness_backoff(),
            cleanup_call_capable_only: false,
            emergency_rtt_countries: Vec::new(),
            require_default_data_for_emergency_supl: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Exponential backoff policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first attempt, in milliseconds
    pub initial_delay_ms: u64,

    /// Ceiling the doubled delay saturates at, in milliseconds
    pub ceiling_ms: u64,

    /// Multiplier applied on each failure
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

impl BackoffConfig {
    /// Validate the backoff configuration
    pub fn validate(&self, context: &str) -> Result<(), crate::Error> {
        if self.initial_delay_ms == 0 {
            return Err(crate::Error::config(format!(
                "{context}: initial_delay_ms must be > 0"
            )));
        }
        if self.ceiling_ms < self.initial_delay_ms {
            return Err(crate::Error::config(format!(
                "{context}: ceiling_ms must be >= initial_delay_ms"
            )));
        }
        if self.multiplier < 2 {
            return Err(crate::Error::config(format!(
                "{context}: multiplier must be >= 2"
            )));
        }
        Ok(())
    }

    /// Initial delay as a [`Duration`]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Ceiling as a [`Duration`]
    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }
}

fn default_component() -> String {
    "telsync.connection".to_string()
}

fn default_listener_backoff() -> BackoffConfig {
    BackoffConfig {
        initial_delay_ms: 1_000,
        ceiling_ms: 60_000,
        multiplier: default_multiplier(),
    }
}

fn default_readiness_backoff() -> BackoffConfig {
    BackoffConfig {
        initial_delay_ms: 250,
        ceiling_ms: 4_000,
        multiplier: default_multiplier(),
    }
}

fn default_multiplier() -> u32 {
    2
}

fn default_event_channel_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policies() {
        let config = RegistryConfig::default();
        assert_eq!(config.listener_backoff.initial_delay_ms, 1_000);
        assert_eq!(config.listener_backoff.ceiling_ms, 60_000);
        assert_eq!(config.readiness_backoff.initial_delay_ms, 250);
        assert_eq!(config.readiness_backoff.ceiling_ms, 4_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_inverted_backoff() {
        let mut config = RegistryConfig::default();
        config.readiness_backoff.ceiling_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_empty_component() {
        let config = RegistryConfig {
            component: String::new(),
            ..RegistryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
