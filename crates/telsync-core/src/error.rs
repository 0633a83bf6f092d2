//! Error types for the account reconciliation core
//!
//! This module defines all error types used throughout the crate.
//!
//! Note that per the propagation policy, none of these errors escape to
//! callers of the registry's public surface: failures are logged, retried
//! with backoff, or degraded to fail-closed defaults internally. The error
//! type exists for the collaborator traits and for internal plumbing.

use crate::account::LineId;
use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reconciliation system
#[derive(Error, Debug)]
pub enum Error {
    /// Account authority errors (register/unregister/query)
    #[error("account authority error: {0}")]
    Authority(String),

    /// The account authority is not yet ready to accept registrations
    #[error("account authority not ready")]
    AuthorityNotReady,

    /// Line provider errors (enumeration, subscription records)
    #[error("line provider error: {0}")]
    LineProvider(String),

    /// Change-listener registration errors
    #[error("listener registration error: {0}")]
    Listener(String),

    /// Per-line capability subscription errors
    #[error("capability subscription error: {0}")]
    Subscription(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A line id that is invalid or unknown to the line provider
    #[error("invalid line: {0}")]
    InvalidLine(LineId),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an account authority error
    pub fn authority(msg: impl Into<String>) -> Self {
        Self::Authority(msg.into())
    }

    /// Create a line provider error
    pub fn line_provider(msg: impl Into<String>) -> Self {
        Self::LineProvider(msg.into())
    }

    /// Create a listener registration error
    pub fn listener(msg: impl Into<String>) -> Self {
        Self::Listener(msg.into())
    }

    /// Create a capability subscription error
    pub fn subscription(msg: impl Into<String>) -> Self {
        Self::Subscription(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
