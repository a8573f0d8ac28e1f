//! Error types for Costwatch
//!
//! Only startup paths (configuration, socket binding, serving) surface these.
//! Per-request failures are folded into [`crate::billing::CostReading`] and
//! [`crate::alerting::AlertOutcome`] instead.

use thiserror::Error;

/// Result type alias using Costwatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Costwatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
