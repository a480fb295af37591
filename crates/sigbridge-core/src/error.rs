//! Configuration error types.
//!
//! These are the bridge's only fatal errors: a table that fails to load
//! terminates startup with a diagnostic. Everything after load is
//! logged-and-dropped, never escalated.

use thiserror::Error;

use crate::signal::SignalType;

/// Errors raised while loading and validating the signal table.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("cannot read config file '{path}': {source}")]
    Io {
        /// Path that was attempted
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON of the expected shape.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A signal id does not fit one byte or is not a parseable integer.
    #[error("signal '{name}': invalid id '{raw}'")]
    InvalidId {
        /// Signal being defined
        name: String,
        /// Offending id literal
        raw: String,
    },

    /// Two signals share one wire id.
    #[error("duplicate signal id {id}: '{first}' and '{second}'")]
    DuplicateId {
        /// Shared wire id
        id: u8,
        /// First signal with this id
        first: String,
        /// Second signal with this id
        second: String,
    },

    /// A configured default does not match the signal's declared type.
    #[error("default value {found} does not match declared type {expected:?}")]
    DefaultTypeMismatch {
        /// Declared signal type
        expected: SignalType,
        /// Configured default
        found: serde_json::Value,
    },
}
