//! Runtime error types.
//!
//! Only two failure classes here are fatal, and both are startup-time:
//! an unloadable configuration and an unopenable display link. Everything
//! the bridge hits after startup is logged at the point of failure and
//! absorbed.

use thiserror::Error;

/// Errors that can abort the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration load/validation failure. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] sigbridge_core::ConfigError),

    /// Display link could not be opened. Fatal at startup.
    #[error("display link error: {0}")]
    DisplayLink(String),

    /// Network transport failure (bind, local address).
    #[error("transport error: {0}")]
    Transport(String),
}
