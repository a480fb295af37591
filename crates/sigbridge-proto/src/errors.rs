//! Protocol error taxonomy.
//!
//! Every variant here corresponds to input that is dropped, not escalated:
//! the bridge logs the error and carries on. Nothing in this crate is a
//! fatal condition.

use thiserror::Error;

/// Errors produced while decoding wire input.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Datagram is not exactly one frame long.
    #[error("bad frame length: expected {expected} bytes, got {actual}")]
    FrameLength {
        /// Required frame size
        expected: usize,
        /// Received datagram size
        actual: usize,
    },

    /// Frame MAC did not verify against the pre-shared key.
    ///
    /// Deliberately carries no detail: the sender gets no NACK and the log
    /// line reveals nothing about which check failed.
    #[error("frame signature mismatch")]
    BadSignature,

    /// Display-link line was not a parseable record.
    #[error("unparseable display record: {0}")]
    DisplayParse(#[from] serde_json::Error),

    /// Signing key override was not 128 hex-encoded bytes.
    #[error("bad signing key: {0}")]
    BadKey(String),
}
