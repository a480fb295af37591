//! Wire formats for the sigbridge signal bridge.
//!
//! Three independent representations of the same signal values cross this
//! crate:
//!
//! - [`SignalFrame`]: the fixed 14-byte signed binary UDP frame
//! - [`DisplayRecord`]: newline-delimited JSON records on the display link
//! - [`telemetry`]: the packed 64-bit coprocessor telemetry word
//!
//! Everything here is pure encoding/decoding with no I/O; transport and
//! arbitration live in `sigbridge-bridge`.

mod display;
mod errors;
mod frame;
pub mod telemetry;

pub use display::{DisplayEvent, DisplayOp, DisplayRecord, EventKind};
pub use errors::ProtocolError;
pub use frame::{ACK_OK, ACK_SET, FRAME_LEN, SignKey, SignalFrame};

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;
