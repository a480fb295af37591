//! Domain model for the sigbridge signal bridge.
//!
//! Owns the canonical signal table and the rules for mutating it: one
//! typed value per named signal, a per-signal write-ownership rule, and a
//! binary operating mode projected from the designated `mode_set` signal.
//! Pure logic with no I/O; the transports and the arbitration driver live
//! in `sigbridge-bridge`.

pub mod config;
pub mod env;
mod error;
mod registry;
mod signal;

pub use config::{BridgeConfig, SignalSpec};
pub use error::ConfigError;
pub use registry::{AcceptedWrite, MODE_SIGNAL, Mode, SignalRegistry, WriteOutcome};
pub use signal::{Signal, SignalSource, SignalType, SignalValue, WriteOrigin};
