//! Line-oriented display-link protocol.
//!
//! Each line is one UTF-8 JSON object with a single top-level key naming
//! the record kind:
//!
//! - `{"display_event": {...}}` — both directions. Outbound events carry
//!   `event_kind = "set_value"` with the new value and write origin;
//!   inbound events carry `event_kind = "button_press"` with a delta and
//!   an `op` of `set` or `add`.
//! - `{"display_config": {...}}` — pushed once at startup, verbatim from
//!   configuration.
//!
//! Boolean values are carried as 0/1 numbers; the display unit has no
//! native boolean type.

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// One display-link record (one line on the wire).
///
/// Externally tagged so each variant serializes as the single-top-level-key
/// object the display firmware expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisplayRecord {
    /// A signal event, either direction.
    #[serde(rename = "display_event")]
    Event(DisplayEvent),

    /// One-shot configuration payload, passed through verbatim.
    #[serde(rename = "display_config")]
    Config(serde_json::Value),
}

impl DisplayRecord {
    /// Parse one line from the display unit.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Serialize to a newline-terminated wire line.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Kind discriminator inside a `display_event` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Outbound: the canonical value of a signal changed.
    SetValue,
    /// Inbound: the operator pressed a control on the display unit.
    ButtonPress,
}

/// Math operation requested by an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayOp {
    /// Replace the current value.
    #[default]
    Set,
    /// Add the delta to the current value (native-type math).
    Add,
}

/// Body of a `display_event` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayEvent {
    /// Record kind.
    pub event_kind: EventKind,

    /// Target signal name.
    pub name: String,

    /// New value or delta. Always a JSON number on the wire.
    pub value: serde_json::Value,

    /// Write origin, outbound only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Requested operation, inbound only. Missing means `set`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<DisplayOp>,
}

impl DisplayEvent {
    /// Build an outbound `set_value` event.
    #[must_use]
    pub fn set_value(name: &str, value: serde_json::Value, origin: &str) -> Self {
        Self {
            event_kind: EventKind::SetValue,
            name: name.to_string(),
            value,
            origin: Some(origin.to_string()),
            op: None,
        }
    }

    /// The event's value as a plain number. `None` for non-numeric input.
    #[must_use]
    pub fn value_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}
