//! Signal definitions and the typed value union.

use serde::Deserialize;

use crate::error::ConfigError;

/// Who is allowed to originate writes to a signal.
///
/// This is the configuration-level category: `Network` is deliberately
/// absent — network clients write to `Local`-sourced signals under mode
/// gating instead of owning signals of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    /// Driven from this host (display events, network writes, derived logic).
    Local,
    /// Owned by the real-time coprocessor; only RPC-originated writes stick.
    Coprocessor,
}

impl SignalSource {
    /// Wire spelling, as used in display-link records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Coprocessor => "coprocessor",
        }
    }
}

/// The channel a write arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// Display-link event.
    Local,
    /// Coprocessor telemetry ingestion.
    Rpc,
    /// Signed network frame.
    Network,
    /// Value derived by a combination rule.
    Logic,
}

impl WriteOrigin {
    /// Wire spelling, as used in display-link records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Rpc => "rpc",
            Self::Network => "network",
            Self::Logic => "logic",
        }
    }
}

/// Value type of a signal, fixed at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// IEEE-754 double on this side, single precision on the network wire.
    Float,
    /// Signed integer, two's-complement on the network wire.
    Int,
    /// Boolean, carried as 0/1 on the display link and 0.0/1.0 on the network.
    Bool,
}

impl SignalType {
    /// The per-type zero value.
    #[must_use]
    pub fn default_value(self) -> SignalValue {
        match self {
            Self::Float => SignalValue::Float(0.0),
            Self::Int => SignalValue::Int(0),
            Self::Bool => SignalValue::Bool(false),
        }
    }
}

/// A signal's current value. The runtime variant always matches the
/// signal's [`SignalType`]; the registry coerces on every accepted write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalValue {
    /// Float-typed value.
    Float(f64),
    /// Int-typed value.
    Int(i64),
    /// Bool-typed value.
    Bool(bool),
}

impl SignalValue {
    /// Numeric view of the value (bool as 0/1).
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Float(v) => v,
            Self::Int(v) => v as f64,
            Self::Bool(v) => f64::from(u8::from(v)),
        }
    }

    /// Truthiness (non-zero).
    #[must_use]
    pub fn as_bool(self) -> bool {
        match self {
            Self::Float(v) => v != 0.0,
            Self::Int(v) => v != 0,
            Self::Bool(v) => v,
        }
    }

    /// Coerce a raw number into the given type.
    #[must_use]
    pub fn coerce(kind: SignalType, raw: f64) -> Self {
        match kind {
            SignalType::Float => Self::Float(raw),
            SignalType::Int => Self::Int(raw as i64),
            SignalType::Bool => Self::Bool(raw != 0.0),
        }
    }

    /// Apply a delta in the signal's native type.
    ///
    /// Float math stays in f64; int math truncates the delta first; bool
    /// "addition" follows numeric truthiness (0 + 1 → true, 1 + 1 → true).
    #[must_use]
    pub fn add(self, delta: f64) -> Self {
        match self {
            Self::Float(v) => Self::Float(v + delta),
            Self::Int(v) => Self::Int(v.wrapping_add(delta as i64)),
            Self::Bool(v) => Self::Bool(f64::from(u8::from(v)) + delta != 0.0),
        }
    }

    /// Validate a configured default against the signal's type.
    ///
    /// Booleans accept JSON `true`/`false` or 0/1 numbers; numeric types
    /// accept any JSON number.
    pub fn from_config(kind: SignalType, raw: &serde_json::Value) -> Result<Self, ConfigError> {
        let mismatch = || ConfigError::DefaultTypeMismatch {
            expected: kind,
            found: raw.clone(),
        };

        match kind {
            SignalType::Bool => match raw {
                serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
                serde_json::Value::Number(n) => Ok(Self::Bool(n.as_f64().ok_or_else(mismatch)? != 0.0)),
                _ => Err(mismatch()),
            },
            SignalType::Int => {
                raw.as_i64().map(Self::Int).ok_or_else(mismatch)
            },
            SignalType::Float => {
                raw.as_f64().map(Self::Float).ok_or_else(mismatch)
            },
        }
    }

    /// Display-link representation: numbers pass through, bools become 0/1.
    #[must_use]
    pub fn to_display_json(self) -> serde_json::Value {
        match self {
            Self::Float(v) => serde_json::Number::from_f64(v)
                .map_or(serde_json::Value::from(0), serde_json::Value::Number),
            Self::Int(v) => serde_json::Value::from(v),
            Self::Bool(v) => serde_json::Value::from(u8::from(v)),
        }
    }

    /// Big-endian 4-byte network encoding.
    ///
    /// `Int` signals travel as two's-complement; `Float` and `Bool` as
    /// IEEE-754 single precision.
    #[must_use]
    pub fn to_wire_bytes(self) -> [u8; 4] {
        match self {
            Self::Int(v) => (v as i32).to_be_bytes(),
            Self::Float(v) => (v as f32).to_be_bytes(),
            Self::Bool(v) => f32::from(u8::from(v)).to_be_bytes(),
        }
    }
}

/// One named, typed, uniquely-identified piece of shared state.
#[derive(Debug, Clone)]
pub struct Signal {
    /// Unique name, the primary identity everywhere except the UDP wire.
    pub name: String,
    /// One-byte wire identifier for the UDP protocol.
    pub id: u8,
    /// Write-ownership category.
    pub source: SignalSource,
    /// Value type, fixed at load time.
    pub kind: SignalType,
    /// Remote procedure invoked before display-driven writes are accepted.
    pub rpc_setter: Option<String>,
    /// Current canonical value. Variant always matches `kind`.
    pub value: SignalValue,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn coercion_matches_type() {
        assert_eq!(SignalValue::coerce(SignalType::Float, 2.5), SignalValue::Float(2.5));
        assert_eq!(SignalValue::coerce(SignalType::Int, 2.9), SignalValue::Int(2));
        assert_eq!(SignalValue::coerce(SignalType::Bool, 0.0), SignalValue::Bool(false));
        assert_eq!(SignalValue::coerce(SignalType::Bool, -1.0), SignalValue::Bool(true));
    }

    #[test]
    fn native_type_add() {
        assert_eq!(SignalValue::Float(1.25).add(0.25), SignalValue::Float(1.5));
        assert_eq!(SignalValue::Int(10).add(-3.7), SignalValue::Int(7));
        assert_eq!(SignalValue::Bool(false).add(1.0), SignalValue::Bool(true));
        assert_eq!(SignalValue::Bool(true).add(-1.0), SignalValue::Bool(false));
    }

    #[test]
    fn config_defaults_are_type_checked() {
        assert_eq!(
            SignalValue::from_config(SignalType::Bool, &json!(true)).unwrap(),
            SignalValue::Bool(true)
        );
        assert_eq!(
            SignalValue::from_config(SignalType::Bool, &json!(1)).unwrap(),
            SignalValue::Bool(true)
        );
        assert_eq!(
            SignalValue::from_config(SignalType::Int, &json!(42)).unwrap(),
            SignalValue::Int(42)
        );
        assert_eq!(
            SignalValue::from_config(SignalType::Float, &json!(4)).unwrap(),
            SignalValue::Float(4.0)
        );

        assert!(SignalValue::from_config(SignalType::Int, &json!("12")).is_err());
        assert!(SignalValue::from_config(SignalType::Bool, &json!("yes")).is_err());
    }

    #[test]
    fn display_json_carries_bool_as_number() {
        assert_eq!(SignalValue::Bool(true).to_display_json(), json!(1));
        assert_eq!(SignalValue::Bool(false).to_display_json(), json!(0));
        assert_eq!(SignalValue::Int(-5).to_display_json(), json!(-5));
        assert_eq!(SignalValue::Float(5.0).to_display_json(), json!(5.0));
    }

    #[test]
    fn wire_bytes_are_big_endian_per_type() {
        assert_eq!(SignalValue::Int(-1).to_wire_bytes(), [0xFF; 4]);
        assert_eq!(SignalValue::Float(5.0).to_wire_bytes(), 5.0f32.to_be_bytes());
        assert_eq!(SignalValue::Bool(true).to_wire_bytes(), 1.0f32.to_be_bytes());
    }
}
