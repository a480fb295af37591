//! Canonical signal table and the mode projection.
//!
//! The registry is the single source of truth for every signal value. Two
//! lookup paths cover both wire identities (name for the display link and
//! RPC, one-byte id for the UDP protocol). All mutation goes through
//! [`SignalRegistry::set`], which enforces the one mode-independent
//! ownership rule and recomputes the operating mode as a side effect of
//! writes to the designated mode signal.
//!
//! Mode gating of display and network writes is a policy of the driver,
//! not of the registry: the registry only owns the table and the
//! coprocessor-ownership rule.

use std::collections::{BTreeMap, HashMap};

use crate::{
    config::BridgeConfig,
    error::ConfigError,
    signal::{Signal, SignalSource, SignalType, SignalValue, WriteOrigin},
};

/// Name of the signal whose boolean value selects the operating mode.
pub const MODE_SIGNAL: &str = "mode_set";

/// Current authoritative-write owner for non-coprocessor signals.
///
/// A pure projection of the `mode_set` signal: `true` selects `Remote`
/// (network clients authoritative), `false` selects `Local` (display
/// unit authoritative). There is no other entry point and no
/// timeout-based transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Display unit may originate writes.
    #[default]
    Local,
    /// Network clients may originate writes.
    Remote,
}

impl Mode {
    fn from_flag(remote: bool) -> Self {
        if remote { Self::Remote } else { Self::Local }
    }

    /// Lowercase spelling for log lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Result of a [`SignalRegistry::set`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Value stored; the caller must fan the write out to both channels.
    Applied(AcceptedWrite),
    /// No such signal; logged, no state change.
    Unknown,
    /// Coprocessor-owned signal written from a non-RPC origin; dropped.
    Rejected,
}

/// Snapshot of an accepted write, carrying everything the propagation
/// side effects need.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedWrite {
    /// Signal name.
    pub name: String,
    /// Wire id.
    pub id: u8,
    /// Signal type.
    pub kind: SignalType,
    /// Stored (coerced) value.
    pub value: SignalValue,
    /// Channel the write arrived through.
    pub origin: WriteOrigin,
    /// New mode, if this write changed the mode projection.
    pub mode_changed: Option<Mode>,
}

/// The canonical table of signals.
#[derive(Debug)]
pub struct SignalRegistry {
    /// Signals by name. BTreeMap keeps full-broadcast order deterministic.
    signals: BTreeMap<String, Signal>,
    /// Wire id → name index for the UDP path.
    ids: HashMap<u8, String>,
    /// Mode projection, always equal to `mode_set`'s boolean value.
    mode: Mode,
}

impl SignalRegistry {
    /// Build the table from configuration.
    ///
    /// Validates ids (one byte, unique) and configured defaults (must match
    /// the declared type), then derives the initial mode from `mode_set`.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        let mut signals = BTreeMap::new();
        let mut ids: HashMap<u8, String> = HashMap::new();

        for (name, spec) in &config.signals {
            let id = spec.id.resolve().ok_or_else(|| ConfigError::InvalidId {
                name: name.clone(),
                raw: spec.id.raw(),
            })?;

            if let Some(first) = ids.get(&id) {
                return Err(ConfigError::DuplicateId {
                    id,
                    first: first.clone(),
                    second: name.clone(),
                });
            }

            let value = match &spec.default {
                Some(raw) => SignalValue::from_config(spec.kind, raw)?,
                None => spec.kind.default_value(),
            };

            ids.insert(id, name.clone());
            signals.insert(
                name.clone(),
                Signal {
                    name: name.clone(),
                    id,
                    source: spec.source,
                    kind: spec.kind,
                    rpc_setter: spec.rpc_set_func.clone(),
                    value,
                },
            );
        }

        let mode = Mode::from_flag(
            signals.get(MODE_SIGNAL).is_some_and(|sig| sig.value.as_bool()),
        );

        tracing::info!(signals = signals.len(), mode = mode.as_str(), "signal table loaded");
        Ok(Self { signals, ids, mode })
    }

    /// Current value of a signal. Unknown names read as the zero value;
    /// callers that care about membership use [`SignalRegistry::signal`].
    #[must_use]
    pub fn get(&self, name: &str) -> SignalValue {
        self.signals.get(name).map_or(SignalValue::Int(0), |sig| sig.value)
    }

    /// Definition lookup by name.
    #[must_use]
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    /// Definition lookup by wire id.
    #[must_use]
    pub fn signal_by_id(&self, id: u8) -> Option<&Signal> {
        self.ids.get(&id).and_then(|name| self.signals.get(name))
    }

    /// Current operating mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// All signals, in stable name order.
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    /// Number of signals in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Store a new value for a signal.
    ///
    /// The value is coerced to the signal's declared type before storage,
    /// so the runtime variant can never drift. The one hard ownership rule
    /// lives here: coprocessor-owned signals only accept RPC-originated
    /// writes, independent of mode. Mode gating of the display and network
    /// channels happens in the driver before this call.
    pub fn set(&mut self, name: &str, value: SignalValue, origin: WriteOrigin) -> WriteOutcome {
        let Some(sig) = self.signals.get_mut(name) else {
            tracing::warn!(name, "set of unknown signal dropped");
            return WriteOutcome::Unknown;
        };

        if sig.source == SignalSource::Coprocessor && origin != WriteOrigin::Rpc {
            tracing::debug!(name, origin = origin.as_str(), "write to coprocessor-owned signal rejected");
            return WriteOutcome::Rejected;
        }

        let value = SignalValue::coerce(sig.kind, value.as_f64());
        sig.value = value;
        let (id, kind) = (sig.id, sig.kind);

        let mode_changed = if name == MODE_SIGNAL {
            self.mode = Mode::from_flag(value.as_bool());
            tracing::info!(mode = self.mode.as_str(), "mode changed");
            Some(self.mode)
        } else {
            None
        };

        tracing::debug!(name, origin = origin.as_str(), value = ?value, "signal set");
        WriteOutcome::Applied(AcceptedWrite {
            name: name.to_string(),
            id,
            kind,
            value,
            origin,
            mode_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SignalRegistry {
        let config: BridgeConfig = serde_json::from_str(
            r#"{
                "signals": {
                    "mode_set": { "id": 1, "source": "local", "type": "bool" },
                    "volt_act": { "id": "0x10", "source": "coprocessor", "type": "float" },
                    "volt_set": { "id": 17, "source": "local", "type": "float",
                                  "rpc_set_func": "set_volt", "default": 12.0 },
                    "count":    { "id": 30, "source": "local", "type": "int" }
                }
            }"#,
        )
        .unwrap();
        SignalRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn builds_both_indexes_and_defaults() {
        let reg = registry();
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.get("volt_set"), SignalValue::Float(12.0));
        assert_eq!(reg.get("volt_act"), SignalValue::Float(0.0));
        assert_eq!(reg.signal_by_id(0x10).map(|s| s.name.as_str()), Some("volt_act"));
        assert_eq!(reg.mode(), Mode::Local);
    }

    #[test]
    fn unknown_get_reads_zero() {
        assert_eq!(registry().get("no_such"), SignalValue::Int(0));
    }

    #[test]
    fn unknown_set_is_dropped() {
        let mut reg = registry();
        assert_eq!(reg.set("no_such", SignalValue::Int(1), WriteOrigin::Local), WriteOutcome::Unknown);
    }

    #[test]
    fn coprocessor_signals_accept_only_rpc_writes() {
        let mut reg = registry();

        for origin in [WriteOrigin::Local, WriteOrigin::Network, WriteOrigin::Logic] {
            assert_eq!(
                reg.set("volt_act", SignalValue::Float(9.0), origin),
                WriteOutcome::Rejected
            );
        }
        assert_eq!(reg.get("volt_act"), SignalValue::Float(0.0));

        assert!(matches!(
            reg.set("volt_act", SignalValue::Float(9.0), WriteOrigin::Rpc),
            WriteOutcome::Applied(_)
        ));
        assert_eq!(reg.get("volt_act"), SignalValue::Float(9.0));
    }

    #[test]
    fn values_are_coerced_to_declared_type() {
        let mut reg = registry();
        reg.set("count", SignalValue::Float(3.9), WriteOrigin::Network);
        assert_eq!(reg.get("count"), SignalValue::Int(3));

        reg.set("mode_set", SignalValue::Float(1.0), WriteOrigin::Network);
        assert_eq!(reg.get("mode_set"), SignalValue::Bool(true));
    }

    #[test]
    fn mode_follows_mode_signal() {
        let mut reg = registry();
        assert_eq!(reg.mode(), Mode::Local);

        let WriteOutcome::Applied(write) =
            reg.set(MODE_SIGNAL, SignalValue::Bool(true), WriteOrigin::Local)
        else {
            panic!("mode write should apply");
        };
        assert_eq!(write.mode_changed, Some(Mode::Remote));
        assert_eq!(reg.mode(), Mode::Remote);

        reg.set(MODE_SIGNAL, SignalValue::Bool(false), WriteOrigin::Network);
        assert_eq!(reg.mode(), Mode::Local);

        // Writes to other signals never touch the projection
        let WriteOutcome::Applied(write) =
            reg.set("count", SignalValue::Int(5), WriteOrigin::Local)
        else {
            panic!("write should apply");
        };
        assert_eq!(write.mode_changed, None);
    }

    #[test]
    fn initial_mode_from_configured_default() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"signals": {"mode_set": {"id": 1, "source": "local", "type": "bool", "default": true}}}"#,
        )
        .unwrap();
        let reg = SignalRegistry::from_config(&config).unwrap();
        assert_eq!(reg.mode(), Mode::Remote);
    }

    #[test]
    fn duplicate_ids_fail_load() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"signals": {
                "a": {"id": 5, "source": "local", "type": "int"},
                "b": {"id": "0x05", "source": "local", "type": "int"}
            }}"#,
        )
        .unwrap();
        assert!(matches!(
            SignalRegistry::from_config(&config),
            Err(ConfigError::DuplicateId { id: 5, .. })
        ));
    }

    #[test]
    fn oversized_id_fails_load() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"signals": {"a": {"id": 300, "source": "local", "type": "int"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            SignalRegistry::from_config(&config),
            Err(ConfigError::InvalidId { .. })
        ));
    }

    #[test]
    fn bad_default_fails_load() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"signals": {"a": {"id": 1, "source": "local", "type": "int", "default": "twelve"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            SignalRegistry::from_config(&config),
            Err(ConfigError::DefaultTypeMismatch { .. })
        ));
    }
}
