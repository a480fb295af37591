//! Configuration file loading.
//!
//! The bridge consumes one JSON file holding the signal table plus an
//! optional display configuration payload:
//!
//! ```json
//! {
//!   "signals": {
//!     "volt_act": { "id": "0x10", "source": "coprocessor", "type": "float" },
//!     "volt_set": { "id": 17, "source": "local", "type": "float",
//!                    "rpc_set_func": "set_volt", "default": 12.0 }
//!   },
//!   "display_config": { "pages": [] }
//! }
//! ```
//!
//! Ids accept either a JSON integer or a string integer literal (hex with
//! a `0x` prefix) and must fit one byte. Load failures are fatal at
//! startup; see `ConfigError`.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{
    error::ConfigError,
    signal::{SignalSource, SignalType},
};

/// Top-level configuration file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Signal table, keyed by signal name.
    #[serde(default)]
    pub signals: BTreeMap<String, SignalSpec>,

    /// Verbatim payload pushed to the display unit once at startup.
    #[serde(default)]
    pub display_config: Option<serde_json::Value>,
}

impl BridgeConfig {
    /// Load and parse the configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// One signal definition from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalSpec {
    /// Wire identifier literal (integer or string, possibly hex).
    pub id: IdLiteral,

    /// Write-ownership category.
    pub source: SignalSource,

    /// Value type.
    #[serde(rename = "type")]
    pub kind: SignalType,

    /// Remote procedure invoked for display-driven writes.
    #[serde(default)]
    pub rpc_set_func: Option<String>,

    /// Initial value override (type-checked at load).
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// A signal id as written in the file: `16`, `"16"`, or `"0x10"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdLiteral {
    /// Plain JSON integer.
    Number(u64),
    /// String literal, decimal or `0x`-prefixed hex.
    Text(String),
}

impl IdLiteral {
    /// Resolve to a one-byte wire id. `None` if unparseable or out of range.
    #[must_use]
    pub fn resolve(&self) -> Option<u8> {
        match self {
            Self::Number(n) => u8::try_from(*n).ok(),
            Self::Text(s) => {
                let s = s.trim();
                let parsed = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .map_or_else(|| s.parse::<u64>().ok(), |hex| u64::from_str_radix(hex, 16).ok())?;
                u8::try_from(parsed).ok()
            },
        }
    }

    /// The literal as written, for diagnostics.
    #[must_use]
    pub fn raw(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"{
        "signals": {
            "mode_set": { "id": 1, "source": "local", "type": "bool" },
            "volt_act": { "id": "0x10", "source": "coprocessor", "type": "float" },
            "volt_set": { "id": "17", "source": "local", "type": "float",
                          "rpc_set_func": "set_volt", "default": 12.0 }
        },
        "display_config": { "brightness": 80 }
    }"#;

    #[test]
    fn parses_sample_config() {
        let config: BridgeConfig = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.signals.len(), 3);

        let volt_act = &config.signals["volt_act"];
        assert_eq!(volt_act.id.resolve(), Some(0x10));
        assert_eq!(volt_act.source, SignalSource::Coprocessor);
        assert_eq!(volt_act.kind, SignalType::Float);
        assert!(volt_act.rpc_set_func.is_none());

        let volt_set = &config.signals["volt_set"];
        assert_eq!(volt_set.id.resolve(), Some(17));
        assert_eq!(volt_set.rpc_set_func.as_deref(), Some("set_volt"));
        assert_eq!(volt_set.default, Some(serde_json::json!(12.0)));

        assert!(config.display_config.is_some());
    }

    #[test]
    fn id_literal_forms() {
        assert_eq!(IdLiteral::Number(200).resolve(), Some(200));
        assert_eq!(IdLiteral::Number(256).resolve(), None);
        assert_eq!(IdLiteral::Text("0x2A".into()).resolve(), Some(42));
        assert_eq!(IdLiteral::Text("0XFF".into()).resolve(), Some(255));
        assert_eq!(IdLiteral::Text("26".into()).resolve(), Some(26));
        assert_eq!(IdLiteral::Text("0x100".into()).resolve(), None);
        assert_eq!(IdLiteral::Text("garbage".into()).resolve(), None);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = BridgeConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert!(config.signals.contains_key("mode_set"));
    }

    #[test]
    fn rejects_unknown_source_and_type() {
        let bad = r#"{"signals": {"x": {"id": 1, "source": "cloud", "type": "float"}}}"#;
        assert!(serde_json::from_str::<BridgeConfig>(bad).is_err());

        let bad = r#"{"signals": {"x": {"id": 1, "source": "local", "type": "string"}}}"#;
        assert!(serde_json::from_str::<BridgeConfig>(bad).is_err());
    }
}
