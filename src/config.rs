//! Configuration for the IR remote-control input monitor.
//!
//! The surrounding application owns the configuration; the monitor only
//! holds shared references to it. The hold/repeat timing table is part of
//! the input-manager configuration, so it lives behind its own `Arc` and
//! is never duplicated into the monitor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Highest input identifier the input manager can address (4-bit space).
pub const MAX_INPUT_ID: u8 = 15;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// IR protocol the application supports (one protocol at a time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrProtocol {
    Nec,
    Rc5,
}

impl fmt::Display for IrProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrProtocol::Nec => write!(f, "NEC"),
            IrProtocol::Rc5 => write!(f, "RC5"),
        }
    }
}

/// One (remote address, IR code) to input identifier mapping
///
/// Static entries come from the config file; learnt entries are appended at
/// runtime through the learning mode. Both share the same shape so the
/// persistence collaborator can serialize learnt entries unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    /// Address of the remote control that sends the code
    pub remote_address: u16,

    /// The protocol-level code sent by the remote
    pub code: u8,

    /// The input ID the code translates to (0-15)
    pub input_id: u8,
}

/// Button timing table shared with the input-manager configuration
///
/// Tier durations are per-leg: each tier timer is armed at the previous
/// tier boundary with its own duration, never cumulative from the press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Press to SHORT tier boundary (ms)
    pub short_ms: u64,

    /// SHORT boundary to LONG tier boundary (ms)
    pub long_ms: u64,

    /// LONG boundary to VLONG tier boundary (ms)
    pub vlong_ms: u64,

    /// VLONG boundary to VVLONG tier boundary (ms)
    pub vvlong_ms: u64,

    /// Interval between REPEAT emissions while a button is held (ms)
    pub repeat_ms: u64,

    /// Inactivity gap after the last keep-alive that counts as release (ms)
    pub release_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            short_ms: 400,
            long_ms: 600,
            vlong_ms: 1000,
            vvlong_ms: 1500,
            repeat_ms: 250,
            release_ms: 150, // NEC repeats every ~108ms while held
        }
    }
}

/// Complete IR remote-control configuration
///
/// Immutable after load; shared across tasks via `Arc<RemoteConfig>`.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// The single IR protocol the monitor accepts
    pub protocol: IrProtocol,

    /// Maximum number of codes the learning mode may append
    pub max_learning_codes: usize,

    /// Failsafe for turning off learning mode (ms)
    pub learning_mode_timeout_ms: u64,

    /// Interval between learning-mode reminder ticks (ms)
    pub learning_mode_reminder_ms: u64,

    /// The IO line the IR receiver hardware is wired to
    pub ir_pio: u8,

    /// Build-time lookup table, scanned before learnt entries
    pub static_lookup_table: Vec<LookupEntry>,

    /// Timing table owned by the input-manager configuration
    pub timers: Arc<TimerConfig>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            protocol: IrProtocol::Nec,
            max_learning_codes: 10,
            learning_mode_timeout_ms: 30_000,
            learning_mode_reminder_ms: 5_000,
            ir_pio: 0,
            static_lookup_table: Vec::new(),
            timers: Arc::new(TimerConfig::default()),
        }
    }
}

/// On-disk shape of the configuration file
#[derive(Debug, Deserialize)]
struct RemoteConfigFile {
    protocol: IrProtocol,

    #[serde(default = "default_max_learning_codes")]
    max_learning_codes: usize,

    #[serde(default = "default_learning_mode_timeout_ms")]
    learning_mode_timeout_ms: u64,

    #[serde(default = "default_learning_mode_reminder_ms")]
    learning_mode_reminder_ms: u64,

    #[serde(default)]
    ir_pio: u8,

    #[serde(default)]
    static_lookup_table: Vec<LookupEntry>,

    #[serde(default)]
    timers: TimerConfig,
}

fn default_max_learning_codes() -> usize {
    10
}

fn default_learning_mode_timeout_ms() -> u64 {
    30_000
}

fn default_learning_mode_reminder_ms() -> u64 {
    5_000
}

impl RemoteConfig {
    /// Loads and validates a configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading IR remote config from {}", path.display());
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parses and validates a configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let file: RemoteConfigFile = toml::from_str(raw)?;
        debug!(
            "Parsed config: protocol={}, {} static entries",
            file.protocol,
            file.static_lookup_table.len()
        );

        let config = Self {
            protocol: file.protocol,
            max_learning_codes: file.max_learning_codes,
            learning_mode_timeout_ms: file.learning_mode_timeout_ms,
            learning_mode_reminder_ms: file.learning_mode_reminder_ms,
            ir_pio: file.ir_pio,
            static_lookup_table: file.static_lookup_table,
            timers: Arc::new(file.timers),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the monitor relies on at runtime
    ///
    /// Rejects out-of-range input ids, duplicate (address, code) pairs in
    /// the static table, and zero timing values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, entry) in self.static_lookup_table.iter().enumerate() {
            if entry.input_id > MAX_INPUT_ID {
                return Err(ConfigError::Invalid(format!(
                    "static entry {} has input id {} outside the 0-{} range",
                    index, entry.input_id, MAX_INPUT_ID
                )));
            }
            let first = self
                .static_lookup_table
                .iter()
                .position(|e| e.remote_address == entry.remote_address && e.code == entry.code);
            if first != Some(index) {
                return Err(ConfigError::Invalid(format!(
                    "static entries share address {:#06x} code {:#04x}",
                    entry.remote_address, entry.code
                )));
            }
        }

        let timers = [
            ("short_ms", self.timers.short_ms),
            ("long_ms", self.timers.long_ms),
            ("vlong_ms", self.timers.vlong_ms),
            ("vvlong_ms", self.timers.vvlong_ms),
            ("repeat_ms", self.timers.repeat_ms),
            ("release_ms", self.timers.release_ms),
        ];
        for (name, value) in timers {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "timer {} must be non-zero",
                    name
                )));
            }
        }

        if self.learning_mode_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "learning_mode_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.learning_mode_reminder_ms == 0 {
            return Err(ConfigError::Invalid(
                "learning_mode_reminder_ms must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
            protocol = "nec"
            max_learning_codes = 4
            learning_mode_timeout_ms = 20000
            learning_mode_reminder_ms = 2000
            ir_pio = 3

            [[static_lookup_table]]
            remote_address = 0x10
            code = 0x01
            input_id = 3

            [[static_lookup_table]]
            remote_address = 0x10
            code = 0x02
            input_id = 4

            [timers]
            short_ms = 500
            long_ms = 700
            vlong_ms = 900
            vvlong_ms = 1100
            repeat_ms = 200
            release_ms = 180
        "#;

        let config = RemoteConfig::from_toml(raw).unwrap();
        assert_eq!(config.protocol, IrProtocol::Nec);
        assert_eq!(config.max_learning_codes, 4);
        assert_eq!(config.static_lookup_table.len(), 2);
        assert_eq!(config.static_lookup_table[0].input_id, 3);
        assert_eq!(config.timers.short_ms, 500);
        assert_eq!(config.timers.release_ms, 180);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = RemoteConfig::from_toml("protocol = \"rc5\"").unwrap();
        assert_eq!(config.protocol, IrProtocol::Rc5);
        assert_eq!(config.max_learning_codes, 10);
        assert_eq!(*config.timers, TimerConfig::default());
        assert!(config.static_lookup_table.is_empty());
    }

    #[test]
    fn rejects_out_of_range_input_id() {
        let raw = r#"
            protocol = "nec"

            [[static_lookup_table]]
            remote_address = 0x10
            code = 0x01
            input_id = 16
        "#;
        let err = RemoteConfig::from_toml(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_duplicate_static_entries() {
        let raw = r#"
            protocol = "nec"

            [[static_lookup_table]]
            remote_address = 0x10
            code = 0x01
            input_id = 3

            [[static_lookup_table]]
            remote_address = 0x10
            code = 0x01
            input_id = 5
        "#;
        let err = RemoteConfig::from_toml(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_timers() {
        let raw = r#"
            protocol = "nec"

            [timers]
            repeat_ms = 0
        "#;
        let err = RemoteConfig::from_toml(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
