//! TOML configuration for the `hookhub` daemon.
//!
//! ```toml
//! prevent = ["CapsLock"]
//!
//! [logging]
//! level = "debug"
//!
//! [[keys]]
//! keys = ["Ctrl", "Alt", "T"]    # one key, or a combination held together
//! message = "terminal chord"
//! interval_ms = 250
//!
//! [[sequences]]
//! keys = ["W", "A", "S", "D"]
//! once = true
//!
//! [[mouse]]
//! event = "MiddleButtonDown"
//! ```
//!
//! Every binding logs its `message` (or a description of its trigger) at
//! `info` level when it fires.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::event::{Key, MouseEvent};
use crate::sequence::{MAX_SEQUENCE_LENGTH, MIN_SEQUENCE_LENGTH};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax or type error; the message carries line and column.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Keys swallowed for as long as the daemon runs.
    #[serde(default)]
    pub prevent: Vec<Key>,
    #[serde(default)]
    pub keys: Vec<KeyBinding>,
    #[serde(default)]
    pub sequences: Vec<SequenceBinding>,
    #[serde(default)]
    pub mouse: Vec<MouseBinding>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter for env_logger; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".into()
}

/// A single key, or several keys held down together.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyBinding {
    pub keys: Vec<Key>,
    pub message: Option<String>,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default)]
    pub once: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceBinding {
    pub keys: Vec<Key>,
    pub message: Option<String>,
    #[serde(default)]
    pub once: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MouseBinding {
    pub event: MouseEvent,
    pub message: Option<String>,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default)]
    pub once: bool,
}

impl KeyBinding {
    pub fn interval(&self) -> Option<Duration> {
        interval(self.interval_ms)
    }
}

impl MouseBinding {
    pub fn interval(&self) -> Option<Duration> {
        interval(self.interval_ms)
    }
}

fn interval(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks what serde cannot express: non-empty triggers, sequence
    /// lengths and a usable log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if log::LevelFilter::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level: unknown level {:?}",
                self.logging.level
            )));
        }
        for (index, binding) in self.keys.iter().enumerate() {
            if binding.keys.is_empty() {
                return Err(ConfigError::Invalid(format!("keys[{index}]: no keys given")));
            }
        }
        for (index, binding) in self.sequences.iter().enumerate() {
            let len = binding.keys.len();
            if !(MIN_SEQUENCE_LENGTH..=MAX_SEQUENCE_LENGTH).contains(&len) {
                return Err(ConfigError::Invalid(format!(
                    "sequences[{index}]: {len} keys, expected {MIN_SEQUENCE_LENGTH} to {MAX_SEQUENCE_LENGTH}"
                )));
            }
        }
        Ok(())
    }

    /// True when the config registers nothing at all.
    pub fn is_empty(&self) -> bool {
        self.prevent.is_empty()
            && self.keys.is_empty()
            && self.sequences.is_empty()
            && self.mouse.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
