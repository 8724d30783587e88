//! TOML-based application configuration.
//!
//! Stores:
//! - Timer manager defaults (pool bound, time unit, default schedule)
//! - Shutdown grace period and event queue sizing
//! - Console preferences for the interactive CLI
//!
//! Configuration is stored at `~/.config/pomoplex/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::timer::{ExecutionSchedule, TimeUnit};

/// Timer manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_max_active_timers")]
    pub max_active_timers: usize,
    #[serde(default = "default_time_unit")]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub talk: bool,
    /// Signed so that negative entries can be reported instead of failing
    /// to parse.
    #[serde(default = "default_schedule")]
    pub default_schedule: Vec<i64>,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Defaults to 100 slots per pool worker.
    #[serde(default)]
    pub event_queue_capacity: Option<usize>,
}

/// Interactive console configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub ansi: bool,
    #[serde(default = "default_true")]
    pub show_ticks: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomoplex/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub cli: CliConfig,
}

// Default functions
fn default_max_active_timers() -> usize {
    5
}
fn default_time_unit() -> TimeUnit {
    TimeUnit::Minutes
}
fn default_schedule() -> Vec<i64> {
    ExecutionSchedule::classic()
        .slots()
        .iter()
        .map(|&d| d as i64)
        .collect()
}
fn default_shutdown_grace_secs() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_active_timers: default_max_active_timers(),
            time_unit: default_time_unit(),
            talk: false,
            default_schedule: default_schedule(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            event_queue_capacity: None,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            ansi: false,
            show_ticks: true,
        }
    }
}

impl ManagerConfig {
    pub fn schedule(&self) -> Result<ExecutionSchedule, ValidationError> {
        ExecutionSchedule::try_from_signed(&self.default_schedule)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active_timers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "manager.max_active_timers".into(),
                message: "must be a positive integer".into(),
            });
        }
        if self.event_queue_capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "manager.event_queue_capacity".into(),
                message: "must be a positive integer".into(),
            });
        }
        self.schedule()?;
        Ok(())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Unset optional values take whatever the input parses as.
                    serde_json::Value::Null => serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.into())),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults there if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load and validate a config file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content)?;
        cfg.manager.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The result is validated
    /// but not saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.manager.validate()?;
        *self = updated;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("falling back to default configuration: {e}");
            Self::default()
        })
    }
}
