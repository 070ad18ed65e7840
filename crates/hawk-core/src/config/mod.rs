//! Configuration for the repository layer
//!
//! Loaded once at startup: TOML file (optional) → `HAWK_*` environment
//! overrides → validation. Nothing here is hot-reloaded.
//!
//! ```toml
//! [repository]
//! eager_poll_persistence = false
//! poll_persistence_flush_time_ms = 10000
//!
//! [controller]
//! polling_time = "00:05:00"
//!
//! [policy.overrides]
//! "system.usage" = "SYSTEM_ADMIN or READ_TARGET"
//! ```

mod duration;
mod validation;

pub use duration::{format_hms, parse_hms};
pub use validation::{ConfigValidation, ConfigValidator, ValidationError, ValidationResult};

use crate::{HawkError, HawkResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "HAWK_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HawkConfig {
    /// Persistence behaviour of the repository layer
    pub repository: RepositoryConfig,
    /// Polling intervals handed to devices
    pub controller: ControllerPollConfig,
    /// Permission expression overrides
    pub policy: PolicyConfig,
}

/// Persistence settings for controller poll updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Write every poll through immediately instead of coalescing
    pub eager_poll_persistence: bool,
    /// Maximum time a buffered poll waits before it is flushed
    pub poll_persistence_flush_time_ms: u64,
    /// Maximum number of buffered polls; beyond it polls are written immediately
    pub poll_persistence_queue_size: usize,
    /// Upper bound for a single flush write
    pub poll_flush_timeout_ms: u64,
    /// Maximum number of targets touched by one flush statement
    pub max_entries_in_statement: usize,
    /// Number of per-entity lock stripes
    pub entity_lock_stripes: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            eager_poll_persistence: false,
            poll_persistence_flush_time_ms: 10_000,
            poll_persistence_queue_size: 250_000,
            poll_flush_timeout_ms: 5_000,
            max_entries_in_statement: 999,
            entity_lock_stripes: 64,
        }
    }
}

impl RepositoryConfig {
    /// Buffering window as a duration
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.poll_persistence_flush_time_ms)
    }

    /// Flush write timeout as a duration
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_flush_timeout_ms)
    }
}

impl ConfigValidation for RepositoryConfig {
    fn validate(&self) -> ValidationResult {
        let mut validator = ConfigValidator::for_section("repository");
        validator
            .at_least(
                "poll_persistence_flush_time_ms",
                self.poll_persistence_flush_time_ms,
                1,
            )
            .at_least(
                "poll_persistence_queue_size",
                self.poll_persistence_queue_size as u64,
                1,
            )
            .at_least("poll_flush_timeout_ms", self.poll_flush_timeout_ms, 1)
            .at_least(
                "max_entries_in_statement",
                self.max_entries_in_statement as u64,
                1,
            )
            .at_least("entity_lock_stripes", self.entity_lock_stripes as u64, 1);
        validator.result()
    }
}

/// Polling intervals communicated to devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerPollConfig {
    /// Interval a device should wait between polls
    pub polling_time: String,
    /// Lower bound for any interval handed out
    pub min_polling_time: String,
    /// Upper bound for any interval handed out
    pub max_polling_time: String,
}

impl Default for ControllerPollConfig {
    fn default() -> Self {
        Self {
            polling_time: "00:05:00".to_string(),
            min_polling_time: "00:00:30".to_string(),
            max_polling_time: "23:59:59".to_string(),
        }
    }
}

impl ControllerPollConfig {
    /// Parsed `(polling, min, max)` intervals
    pub fn intervals(&self) -> HawkResult<(Duration, Duration, Duration)> {
        Ok((
            parse_hms(&self.polling_time)?,
            parse_hms(&self.min_polling_time)?,
            parse_hms(&self.max_polling_time)?,
        ))
    }
}

impl ConfigValidation for ControllerPollConfig {
    fn validate(&self) -> ValidationResult {
        let mut validator = ConfigValidator::for_section("controller");
        let polling = validator.parses("polling_time", &self.polling_time, "HH:MM:SS", parse_hms);
        let min = validator.parses(
            "min_polling_time",
            &self.min_polling_time,
            "HH:MM:SS",
            parse_hms,
        );
        let max = validator.parses(
            "max_polling_time",
            &self.max_polling_time,
            "HH:MM:SS",
            parse_hms,
        );
        if let (Some(_), Some(min), Some(max)) = (polling, min, max) {
            validator.custom(
                "min_polling_time",
                min <= max,
                "must not exceed max_polling_time",
            );
        }
        validator.result()
    }
}

/// Operation identifier → permission expression text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Expressions replacing the built-in policy of the named operations
    pub overrides: BTreeMap<String, String>,
}

impl HawkConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> HawkResult<Self> {
        let config: HawkConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> HawkResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HawkError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from an optional file, then apply `HAWK_*` process environment overrides
    pub fn load(path: Option<&Path>) -> HawkResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_vars(std::env::vars())?;
        config.validate()?;
        tracing::debug!(
            eager = config.repository.eager_poll_persistence,
            flush_ms = config.repository.poll_persistence_flush_time_ms,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Apply `HAWK_*` overrides from the given variables; unrelated variables are ignored
    pub fn merge_with_vars<I>(&mut self, vars: I) -> HawkResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                self.set_from_string(&config_key.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// Set a single setting by its flat key (as used in environment overrides)
    pub fn set_from_string(&mut self, key: &str, value: &str) -> HawkResult<()> {
        fn number<T: std::str::FromStr>(key: &str, value: &str) -> HawkResult<T> {
            value
                .trim()
                .parse()
                .map_err(|_| HawkError::invalid(format!("{key}: '{value}' is not a number")))
        }

        let repository = &mut self.repository;
        match key {
            "eager_poll_persistence" => {
                repository.eager_poll_persistence = match value.trim() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    other => {
                        return Err(HawkError::invalid(format!(
                            "{key}: '{other}' is not a boolean"
                        )))
                    }
                };
            }
            "poll_persistence_flush_time" | "poll_persistence_flush_time_ms" => {
                repository.poll_persistence_flush_time_ms = number(key, value)?;
            }
            "poll_persistence_queue_size" => {
                repository.poll_persistence_queue_size = number(key, value)?;
            }
            "poll_flush_timeout_ms" => repository.poll_flush_timeout_ms = number(key, value)?,
            "max_entries_in_statement" => {
                repository.max_entries_in_statement = number(key, value)?;
            }
            "entity_lock_stripes" => repository.entity_lock_stripes = number(key, value)?,
            "polling_time" => self.controller.polling_time = value.trim().to_string(),
            "min_polling_time" => self.controller.min_polling_time = value.trim().to_string(),
            "max_polling_time" => self.controller.max_polling_time = value.trim().to_string(),
            // Process environments carry plenty of HAWK_* noise from tooling
            _ => tracing::trace!(key, "ignoring unknown configuration override"),
        }
        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> HawkResult<()> {
        self.repository.validate()?;
        self.controller.validate()?;
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> HawkResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| HawkError::internal(format!("Failed to render configuration: {e}")))
    }
}
