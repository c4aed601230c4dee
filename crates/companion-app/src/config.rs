//! Application Configuration
//!
//! Tunables for lifecycle cancellation, supervisor restart backoff, the
//! feedback workflow and logging. Every section has defaults, so an empty
//! file (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use companion_core::CompanionError;
use serde::{Deserialize, Serialize};

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The file content did not parse
    #[error("Invalid {format} in {path}: {message}")]
    Parse {
        /// "TOML" or "JSON"
        format: &'static str,
        /// Path that was parsed
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Unknown file extension
    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// An environment override could not be parsed
    #[error("Invalid value for {var}: {value}")]
    Env {
        /// Variable name
        var: String,
        /// Raw value
        value: String,
    },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for CompanionError {
    fn from(err: ConfigError) -> Self {
        CompanionError::invalid(err.to_string())
    }
}

/// Resolve the default configuration path.
///
/// Priority:
/// 1. `$COMPANION_PATH/companion.toml` if COMPANION_PATH is set
/// 2. `~/.companion/companion.toml`
/// 3. `./.companion/companion.toml`
pub fn default_config_path() -> PathBuf {
    match std::env::var("COMPANION_PATH") {
        Ok(path) => PathBuf::from(path).join("companion.toml"),
        Err(_) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".companion")
            .join("companion.toml"),
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Lifecycle configuration
    pub lifecycle: LifecycleConfig,

    /// Background supervisor configuration
    pub supervisor: SupervisorConfig,

    /// Feedback workflow configuration
    pub feedback: FeedbackConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Lifecycle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Milliseconds a cancelled task may spend finishing its unit of work
    /// before it is dropped.
    pub cancel_grace_ms: u64,
}

impl LifecycleConfig {
    /// Grace period as a `Duration`.
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            cancel_grace_ms: 2_000,
        }
    }
}

/// Background supervisor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Base restart backoff in milliseconds
    pub base_backoff_ms: u64,

    /// Maximum restart backoff in milliseconds
    pub max_backoff_ms: u64,
}

impl SupervisorConfig {
    /// Backoff before restart number `attempt` (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let delay = self.base_backoff_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

/// Feedback workflow configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// When set, close-and-disable moves the workflow into the terminal
    /// `Disabled` state for the rest of the session instead of `Idle`.
    pub close_disables_for_session: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "companion=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML or JSON file, chosen by extension.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                format: "TOML",
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Some("json") => serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                format: "JSON",
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Load `path` if it exists, otherwise start from defaults; then apply
    /// environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Merge `COMPANION_*` environment variables.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(|name| std::env::var(name).ok())
    }

    /// Merge overrides from an arbitrary variable source.
    pub fn merge_with_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("COMPANION_LIFECYCLE_CANCEL_GRACE_MS") {
            self.lifecycle.cancel_grace_ms = parse_var("COMPANION_LIFECYCLE_CANCEL_GRACE_MS", value)?;
        }
        if let Some(value) = lookup("COMPANION_SUPERVISOR_BASE_BACKOFF_MS") {
            self.supervisor.base_backoff_ms = parse_var("COMPANION_SUPERVISOR_BASE_BACKOFF_MS", value)?;
        }
        if let Some(value) = lookup("COMPANION_SUPERVISOR_MAX_BACKOFF_MS") {
            self.supervisor.max_backoff_ms = parse_var("COMPANION_SUPERVISOR_MAX_BACKOFF_MS", value)?;
        }
        if let Some(value) = lookup("COMPANION_FEEDBACK_CLOSE_DISABLES_FOR_SESSION") {
            self.feedback.close_disables_for_session =
                parse_var("COMPANION_FEEDBACK_CLOSE_DISABLES_FOR_SESSION", value)?;
        }
        if let Some(value) = lookup("COMPANION_LOGGING_FILTER") {
            self.logging.filter = value;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifecycle.cancel_grace_ms == 0 {
            return Err(ConfigError::Invalid(
                "lifecycle.cancel_grace_ms must be greater than zero".to_string(),
            ));
        }
        if self.supervisor.base_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "supervisor.base_backoff_ms must be greater than zero".to_string(),
            ));
        }
        if self.supervisor.base_backoff_ms > self.supervisor.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "supervisor.base_backoff_ms ({}) exceeds supervisor.max_backoff_ms ({})",
                self.supervisor.base_backoff_ms, self.supervisor.max_backoff_ms
            )));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "logging.filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value,
    })
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.feedback.close_disables_for_session);
        assert_eq!(config.lifecycle.cancel_grace(), Duration::from_secs(2));
    }

    #[test]
    fn duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1_500)), 1_500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let config = SupervisorConfig {
            base_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
        assert_eq!(config.backoff(5), Duration::from_millis(1_000));
        assert_eq!(config.backoff(64), Duration::from_millis(1_000));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.toml");
        std::fs::write(
            &path,
            "[feedback]\nclose_disables_for_session = true\n\n[supervisor]\nbase_backoff_ms = 250\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert!(config.feedback.close_disables_for_session);
        assert_eq!(config.supervisor.base_backoff_ms, 250);
        assert_eq!(config.supervisor.max_backoff_ms, 30_000);
        assert_eq!(config.lifecycle, LifecycleConfig::default());
    }

    #[test]
    fn json_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.json");
        std::fs::write(&path, r#"{"lifecycle": {"cancel_grace_ms": 10}}"#).unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.lifecycle.cancel_grace_ms, 10);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companion.yaml");
        std::fs::write(&path, "lifecycle: {}").unwrap();

        let err = AppConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.supervisor, SupervisorConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("COMPANION_SUPERVISOR_MAX_BACKOFF_MS", "60000"),
            ("COMPANION_FEEDBACK_CLOSE_DISABLES_FOR_SESSION", "true"),
            ("COMPANION_LOGGING_FILTER", "companion=debug"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .merge_with_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.supervisor.max_backoff_ms, 60_000);
        assert!(config.feedback.close_disables_for_session);
        assert_eq!(config.logging.filter, "companion=debug");
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .merge_with_vars(|name| {
                (name == "COMPANION_LIFECYCLE_CANCEL_GRACE_MS").then(|| "soon".to_string())
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn inverted_backoff_is_invalid() {
        let mut config = AppConfig::default();
        config.supervisor.base_backoff_ms = 60_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
