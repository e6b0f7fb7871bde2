//! Scheduler daemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::intake::{DEFAULT_SOCKET_PATH, MAX_MESSAGE_SIZE};
use crate::scheduler::SchedulerConfig;

/// Main scheduler daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Intake socket settings
    pub intake: IntakeConfig,

    /// Admission and drain settings
    pub scheduler: SchedulerConfig,

    /// Outbound call settings
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.intake.max_message_size == 0 {
            return Err(eyre::eyre!("intake.max-message-size must be greater than zero"));
        }
        if self.scheduler.bucket_capacity == 0 {
            return Err(eyre::eyre!("scheduler.bucket-capacity must be greater than zero"));
        }
        if self.scheduler.drain_interval_secs == 0 {
            return Err(eyre::eyre!("scheduler.drain-interval-secs must be greater than zero"));
        }
        if self.dispatch.timeout_ms == 0 {
            return Err(eyre::eyre!("dispatch.timeout-ms must be greater than zero"));
        }
        if self.dispatch.body_queue_depth == 0 {
            return Err(eyre::eyre!("dispatch.body-queue-depth must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .scheduler.yml
        let local_config = PathBuf::from(".scheduler.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/scheduler/scheduler.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("scheduler").join("scheduler.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Render the effective configuration as YAML
    pub fn dump(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Intake socket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Unix datagram socket producers write to
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,

    /// Largest accepted datagram in bytes
    #[serde(rename = "max-message-size")]
    pub max_message_size: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

/// Outbound call configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-call timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Response bodies buffered between the engine and the body worker
    #[serde(rename = "body-queue-depth")]
    pub body_queue_depth: usize,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            body_queue_depth: 64,
            user_agent: format!("scheduler/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DispatchConfig {
    /// Get the per-call timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.intake.socket_path, PathBuf::from("/tmp/scheduler.sock"));
        assert_eq!(config.intake.max_message_size, 128);
        assert_eq!(config.scheduler.bucket_capacity, 6);
        assert_eq!(config.scheduler.drain_interval_secs, 10);
        assert_eq!(config.dispatch.timeout(), Duration::from_secs(5));
        assert_eq!(config.dispatch.body_queue_depth, 64);
        assert!(config.dispatch.user_agent.starts_with("scheduler/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
intake:
  socket-path: /run/sd/intake.sock
  max-message-size: 256

scheduler:
  bucket-capacity: 3
  drain-interval-secs: 2

dispatch:
  timeout-ms: 1500
  body-queue-depth: 8
  user-agent: test-agent
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.intake.socket_path, PathBuf::from("/run/sd/intake.sock"));
        assert_eq!(config.intake.max_message_size, 256);
        assert_eq!(config.scheduler.bucket_capacity, 3);
        assert_eq!(config.scheduler.drain_interval_secs, 2);
        assert_eq!(config.dispatch.timeout_ms, 1500);
        assert_eq!(config.dispatch.body_queue_depth, 8);
        assert_eq!(config.dispatch.user_agent, "test-agent");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
dispatch:
  timeout-ms: 250
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.dispatch.timeout_ms, 250);
        assert_eq!(config.dispatch.body_queue_depth, 64);
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.intake, IntakeConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.scheduler.bucket_capacity = 0;
        assert!(config.validate().unwrap_err().to_string().contains("bucket-capacity"));

        let mut config = Config::default();
        config.scheduler.drain_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.intake.max_message_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scheduler.yml");
        fs::write(&path, "scheduler:\n  bucket-capacity: 9\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.scheduler.bucket_capacity, 9);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_dump_round_trips() {
        let config = Config::default();
        let yaml = config.dump().unwrap();

        assert!(yaml.contains("socket-path: /tmp/scheduler.sock"));
        assert!(yaml.contains("bucket-capacity: 6"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
