//! Configuration for the presence bridge.

use crate::control::{LoopConfig, TriggerPolicy};
use crate::notifier::{DispatchMode, NotifierConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Highest supported polling rate.
pub const MAX_UPDATE_RATE_HZ: u32 = 1000;

/// Smallest response buffer the notifier may use.
pub const MIN_RESPONSE_BUFFER: usize = 1024;

/// Main configuration for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CSV file every sample is appended to
    pub log_path: PathBuf,

    /// Path for storing session statistics
    pub data_path: PathBuf,

    /// Detector polling rate in Hz
    pub update_rate_hz: u32,

    /// Successful polls per batch; the log is reset after each full batch
    pub batch_size: u32,

    /// Condition on a sample that fires a camera trigger
    pub trigger_policy: TriggerPolicy,

    /// Camera trigger endpoint
    pub notifier: NotifierConfig,

    /// Whether triggers are sent from the loop thread or a worker
    pub dispatch: DispatchMode,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("presence-bridge");

        Self {
            log_path: data_dir.join("output.csv"),
            data_path: data_dir,
            update_rate_hz: 10,
            batch_size: 100,
            trigger_policy: TriggerPolicy::default(),
            notifier: NotifierConfig::default(),
            dispatch: DispatchMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("presence-bridge")
            .join("config.json")
    }

    /// Path of the persisted session statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::IoError(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Reject values the control loop or notifier cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_rate_hz == 0 || self.update_rate_hz > MAX_UPDATE_RATE_HZ {
            return Err(ConfigError::Invalid(format!(
                "update_rate_hz must be between 1 and {MAX_UPDATE_RATE_HZ}, got {}",
                self.update_rate_hz
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".to_string()));
        }
        if self.notifier.token.is_empty() {
            return Err(ConfigError::Invalid("notifier token must not be empty".to_string()));
        }
        if self.notifier.response_buffer < MIN_RESPONSE_BUFFER {
            return Err(ConfigError::Invalid(format!(
                "notifier response_buffer must be at least {MIN_RESPONSE_BUFFER} bytes"
            )));
        }
        for (name, timeout) in [
            ("connect_timeout", self.notifier.connect_timeout),
            ("read_timeout", self.notifier.read_timeout),
            ("write_timeout", self.notifier.write_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "notifier {name} must be greater than zero"
                )));
            }
        }
        if let DispatchMode::Background { queue_capacity } = self.dispatch {
            if queue_capacity == 0 {
                return Err(ConfigError::Invalid(
                    "dispatch queue_capacity must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Pacing and batching parameters for the control loop.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig::from_rate(self.update_rate_hz, self.batch_size).with_policy(self.trigger_policy)
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
