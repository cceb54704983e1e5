//! Configuration for the Sensorium agent.

use crate::core::PrivacyLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path for storing preferences and other state
    pub data_path: PathBuf,

    /// JSON file backing the preference store
    pub preferences_file: PathBuf,

    /// Bundled default preferences, applied through the version gate
    pub default_preferences: Option<PathBuf>,

    /// Where campaign preference bundles are fetched from
    pub campaign_url: Option<String>,

    /// Lines kept by the in-memory debug log, at most 100
    pub debug_log_lines: usize,

    /// Privacy level given to every sensor at registration
    pub default_privacy_level: PrivacyLevel,

    /// Per-sensor overrides, keyed by short name (e.g. `LocationSensor`)
    pub privacy_levels: BTreeMap<String, PrivacyLevel>,

    /// Connect timeout for campaign fetches (in seconds)
    #[serde(with = "duration_serde")]
    pub fetch_connect_timeout: Duration,

    /// Wireless interface to read; first one found when unset
    pub wifi_interface: Option<String>,

    /// Fixed position reported by the location sensor
    pub location: Option<LocationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensorium-agent");

        Self {
            preferences_file: data_dir.join("preferences.json"),
            data_path: data_dir,
            default_preferences: None,
            campaign_url: None,
            debug_log_lines: crate::transparency::MAX_DEBUG_LINES,
            default_privacy_level: PrivacyLevel::default(),
            privacy_levels: BTreeMap::new(),
            fetch_connect_timeout: Duration::from_secs(1),
            wifi_interface: None,
            location: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`; a missing file yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensorium-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        if let Some(parent) = self.preferences_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    /// Privacy level for the sensor with this short name.
    pub fn privacy_level_for(&self, short_name: &str) -> PrivacyLevel {
        self.privacy_levels
            .get(short_name)
            .copied()
            .unwrap_or(self.default_privacy_level)
    }
}

/// A fixed position for hosts without a positioning service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

fn default_accuracy() -> f64 {
    100.0
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
