use super::config_store::check_range;
use super::ConfigError;
use crate::controller::ForwarderSettings;
use crate::gesture::RaiseStrategy;
use crate::pipe::{ConsumerSettings, ProducerSettings};
use crate::sensor::EngineSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const APP_DIR: &str = "playable";
const SETTINGS_FILE: &str = "settings.toml";
const GESTURE_CONFIG_FILE: &str = "gesture_config.json";

pub const TARGET_FPS_RANGE: (f32, f32) = (1.0, 240.0);
pub const SLOW_FRAME_MARGIN_RANGE: (f32, f32) = (1.0, 10.0);

/// Runtime settings, `<config_dir>/playable/settings.toml`.
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gesture_config: PathBuf,
    pub pipe: PipeSettings,
    pub sensor: SensorSettings,
    pub relay: RelaySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeSettings {
    pub path: PathBuf,
    pub open_attempts: u32,
    pub open_retry_delay_ms: u64,
    pub write_attempts: u32,
    pub write_retry_delay_ms: u64,
    pub reconnect_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub target_fps: u32,
    /// Frames slower than `margin * budget` count as slow.
    pub slow_frame_margin: f32,
    pub stats_interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raise_strategy: Option<RaiseStrategy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub max_consecutive_errors: u32,
    pub not_found_backoff_ms: u64,
    pub broken_backoff_ms: u64,
    pub malformed_delay_ms: u64,
    pub forward_attempts: u32,
    pub forward_retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gesture_config: app_dir().join(GESTURE_CONFIG_FILE),
            pipe: PipeSettings::default(),
            sensor: SensorSettings::default(),
            relay: RelaySettings::default(),
        }
    }
}

impl Default for PipeSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/my_pipe"),
            open_attempts: 5,
            open_retry_delay_ms: 2000,
            write_attempts: 3,
            write_retry_delay_ms: 10,
            reconnect_interval_secs: 5,
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            target_fps: 30,
            slow_frame_margin: 1.5,
            stats_interval_secs: 5,
            raise_strategy: None,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 10,
            not_found_backoff_ms: 2000,
            broken_backoff_ms: 1000,
            malformed_delay_ms: 100,
            forward_attempts: 3,
            forward_retry_delay_ms: 100,
        }
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Settings {
    pub fn default_path() -> PathBuf {
        app_dir().join(SETTINGS_FILE)
    }

    /// Loads the settings file, writing the defaults if it does not exist yet.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| ConfigError::io(path, e))?;

        if !exists {
            warn!("No settings at {}, writing defaults", path.display());
            let settings = Settings::default();
            settings.save(path).await?;
            return Ok(settings);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::io(path, e))?;
        let settings: Settings =
            toml::from_str(&content).map_err(|source| ConfigError::MalformedSettings {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Rejects sensor numbers the frame loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "sensor.target_fps",
            self.sensor.target_fps as f32,
            TARGET_FPS_RANGE,
        )?;
        check_range(
            "sensor.slow_frame_margin",
            self.sensor.slow_frame_margin,
            SLOW_FRAME_MARGIN_RANGE,
        )
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::io(parent, e))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ConfigError::io(path, e))
    }

    pub fn producer(&self) -> ProducerSettings {
        ProducerSettings {
            open_attempts: self.pipe.open_attempts,
            open_retry_delay: Duration::from_millis(self.pipe.open_retry_delay_ms),
            write_attempts: self.pipe.write_attempts,
            write_retry_delay: Duration::from_millis(self.pipe.write_retry_delay_ms),
        }
    }

    pub fn consumer(&self) -> ConsumerSettings {
        ConsumerSettings {
            max_consecutive_errors: self.relay.max_consecutive_errors,
            not_found_backoff: Duration::from_millis(self.relay.not_found_backoff_ms),
            broken_backoff: Duration::from_millis(self.relay.broken_backoff_ms),
            error_delay: Duration::from_millis(self.relay.malformed_delay_ms),
        }
    }

    pub fn forwarder(&self) -> ForwarderSettings {
        ForwarderSettings {
            max_attempts: self.relay.forward_attempts,
            retry_delay: Duration::from_millis(self.relay.forward_retry_delay_ms),
        }
    }

    pub fn engine(&self) -> EngineSettings {
        EngineSettings {
            target_fps: self.sensor.target_fps.max(1),
            slow_frame_margin: self.sensor.slow_frame_margin,
            stats_interval: Duration::from_secs(self.sensor.stats_interval_secs),
            reconnect_interval: Duration::from_secs(self.pipe.reconnect_interval_secs),
        }
    }
}
