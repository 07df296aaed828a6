use super::ConfigError;
use crate::controller::Button;
use crate::gesture::Gesture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DELTA_THRESHOLD_RANGE: (f32, f32) = (0.01, 2.0);
pub const RAISE_MINIMUM_RANGE: (f32, f32) = (0.0, 1.0);

/// Sensitivity of the gesture classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Per-frame movement needed to count as motion.
    pub delta_threshold: f32,
    /// How far above its anchor a limb must be to count as raised.
    pub raise_minimum: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            delta_threshold: 0.05,
            raise_minimum: 0.1,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("delta_threshold", self.delta_threshold, DELTA_THRESHOLD_RANGE)?;
        check_range("raise_minimum", self.raise_minimum, RAISE_MINIMUM_RANGE)
    }
}

pub(super) fn check_range(field: &'static str, value: f32, (min, max): (f32, f32)) -> Result<(), ConfigError> {
    // NaN fails `contains`
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Which button each gesture presses.
///
/// Both sides are closed enums, so an unknown name in the file fails to
/// deserialize instead of being stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GestureMappingTable(BTreeMap<Gesture, Button>);

impl Default for GestureMappingTable {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Gesture::LeftElbowRaise, Button::Square),
            (Gesture::RightElbowRaise, Button::Circle),
            (Gesture::LeftArmForward, Button::L1),
            (Gesture::RightArmForward, Button::R1),
        ]))
    }
}

impl GestureMappingTable {
    pub fn get(&self, gesture: Gesture) -> Option<Button> {
        self.0.get(&gesture).copied()
    }

    pub fn insert(&mut self, gesture: Gesture, button: Button) -> Option<Button> {
        self.0.insert(gesture, button)
    }

    pub fn remove(&mut self, gesture: Gesture) -> Option<Button> {
        self.0.remove(&gesture)
    }

    pub fn gestures(&self) -> impl Iterator<Item = Gesture> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gesture, Button)> + '_ {
        self.0.iter().map(|(g, b)| (*g, *b))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the producer loop needs from the configuration, published on every change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    pub thresholds: ThresholdConfig,
    pub mappings: GestureMappingTable,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct ConfigDocument {
    #[serde(default)]
    thresholds: ThresholdConfig,
    #[serde(default)]
    mappings: GestureMappingTable,
}

/// Owner of the gesture configuration file.
///
/// Every mutation validates first, then changes memory, then writes the file.
/// If the write fails the in-memory change is rolled back.
pub struct ConfigStore {
    path: PathBuf,
    config: PipelineConfig,
    updates: watch::Sender<PipelineConfig>,
}

impl ConfigStore {
    /// Loads the configuration at `path`, creating it with defaults if absent.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ConfigError::io(&path, e))?;

        let store = if exists {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ConfigError::io(&path, e))?;
            let document: ConfigDocument =
                serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
                    path: path.clone(),
                    source,
                })?;
            document.thresholds.validate()?;
            info!("Loaded gesture configuration from {}", path.display());
            Self::with_config(
                path,
                PipelineConfig {
                    thresholds: document.thresholds,
                    mappings: document.mappings,
                },
            )
        } else {
            warn!(
                "No gesture configuration at {}, writing defaults",
                path.display()
            );
            let store = Self::with_config(path, PipelineConfig::default());
            store.save().await?;
            store
        };

        debug!(
            "Thresholds: {:?}, {} mappings",
            store.config.thresholds,
            store.config.mappings.len()
        );
        Ok(store)
    }

    fn with_config(path: PathBuf, config: PipelineConfig) -> Self {
        let (updates, _) = watch::channel(config.clone());
        Self {
            path,
            config,
            updates,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.config.thresholds
    }

    pub fn mappings(&self) -> &GestureMappingTable {
        &self.config.mappings
    }

    pub fn snapshot(&self) -> PipelineConfig {
        self.config.clone()
    }

    /// Receiver that sees every successful mutation.
    pub fn subscribe(&self) -> watch::Receiver<PipelineConfig> {
        self.updates.subscribe()
    }

    /// Writes the current state next to the target and renames it into place.
    pub async fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::io(parent, e))?;
        }

        let document = ConfigDocument {
            thresholds: self.config.thresholds,
            mappings: self.config.mappings.clone(),
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| ConfigError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ConfigError::io(&self.path, e))?;

        debug!("Saved gesture configuration to {}", self.path.display());
        Ok(())
    }

    pub async fn add_mapping(&mut self, gesture: &str, button: &str) -> Result<(), ConfigError> {
        let gesture: Gesture = gesture.parse()?;
        let button: Button = button.parse()?;

        let previous = self.config.mappings.insert(gesture, button);
        if let Err(e) = self.save().await {
            match previous {
                Some(old) => self.config.mappings.insert(gesture, old),
                None => self.config.mappings.remove(gesture),
            };
            return Err(e);
        }

        info!("Mapped {} to {}", gesture, button);
        self.publish();
        Ok(())
    }

    /// Removes a mapping and returns the button it pointed to.
    pub async fn remove_mapping(&mut self, gesture: &str) -> Result<Button, ConfigError> {
        let gesture: Gesture = gesture.parse()?;
        let button = self
            .config
            .mappings
            .remove(gesture)
            .ok_or(ConfigError::NotMapped(gesture))?;

        if let Err(e) = self.save().await {
            self.config.mappings.insert(gesture, button);
            return Err(e);
        }

        info!("Removed mapping {} -> {}", gesture, button);
        self.publish();
        Ok(button)
    }

    /// Updates the given thresholds; `None` leaves a value as it is.
    pub async fn update_thresholds(
        &mut self,
        delta_threshold: Option<f32>,
        raise_minimum: Option<f32>,
    ) -> Result<ThresholdConfig, ConfigError> {
        let old = self.config.thresholds;
        let candidate = ThresholdConfig {
            delta_threshold: delta_threshold.unwrap_or(old.delta_threshold),
            raise_minimum: raise_minimum.unwrap_or(old.raise_minimum),
        };
        candidate.validate()?;

        self.config.thresholds = candidate;
        if let Err(e) = self.save().await {
            self.config.thresholds = old;
            return Err(e);
        }

        info!(
            "Thresholds updated: delta={}, raise_min={}",
            candidate.delta_threshold, candidate.raise_minimum
        );
        self.publish();
        Ok(candidate)
    }

    fn publish(&self) {
        self.updates.send_replace(self.config.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("playable-test-{}", uuid::Uuid::new_v4()))
            .join("gesture_config.json")
    }

    async fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let path = temp_path();
        let store = ConfigStore::load(&path).await.unwrap();
        assert_eq!(store.thresholds(), ThresholdConfig::default());
        assert_eq!(store.mappings(), &GestureMappingTable::default());
        assert!(path.exists());

        let reloaded = ConfigStore::load(&path).await.unwrap();
        assert_eq!(reloaded.snapshot(), store.snapshot());
        cleanup(&path).await;
    }

    #[tokio::test]
    async fn missing_keys_fall_back_to_defaults() {
        let path = temp_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, r#"{"thresholds": {"delta_threshold": 0.2}}"#)
            .await
            .unwrap();

        let store = ConfigStore::load(&path).await.unwrap();
        assert_eq!(store.thresholds().delta_threshold, 0.2);
        assert_eq!(store.thresholds().raise_minimum, 0.1);
        assert_eq!(store.mappings(), &GestureMappingTable::default());
        cleanup(&path).await;
    }

    #[tokio::test]
    async fn malformed_file_is_fatal() {
        let path = temp_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "{\"thresholds\": ").await.unwrap();
        assert!(matches!(
            ConfigStore::load(&path).await,
            Err(ConfigError::Malformed { .. })
        ));

        tokio::fs::write(&path, r#"{"mappings": {"head_nod": "CROSS"}}"#)
            .await
            .unwrap();
        assert!(matches!(
            ConfigStore::load(&path).await,
            Err(ConfigError::Malformed { .. })
        ));
        cleanup(&path).await;
    }

    #[tokio::test]
    async fn threshold_boundaries() {
        let path = temp_path();
        let mut store = ConfigStore::load(&path).await.unwrap();

        assert!(store.update_thresholds(Some(2.01), None).await.is_err());
        assert_eq!(store.thresholds(), ThresholdConfig::default());
        assert!(store.update_thresholds(Some(2.0), None).await.is_ok());

        assert!(store.update_thresholds(None, Some(-0.0001)).await.is_err());
        assert!(store.update_thresholds(None, Some(0.0)).await.is_ok());
        assert!(store.update_thresholds(Some(f32::NAN), None).await.is_err());

        let reloaded = ConfigStore::load(&path).await.unwrap();
        assert_eq!(
            reloaded.thresholds(),
            ThresholdConfig {
                delta_threshold: 2.0,
                raise_minimum: 0.0
            }
        );
        cleanup(&path).await;
    }

    #[tokio::test]
    async fn mapping_edits_validate_and_persist() {
        let path = temp_path();
        let mut store = ConfigStore::load(&path).await.unwrap();
        let mut updates = store.subscribe();

        assert!(matches!(
            store.add_mapping("left_elbow_raise", "START").await,
            Err(ConfigError::UnknownName(_))
        ));
        assert!(matches!(
            store.add_mapping("wave", "CROSS").await,
            Err(ConfigError::UnknownName(_))
        ));
        assert!(!updates.has_changed().unwrap());

        store.add_mapping("left_elbow_raise", "TRIANGLE").await.unwrap();
        assert!(updates.has_changed().unwrap());
        assert_eq!(
            updates.borrow_and_update().mappings.get(Gesture::LeftElbowRaise),
            Some(Button::Triangle)
        );

        assert_eq!(
            store.remove_mapping("right_arm_forward").await.unwrap(),
            Button::R1
        );
        assert!(matches!(
            store.remove_mapping("right_arm_forward").await,
            Err(ConfigError::NotMapped(Gesture::RightArmForward))
        ));

        let reloaded = ConfigStore::load(&path).await.unwrap();
        assert_eq!(reloaded.mappings().get(Gesture::LeftElbowRaise), Some(Button::Triangle));
        assert_eq!(reloaded.mappings().get(Gesture::RightArmForward), None);
        cleanup(&path).await;
    }
}
