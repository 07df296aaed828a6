//! # Persistence Module
//!
//! Two documents live on disk:
//!
//! - the gesture configuration (JSON): thresholds plus the gesture→button
//!   table, owned by [`ConfigStore`] and editable at runtime;
//! - the runtime settings (TOML): pipe path, retry budgets, frame cadence and
//!   the rest of the knobs, loaded once at startup by [`Settings`].
//!
//! ## Error Handling Strategy
//! A missing file is not an error; defaults are written so the next start is
//! stable. A file that exists but cannot be parsed is fatal: running with a
//! configuration nobody wrote would hide operator mistakes.

pub mod config_store;
pub mod settings;

pub use config_store::{ConfigStore, GestureMappingTable, PipelineConfig, ThresholdConfig};
pub use settings::Settings;

use crate::controller::UnknownName;
use crate::gesture::Gesture;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed settings file {path}: {source}")]
    MalformedSettings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize: {0}")]
    Serialize(String),

    #[error(transparent)]
    UnknownName(#[from] UnknownName),

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("Gesture {0} has no mapping")]
    NotMapped(Gesture),
}

impl ConfigError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}
