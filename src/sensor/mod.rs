//! Sensor side: the producer loop and its task handle.

pub mod engine;
pub mod frame_timing;

pub use engine::{SensorEngine, SensorEngineState, SensorReport};
pub use frame_timing::{FrameTiming, WindowStats};

use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("No raise strategy chosen; set sensor.raise_strategy or pass --raise-strategy")]
    NoRaiseStrategy,

    #[error("Failed to open pose source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sensor task failed: {0}")]
    Task(String),
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub target_fps: u32,
    pub slow_frame_margin: f32,
    pub stats_interval: Duration,
    pub reconnect_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            target_fps: 30,
            slow_frame_margin: 1.5,
            stats_interval: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(5),
        }
    }
}

/// Runs a [`SensorEngine`] through its whole lifecycle in a tokio task.
#[derive(Debug)]
pub struct SensorHandle {
    task: Option<JoinHandle<SensorReport>>,
}

impl SensorHandle {
    pub fn spawn(engine: SensorEngine<engine::Initializing>, cancel: CancellationToken) -> Self {
        let task = tokio::spawn(async move {
            info!("Spawning sensor engine");
            let active = engine.connect().await;
            let draining = active.run_until_stopped(cancel).await;
            draining.shutdown().await.report()
        });
        debug!("Sensor engine task started");

        Self { task: Some(task) }
    }

    /// Waits for the engine to drain and close the pipe.
    pub async fn join(mut self) -> Result<SensorReport, SensorError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| {
                error!("Sensor task panicked: {}", e);
                SensorError::Task(e.to_string())
            }),
            None => Err(SensorError::Task("already joined".to_string())),
        }
    }
}
