//! Producer loop with statum lifecycle
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Active ──► Draining ──► Stopped
//!   (open pipe,     (frame     (release held
//!    degraded ok)    loop)      buttons, close)
//! ```
//!
//! # Frame
//!
//! ```text
//! PoseSource ──► classify(current, previous) ──► debounce ──► PipeProducer
//!                      ▲                                         ▲
//!              config watch (applied                  reconnect ticker
//!              at frame boundary)                     (while no sink)
//! ```

use super::frame_timing::FrameTiming;
use super::EngineSettings;
use crate::controller::ButtonEvent;
use crate::gesture::{
    EventDebouncer, GestureClassifier, LandmarkSnapshot, PoseSource, RaiseStrategy, SourceFrame,
};
use crate::persistence::PipelineConfig;
use crate::pipe::{IntervalTicker, PipeMessage, PipeProducer, ReconnectTicker};
use statum::{machine, state};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters returned when the engine stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorReport {
    pub frames: u64,
    pub events_sent: u64,
    pub events_dropped: u64,
    pub reconnects: u64,
}

#[state]
#[derive(Debug, Clone)]
pub enum SensorEngineState {
    Initializing, // Pipe not opened yet
    Active,       // Frame loop running
    Draining,     // Releasing held buttons
    Stopped,      // Pipe closed
}

/// Sensor side of the relay.
///
/// Owns the landmark pair, the held-button set and the write end of the pipe.
/// Nothing else reads or mutates them; previews get copies of the current
/// snapshot through [`SensorEngine::preview`].
#[machine]
pub struct SensorEngine<S: SensorEngineState> {
    source: Box<dyn PoseSource>,
    producer: PipeProducer,
    ticker: Box<dyn ReconnectTicker>,
    classifier: GestureClassifier,
    debouncer: EventDebouncer,
    config_rx: watch::Receiver<PipelineConfig>,
    config: PipelineConfig,
    previous: Option<LandmarkSnapshot>,
    timing: FrameTiming,
    preview_tx: watch::Sender<Option<LandmarkSnapshot>>,
    report: SensorReport,
}

impl<S: SensorEngineState> SensorEngine<S> {
    pub fn report(&self) -> SensorReport {
        SensorReport {
            frames: self.timing.total_frames(),
            ..self.report
        }
    }

    /// Copies of the most recent snapshot, `None` while nobody is in view.
    pub fn preview(&self) -> watch::Receiver<Option<LandmarkSnapshot>> {
        self.preview_tx.subscribe()
    }

    async fn deliver(&mut self, event: ButtonEvent) {
        if !self.producer.is_connected() {
            debug!("No pipe, dropping {}", event);
            self.report.events_dropped += 1;
            return;
        }
        if self.producer.write_with_retry(&PipeMessage::from(event)).await {
            self.report.events_sent += 1;
        } else {
            self.report.events_dropped += 1;
        }
    }
}

impl SensorEngine<Initializing> {
    pub fn create(
        source: Box<dyn PoseSource>,
        producer: PipeProducer,
        strategy: RaiseStrategy,
        mut config_rx: watch::Receiver<PipelineConfig>,
        settings: &EngineSettings,
    ) -> Self {
        info!("Initializing sensor engine ({} raise strategy)", strategy);
        let now = Instant::now();
        let config = config_rx.borrow_and_update().clone();
        let (preview_tx, _) = watch::channel(None);

        Self::new(
            source,
            producer,
            Box::new(IntervalTicker::new(settings.reconnect_interval, now)),
            GestureClassifier::new(strategy),
            EventDebouncer::new(),
            config_rx,
            config,
            None, // previous snapshot
            FrameTiming::new(
                settings.target_fps,
                settings.slow_frame_margin,
                settings.stats_interval,
                now,
            ),
            preview_tx,
            SensorReport::default(),
        )
    }

    pub fn with_ticker(mut self, ticker: Box<dyn ReconnectTicker>) -> Self {
        self.ticker = ticker;
        self
    }

    /// Opens the pipe. Exhausting the retry budget is not fatal; the loop
    /// then runs without transport and the ticker keeps trying.
    pub async fn connect(mut self) -> SensorEngine<Active> {
        if let Err(e) = self.producer.open().await {
            warn!("Starting without transport: {}", e);
        }
        self.transition()
    }
}

impl SensorEngine<Active> {
    /// Runs frames at the target rate until stopped or the source runs dry.
    pub async fn run_until_stopped(mut self, cancel: CancellationToken) -> SensorEngine<Draining> {
        info!(
            "Sensor loop running, {:?} per frame",
            self.timing.budget()
        );

        loop {
            if cancel.is_cancelled() {
                info!("Stop requested");
                break;
            }

            let started = Instant::now();
            if !self.process_frame().await {
                info!("Pose source finished");
                break;
            }
            let rest = self.timing.record(started.elapsed());
            self.timing.report_if_due(Instant::now());

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stop requested");
                    break;
                }
                _ = tokio::time::sleep(rest) => {}
            }
        }

        self.transition()
    }

    /// One frame. Returns `false` once the source has no more frames.
    async fn process_frame(&mut self) -> bool {
        self.apply_config_updates();

        let current = match self.source.next_frame() {
            SourceFrame::Finished => return false,
            SourceFrame::Pose(snapshot) => {
                self.timing.pose_present();
                Some(snapshot)
            }
            SourceFrame::NoPose => {
                self.timing.pose_missing();
                None
            }
        };

        let gestures = self.classifier.classify(
            self.config.mappings.gestures(),
            current.as_ref(),
            self.previous.as_ref(),
            &self.config.thresholds,
        );
        let events = self.debouncer.update(&gestures, &self.config.mappings);

        self.preview_tx.send_replace(current.clone());
        // replaced, never merged; a missing pose clears the history
        self.previous = current;

        if !self.producer.is_connected() && self.ticker.poll_due(Instant::now()) {
            debug!("Attempting pipe reconnection");
            if self.producer.try_reconnect() {
                self.report.reconnects += 1;
            }
        }

        for event in events {
            self.deliver(event).await;
        }
        true
    }

    fn apply_config_updates(&mut self) {
        if self.config_rx.has_changed().unwrap_or(false) {
            self.config = self.config_rx.borrow_and_update().clone();
            info!(
                "Applied updated gesture configuration ({} mappings)",
                self.config.mappings.len()
            );
        }
    }
}

impl SensorEngine<Draining> {
    /// Releases every held button, then closes the pipe.
    pub async fn shutdown(mut self) -> SensorEngine<Stopped> {
        let releases = self.debouncer.drain();
        if !releases.is_empty() {
            info!("Releasing {} held buttons", releases.len());
            if !self.producer.is_connected() && self.producer.try_reconnect() {
                self.report.reconnects += 1;
            }
        }
        for event in releases {
            self.deliver(event).await;
        }

        self.producer.close().await;
        info!("Sensor engine stopped: {:?}", self.report());
        self.transition()
    }
}

impl SensorEngine<Stopped> {}
