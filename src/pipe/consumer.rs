//! Read end of the pipe: parse and forward until stopped.

use super::protocol::{read_message, ReadOutcome};
use crate::controller::ControllerForwarder;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, BufReader};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type PipeReader = Box<dyn AsyncRead + Unpin + Send>;

/// Opens the read end of the pipe.
pub trait PipeSource: Send {
    fn open(&mut self) -> io::Result<PipeReader>;
}

#[derive(Clone, Debug)]
pub struct ConsumerSettings {
    /// Consecutive bad messages before the pipe is reopened.
    pub max_consecutive_errors: u32,
    pub not_found_backoff: Duration,
    pub broken_backoff: Duration,
    /// Pause after a malformed message.
    pub error_delay: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 10,
            not_found_backoff: Duration::from_secs(2),
            broken_backoff: Duration::from_secs(1),
            error_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub opens: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
    pub discarded: u64,
    pub resyncs: u64,
}

/// How a read session on one pipe handle ended.
enum SessionEnd {
    Stopped,
    WriterGone,
    Broken,
    Resync,
}

pub struct PipeConsumer {
    source: Box<dyn PipeSource>,
    forwarder: ControllerForwarder,
    settings: ConsumerSettings,
    stats: ConsumerStats,
}

/// Sleeps for `delay` unless stopped first. Returns `true` when stopped.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

impl PipeConsumer {
    pub fn new(
        source: Box<dyn PipeSource>,
        forwarder: ControllerForwarder,
        settings: Option<ConsumerSettings>,
    ) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating pipe consumer with settings: {:?}", settings);
        Self {
            source,
            forwarder,
            settings,
            stats: ConsumerStats::default(),
        }
    }

    /// Runs until `cancel` fires, reopening the pipe as often as needed.
    pub async fn run(&mut self, cancel: CancellationToken) -> ConsumerStats {
        info!("Pipe consumer started");

        while !cancel.is_cancelled() {
            let reader = match self.source.open() {
                Ok(reader) => reader,
                Err(e) => {
                    let backoff = if e.kind() == io::ErrorKind::NotFound {
                        warn!(
                            "Pipe not found, retrying in {:?}",
                            self.settings.not_found_backoff
                        );
                        self.settings.not_found_backoff
                    } else {
                        warn!(
                            "Failed to open pipe: {}, retrying in {:?}",
                            e, self.settings.broken_backoff
                        );
                        self.settings.broken_backoff
                    };
                    if pause(backoff, &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            self.stats.opens += 1;
            info!("Pipe opened for reading");

            // the handle is dropped when the session returns, on every path
            let end = self.session(reader, &cancel).await;

            let backoff = match end {
                SessionEnd::Stopped => break,
                SessionEnd::Resync => {
                    self.stats.resyncs += 1;
                    continue;
                }
                SessionEnd::WriterGone => {
                    info!("Writer disconnected, waiting for it to come back");
                    self.settings.broken_backoff
                }
                SessionEnd::Broken => self.settings.broken_backoff,
            };
            if pause(backoff, &cancel).await {
                break;
            }
        }

        info!("Pipe consumer stopped: {:?}", self.stats);
        self.stats
    }

    async fn session(&mut self, reader: PipeReader, cancel: &CancellationToken) -> SessionEnd {
        let mut reader = BufReader::new(reader);
        let mut buf = String::new();
        let mut consecutive_errors = 0u32;
        let budget = self.settings.max_consecutive_errors.max(1);

        loop {
            let outcome = select! {
                biased;
                _ = cancel.cancelled() => return SessionEnd::Stopped,
                outcome = read_message(&mut reader, &mut buf) => outcome,
            };

            match outcome {
                Ok(ReadOutcome::Message(message)) => {
                    consecutive_errors = 0;
                    debug!("Received {}", message);
                    match self.forwarder.forward(&message).await {
                        Ok(()) => self.stats.forwarded += 1,
                        Err(e) => {
                            debug!("Dropped {}: {}", message, e);
                            self.stats.forward_failures += 1;
                        }
                    }
                }
                Ok(ReadOutcome::Skipped) => {}
                Ok(ReadOutcome::Malformed(e)) => {
                    warn!("Discarding message: {}", e);
                    self.stats.discarded += 1;
                    consecutive_errors += 1;
                    if consecutive_errors >= budget {
                        error!(
                            "{} consecutive bad messages, reopening pipe",
                            consecutive_errors
                        );
                        return SessionEnd::Resync;
                    }
                    if pause(self.settings.error_delay, cancel).await {
                        return SessionEnd::Stopped;
                    }
                }
                Ok(ReadOutcome::Eof) => return SessionEnd::WriterGone,
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    warn!("Broken pipe, reopening in {:?}", self.settings.broken_backoff);
                    return SessionEnd::Broken;
                }
                Err(e) => {
                    error!("Pipe read error: {}", e);
                    return SessionEnd::Broken;
                }
            }
        }
    }
}
