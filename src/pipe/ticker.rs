use std::time::Duration;
use tokio::time::Instant;

/// Decides when the producer loop should try to reconnect a lost pipe.
///
/// Time is passed in, so tests can drive it without sleeping.
pub trait ReconnectTicker: Send {
    fn poll_due(&mut self, now: Instant) -> bool;
}

/// Fires at most once per `interval`.
#[derive(Debug, Clone)]
pub struct IntervalTicker {
    interval: Duration,
    last: Instant,
}

impl IntervalTicker {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }
}

impl ReconnectTicker for IntervalTicker {
    fn poll_due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
