//! Named-pipe transport between the sensor and the relay.
//!
//! # Wire format
//!
//! Three newline-terminated lines per message:
//!
//! ```text
//! SQUARE\npress\n\n        button message (third line empty)
//! LEFT\nx\n-0.25\n         analog message, value clamped to [-1, 1]
//! ```
//!
//! # Architecture
//!
//! ```text
//! PipeProducer ──► dyn PipeConnector ──► FIFO ──► dyn PipeSource ──► PipeConsumer ──► ControllerForwarder
//!  (open retry,                                                       (parse, resync,
//!   broken-pipe reopen)                                                 backoff)
//! ```

pub mod consumer;
pub mod fifo;
pub mod producer;
pub mod protocol;
pub mod ticker;

#[cfg(test)]
pub(crate) mod testing;

pub use consumer::{ConsumerSettings, ConsumerStats, PipeConsumer, PipeReader, PipeSource};
pub use fifo::{ensure_fifo, FifoConnector, FifoSource};
pub use producer::{PipeConnector, PipeProducer, PipeWriter, ProducerSettings};
pub use protocol::{parse_message, read_message, ReadOutcome};
pub use ticker::{IntervalTicker, ReconnectTicker};

use crate::controller::{Action, Axis, Button, ButtonEvent, Stick, UnknownName};
use std::fmt;
use std::path::PathBuf;

/// One message on the pipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipeMessage {
    Button { button: Button, action: Action },
    Analog { stick: Stick, axis: Axis, value: f32 },
}

impl PipeMessage {
    /// Analog message with `value` clamped to `[-1.0, 1.0]`.
    pub fn analog(stick: Stick, axis: Axis, value: f32) -> Self {
        PipeMessage::Analog {
            stick,
            axis,
            value: value.clamp(-1.0, 1.0),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            PipeMessage::Button { button, action } => format!("{}\n{}\n\n", button, action),
            PipeMessage::Analog { stick, axis, value } => {
                format!("{}\n{}\n{}\n", stick, axis, value)
            }
        }
    }
}

impl From<ButtonEvent> for PipeMessage {
    fn from(event: ButtonEvent) -> Self {
        PipeMessage::Button {
            button: event.button,
            action: event.action,
        }
    }
}

impl fmt::Display for PipeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeMessage::Button { button, action } => write!(f, "{} {}", button, action),
            PipeMessage::Analog { stick, axis, value } => {
                write!(f, "{} stick {} = {:.3}", stick, axis, value)
            }
        }
    }
}

/// Errors on the producing side of the pipe.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Pipe is not connected")]
    NotConnected,

    #[error("Failed to open pipe after {attempts} attempts: {source}")]
    OpenExhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipe I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to prepare FIFO at {path}: {source}")]
    Fifo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a message read from the pipe was discarded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Incomplete message, missing {0}")]
    Incomplete(&'static str),

    #[error(transparent)]
    UnknownName(#[from] UnknownName),

    #[error("Unknown message format: {name:?} / {token:?}")]
    UnknownFormat { name: String, token: String },

    #[error("Invalid analog value: {0:?}")]
    InvalidValue(String),
}
