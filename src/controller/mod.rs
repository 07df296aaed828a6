//! Controller side of the relay
//!
//! Holds the button/stick vocabulary shared with the producer, the abstraction
//! over the remote-play controller, and the forwarder that drives it.
//!
//! # Architecture
//!
//! ```text
//! PipeMessage ──► ControllerForwarder ──► dyn Controller
//!                 (retry / give up)        (remote-play session)
//! ```

pub mod buttons;
pub mod forwarder;
pub mod logging;

pub use buttons::{Action, Axis, Button, ButtonEvent, Stick, UnknownName};
pub use forwarder::{ControllerForwarder, ForwarderSettings};
pub use logging::LoggingController;

/// Errors reported by a controller implementation.
///
/// The forwarder treats the two variants differently: connection failures are
/// transient and retried, an API mismatch is permanent.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The session behind the controller is unreachable right now.
    #[error("Controller connection error: {0}")]
    Connection(String),

    /// The controller does not support the requested call.
    #[error("Controller API mismatch: {0}")]
    ApiMismatch(String),
}

/// Abstraction over the remote-play controller.
///
/// Stick updates are staged with [`Controller::stick`] and only sent to the
/// session by [`Controller::update_sticks`].
pub trait Controller: Send {
    fn button(&mut self, button: Button, action: Action) -> Result<(), ControllerError>;

    fn stick(&mut self, stick: Stick, axis: Axis, value: f32) -> Result<(), ControllerError>;

    fn update_sticks(&mut self) -> Result<(), ControllerError>;
}
