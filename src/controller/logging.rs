use super::{Action, Axis, Button, Controller, ControllerError, Stick};
use tracing::info;

/// Controller that only logs what it is asked to do.
///
/// Used by `playable relay` when no remote-play session is attached, and handy
/// for checking the producer end to end.
#[derive(Debug, Default)]
pub struct LoggingController {
    left: (f32, f32),
    right: (f32, f32),
}

impl LoggingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stick_state(&self, stick: Stick) -> (f32, f32) {
        match stick {
            Stick::Left => self.left,
            Stick::Right => self.right,
        }
    }
}

impl Controller for LoggingController {
    fn button(&mut self, button: Button, action: Action) -> Result<(), ControllerError> {
        info!("Controller button: {} {}", button, action);
        Ok(())
    }

    fn stick(&mut self, stick: Stick, axis: Axis, value: f32) -> Result<(), ControllerError> {
        let state = match stick {
            Stick::Left => &mut self.left,
            Stick::Right => &mut self.right,
        };
        match axis {
            Axis::X => state.0 = value,
            Axis::Y => state.1 = value,
        }
        Ok(())
    }

    fn update_sticks(&mut self) -> Result<(), ControllerError> {
        info!(
            "Controller sticks: left=({:.2}, {:.2}) right=({:.2}, {:.2})",
            self.left.0, self.left.1, self.right.0, self.right.1
        );
        Ok(())
    }
}
