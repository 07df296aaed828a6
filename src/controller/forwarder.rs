//! Forwards parsed pipe messages to the controller abstraction.

use super::{Controller, ControllerError};
use crate::pipe::PipeMessage;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct ForwarderSettings {
    /// Total attempts per message for connection failures.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Controller API mismatch: {0}")]
    ApiMismatch(String),

    #[error("Failed to forward after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

pub struct ControllerForwarder {
    controller: Box<dyn Controller>,
    settings: ForwarderSettings,
    // An API mismatch is logged at error level only the first time.
    api_mismatch_reported: bool,
}

impl ControllerForwarder {
    pub fn new(controller: Box<dyn Controller>, settings: Option<ForwarderSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating controller forwarder with settings: {:?}", settings);
        Self {
            controller,
            settings,
            api_mismatch_reported: false,
        }
    }

    fn dispatch(&mut self, message: &PipeMessage) -> Result<(), ControllerError> {
        match *message {
            PipeMessage::Button { button, action } => {
                self.controller.button(button, action)?;
                debug!("Button: {} {}", button, action);
            }
            PipeMessage::Analog { stick, axis, value } => {
                self.controller.stick(stick, axis, value)?;
                self.controller.update_sticks()?;
                debug!("Stick: {} {} = {}", stick, axis, value);
            }
        }
        Ok(())
    }

    /// Sends one message to the controller.
    ///
    /// Connection errors are retried up to `max_attempts` times with a fixed
    /// delay; an API mismatch fails immediately.
    pub async fn forward(&mut self, message: &PipeMessage) -> Result<(), ForwardError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.dispatch(message) {
                Ok(()) => return Ok(()),
                Err(ControllerError::ApiMismatch(detail)) => {
                    if self.api_mismatch_reported {
                        debug!("Controller API mismatch (already reported): {}", detail);
                    } else {
                        error!("Controller API error, not retrying: {}", detail);
                        self.api_mismatch_reported = true;
                    }
                    return Err(ForwardError::ApiMismatch(detail));
                }
                Err(ControllerError::Connection(detail)) => {
                    warn!("Connection error forwarding {}: {}", message, detail);
                    if attempt >= max_attempts {
                        error!("Failed to forward {} after {} attempts", message, attempt);
                        return Err(ForwardError::Exhausted {
                            attempts: attempt,
                            last: detail,
                        });
                    }
                    info!("Retrying... (attempt {}/{})", attempt + 1, max_attempts);
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Action, Axis, Button, Stick};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ScriptedController {
        failures: VecDeque<ControllerError>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedController {
        fn next(&mut self, call: String) -> Result<(), ControllerError> {
            self.calls.lock().unwrap().push(call);
            match self.failures.pop_front() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    impl Controller for ScriptedController {
        fn button(&mut self, button: Button, action: Action) -> Result<(), ControllerError> {
            self.next(format!("button {} {}", button, action))
        }

        fn stick(&mut self, stick: Stick, axis: Axis, value: f32) -> Result<(), ControllerError> {
            self.next(format!("stick {} {} {}", stick, axis, value))
        }

        fn update_sticks(&mut self) -> Result<(), ControllerError> {
            self.next("update_sticks".to_string())
        }
    }

    fn forwarder(failures: Vec<ControllerError>) -> (ControllerForwarder, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let controller = ScriptedController {
            failures: failures.into(),
            calls: calls.clone(),
        };
        let settings = ForwarderSettings {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
        };
        (
            ControllerForwarder::new(Box::new(controller), Some(settings)),
            calls,
        )
    }

    #[tokio::test]
    async fn analog_messages_stage_then_update_sticks() {
        let (mut fwd, calls) = forwarder(vec![]);
        let msg = PipeMessage::Analog {
            stick: Stick::Left,
            axis: Axis::X,
            value: 0.5,
        };
        fwd.forward(&msg).await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["stick LEFT x 0.5".to_string(), "update_sticks".to_string()]
        );
    }

    #[tokio::test]
    async fn connection_errors_are_retried() {
        let (mut fwd, calls) = forwarder(vec![
            ControllerError::Connection("session lost".into()),
            ControllerError::Connection("session lost".into()),
        ]);
        let msg = PipeMessage::Button {
            button: Button::Square,
            action: Action::Press,
        };
        fwd.forward(&msg).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn connection_errors_give_up_after_budget() {
        let failures = (0..5)
            .map(|_| ControllerError::Connection("down".into()))
            .collect();
        let (mut fwd, calls) = forwarder(failures);
        let msg = PipeMessage::Button {
            button: Button::Cross,
            action: Action::Release,
        };
        let err = fwd.forward(&msg).await.unwrap_err();
        assert!(matches!(err, ForwardError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn api_mismatch_is_not_retried() {
        let (mut fwd, calls) = forwarder(vec![ControllerError::ApiMismatch("no button()".into())]);
        let msg = PipeMessage::Button {
            button: Button::Ps,
            action: Action::Press,
        };
        let err = fwd.forward(&msg).await.unwrap_err();
        assert!(matches!(err, ForwardError::ApiMismatch(_)));
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(fwd.api_mismatch_reported);
    }
}
