//! Write end of the pipe.

use super::{PipeMessage, TransportError};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

pub type PipeWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Opens the write end. Fails while there is no reader or no pipe.
pub trait PipeConnector: Send {
    fn connect(&mut self) -> io::Result<PipeWriter>;
}

#[derive(Clone, Debug)]
pub struct ProducerSettings {
    pub open_attempts: u32,
    pub open_retry_delay: Duration,
    pub write_attempts: u32,
    pub write_retry_delay: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            open_attempts: 5,
            open_retry_delay: Duration::from_secs(2),
            write_attempts: 3,
            write_retry_delay: Duration::from_millis(10),
        }
    }
}

/// Owner of the write handle.
///
/// Without a handle the producer is in the "no sink" state: writes fail fast
/// and the caller decides when to reconnect.
pub struct PipeProducer {
    connector: Box<dyn PipeConnector>,
    writer: Option<PipeWriter>,
    settings: ProducerSettings,
}

async fn write_payload(writer: &mut PipeWriter, payload: &[u8]) -> io::Result<()> {
    writer.write_all(payload).await?;
    writer.flush().await
}

impl PipeProducer {
    pub fn new(connector: Box<dyn PipeConnector>, settings: Option<ProducerSettings>) -> Self {
        let settings = settings.unwrap_or_default();
        debug!("Creating pipe producer with settings: {:?}", settings);
        Self {
            connector,
            writer: None,
            settings,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Opens the pipe, retrying up to `open_attempts` times.
    ///
    /// On failure the producer stays without a sink; nothing here is fatal.
    pub async fn open(&mut self) -> Result<(), TransportError> {
        let attempts = self.settings.open_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.connector.connect() {
                Ok(writer) => {
                    info!("Pipe opened for writing (attempt {}/{})", attempt, attempts);
                    self.writer = Some(writer);
                    return Ok(());
                }
                Err(e) if attempt >= attempts => {
                    error!(
                        "Failed to open pipe after {} attempts: {}. Continuing without transport",
                        attempts, e
                    );
                    return Err(TransportError::OpenExhausted {
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "Pipe open attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, attempts, e, self.settings.open_retry_delay
                    );
                    tokio::time::sleep(self.settings.open_retry_delay).await;
                }
            }
        }
    }

    /// A single connection attempt, used for in-place recovery and the
    /// periodic reconnection sweep.
    pub fn try_reconnect(&mut self) -> bool {
        match self.connector.connect() {
            Ok(writer) => {
                info!("Reconnected to pipe");
                self.writer = Some(writer);
                true
            }
            Err(e) => {
                debug!("Reconnect attempt failed: {}", e);
                false
            }
        }
    }

    /// Writes one message and flushes it.
    ///
    /// A broken pipe closes the handle, reconnects once and retries the write
    /// once. If that fails too the producer is left closed.
    pub async fn write(&mut self, message: &PipeMessage) -> Result<(), TransportError> {
        let payload = message.encode();
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;

        let result = write_payload(writer, payload.as_bytes()).await;
        match result {
            Ok(()) => {
                debug!("Sent {}", message);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                warn!("Broken pipe while sending {}, reopening", message);
                self.close().await;
                if !self.try_reconnect() {
                    return Err(TransportError::Io(e));
                }

                let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
                let retry = write_payload(writer, payload.as_bytes()).await;
                match retry {
                    Ok(()) => {
                        debug!("Sent {} after reconnect", message);
                        Ok(())
                    }
                    Err(e) => {
                        warn!("Write failed again after reconnect: {}", e);
                        self.close().await;
                        Err(TransportError::Io(e))
                    }
                }
            }
            Err(e) => {
                warn!("Pipe write error: {}", e);
                Err(TransportError::Io(e))
            }
        }
    }

    /// [`write`](Self::write) with a bounded number of attempts.
    ///
    /// Returns `false` once every attempt failed.
    pub async fn write_with_retry(&mut self, message: &PipeMessage) -> bool {
        let attempts = self.settings.write_attempts.max(1);
        for attempt in 1..=attempts {
            match self.write(message).await {
                Ok(()) => return true,
                Err(e) => {
                    debug!("Write attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.write_retry_delay).await;
                    }
                }
            }
        }
        warn!("Giving up on {} after {} attempts", message, attempts);
        false
    }

    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Error while closing pipe: {}", e);
            }
            info!("Pipe closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Action, Button};
    use crate::pipe::testing::{Connect, ScriptedConnector, SharedBuf};
    use std::sync::atomic::Ordering;

    fn settings() -> ProducerSettings {
        ProducerSettings {
            open_attempts: 5,
            open_retry_delay: Duration::ZERO,
            write_attempts: 3,
            write_retry_delay: Duration::ZERO,
        }
    }

    fn square() -> PipeMessage {
        PipeMessage::Button {
            button: Button::Square,
            action: Action::Press,
        }
    }

    #[tokio::test]
    async fn open_succeeds_once_the_pipe_appears() {
        let buf = SharedBuf::default();
        let connector = ScriptedConnector::new(vec![
            Connect::Missing,
            Connect::Missing,
            Connect::Ok(buf.clone()),
        ]);
        let attempts = connector.attempts.clone();
        let mut producer = PipeProducer::new(Box::new(connector), Some(settings()));

        producer.open().await.unwrap();
        assert!(producer.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        producer.write(&square()).await.unwrap();
        assert_eq!(buf.text(), "SQUARE\npress\n\n");
    }

    #[tokio::test]
    async fn open_gives_up_after_the_budget() {
        let connector = ScriptedConnector::new(vec![]);
        let attempts = connector.attempts.clone();
        let mut producer = PipeProducer::new(Box::new(connector), Some(settings()));

        let err = producer.open().await.unwrap_err();
        assert!(matches!(err, TransportError::OpenExhausted { attempts: 5, .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert!(!producer.is_connected());
        assert!(matches!(
            producer.write(&square()).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn broken_pipe_reopens_and_retries_once() {
        let buf = SharedBuf::default();
        let connector = ScriptedConnector::new(vec![Connect::Broken, Connect::Ok(buf.clone())]);
        let attempts = connector.attempts.clone();
        let mut producer = PipeProducer::new(Box::new(connector), Some(settings()));

        producer.open().await.unwrap();
        producer.write(&square()).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(buf.text(), "SQUARE\npress\n\n");
    }

    #[tokio::test]
    async fn broken_pipe_without_reader_leaves_producer_closed() {
        let connector = ScriptedConnector::new(vec![Connect::Broken]);
        let mut producer = PipeProducer::new(Box::new(connector), Some(settings()));

        producer.open().await.unwrap();
        assert!(producer.write(&square()).await.is_err());
        assert!(!producer.is_connected());
        assert!(!producer.write_with_retry(&square()).await);
    }

    #[tokio::test]
    async fn close_shuts_the_writer_down() {
        let buf = SharedBuf::default();
        let connector = ScriptedConnector::new(vec![Connect::Ok(buf.clone())]);
        let mut producer = PipeProducer::new(Box::new(connector), Some(settings()));

        producer.open().await.unwrap();
        producer.close().await;
        assert!(buf.is_shut_down());
        assert!(!producer.is_connected());
    }
}
