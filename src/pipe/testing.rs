//! In-memory pipe ends for tests.

use super::{PipeConnector, PipeReader, PipeSource, PipeWriter};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::CancellationToken;

/// Writer that appends everything to a shared buffer.
#[derive(Clone, Default)]
pub struct SharedBuf {
    pub bytes: Arc<Mutex<Vec<u8>>>,
    pub shut_down: Arc<Mutex<bool>>,
}

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shut_down.lock().unwrap()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        *self.shut_down.lock().unwrap() = true;
        Poll::Ready(Ok(()))
    }
}

/// Writer whose reader has gone away.
pub struct BrokenWriter;

impl AsyncWrite for BrokenWriter {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

pub enum Connect {
    Missing,
    Broken,
    Ok(SharedBuf),
}

/// Connector that plays back a script; once it runs out every attempt fails.
pub struct ScriptedConnector {
    script: VecDeque<Connect>,
    pub attempts: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Connect>) -> Self {
        Self {
            script: script.into(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PipeConnector for ScriptedConnector {
    fn connect(&mut self) -> io::Result<PipeWriter> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Connect::Ok(buf)) => Ok(Box::new(buf)),
            Some(Connect::Broken) => Ok(Box::new(BrokenWriter)),
            Some(Connect::Missing) | None => Err(io::ErrorKind::NotFound.into()),
        }
    }
}

/// Reader that yields its bytes and then fails with `kind`.
pub struct FailingReader {
    bytes: io::Cursor<Vec<u8>>,
    kind: io::ErrorKind,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = self.bytes.get_ref().len() as u64 - self.bytes.position();
        if remaining == 0 {
            return Poll::Ready(Err(self.kind.into()));
        }
        Pin::new(&mut self.bytes).poll_read(cx, buf)
    }
}

pub enum Open {
    /// Ends in EOF.
    Stream(Vec<u8>),
    /// Ends in a read error.
    FailAfter(Vec<u8>, io::ErrorKind),
    Fail(io::ErrorKind),
}

/// Source that hands out scripted streams and cancels `stop` when it runs dry.
pub struct ScriptedSource {
    script: VecDeque<Open>,
    stop: CancellationToken,
    pub opens: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Open>, stop: CancellationToken) -> Self {
        Self {
            script: script.into(),
            stop,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PipeSource for ScriptedSource {
    fn open(&mut self) -> io::Result<PipeReader> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Open::Stream(bytes)) => Ok(Box::new(io::Cursor::new(bytes))),
            Some(Open::FailAfter(bytes, kind)) => Ok(Box::new(FailingReader {
                bytes: io::Cursor::new(bytes),
                kind,
            })),
            Some(Open::Fail(kind)) => Err(kind.into()),
            None => {
                self.stop.cancel();
                Err(io::ErrorKind::NotFound.into())
            }
        }
    }
}
