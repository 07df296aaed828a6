//! POSIX FIFO backing for both pipe ends.

use super::consumer::{PipeReader, PipeSource};
use super::producer::{PipeConnector, PipeWriter};
use super::TransportError;
use std::ffi::CString;
use std::fs::{self, Permissions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tokio::net::unix::pipe;
use tracing::{debug, info, warn};

const FIFO_MODE: u32 = 0o666;

/// Makes sure a FIFO exists at `path`, replacing any other file found there.
pub fn ensure_fifo(path: &Path) -> Result<(), TransportError> {
    let fifo_error = |source: io::Error| TransportError::Fifo {
        path: path.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => {
            debug!("FIFO already present at {}", path.display());
            return Ok(());
        }
        Ok(_) => {
            warn!("{} exists but is not a FIFO, replacing it", path.display());
            fs::remove_file(path).map_err(fifo_error)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(fifo_error(e)),
    }

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| fifo_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE as libc::mode_t) };
    if rc != 0 {
        return Err(fifo_error(io::Error::last_os_error()));
    }

    // mkfifo is subject to the umask
    fs::set_permissions(path, Permissions::from_mode(FIFO_MODE)).map_err(fifo_error)?;
    info!("Created FIFO at {}", path.display());
    Ok(())
}

/// Write end on a FIFO path. Fails with `ENXIO` while no reader is attached.
pub struct FifoConnector {
    path: PathBuf,
}

impl FifoConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PipeConnector for FifoConnector {
    fn connect(&mut self) -> io::Result<PipeWriter> {
        let sender = pipe::OpenOptions::new().open_sender(&self.path)?;
        Ok(Box::new(sender))
    }
}

/// Read end on a FIFO path.
pub struct FifoSource {
    path: PathBuf,
}

impl FifoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PipeSource for FifoSource {
    fn open(&mut self) -> io::Result<PipeReader> {
        let mut options = pipe::OpenOptions::new();
        // keeps the FIFO open across writer restarts instead of spinning on EOF
        #[cfg(target_os = "linux")]
        options.read_write(true);
        let receiver = options.open_receiver(&self.path)?;
        Ok(Box::new(receiver))
    }
}
