use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::BusStream;

/// A simulated bus segment on a filesystem Unix socket.
///
/// A simulated board binds the path and accepts one master at a time; the
/// master connects to it. The bytes exchanged are identical to what would
/// travel over the serial line.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixDomainSocket {
    /// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 elsewhere.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on `path`, removing a stale socket left by a previous
    /// run. Refuses to remove anything that is not a socket.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(TransportError::Bind {
                    path,
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
            debug!(?path, "removing stale bus socket");
            std::fs::remove_file(&path).map_err(|source| TransportError::Bind {
                path: path.clone(),
                source,
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            path: path.clone(),
            source,
        })?;
        info!(?path, "simulated bus listening");

        Ok(Self { listener, path })
    }

    /// Accept the next master connection (blocking).
    pub fn accept(&self) -> Result<BusStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "master attached to simulated bus");
        Ok(BusStream::from_unix(stream))
    }

    /// Accept a waiting master without blocking. `Ok(None)` when nobody is
    /// waiting.
    pub fn try_accept(&self) -> Result<Option<BusStream>> {
        self.listener
            .set_nonblocking(true)
            .map_err(TransportError::Accept)?;
        let accepted = self.listener.accept();
        self.listener
            .set_nonblocking(false)
            .map_err(TransportError::Accept)?;
        match accepted {
            Ok((stream, _addr)) => {
                stream.set_nonblocking(false)?;
                debug!(path = ?self.path, "master attached to simulated bus");
                Ok(Some(BusStream::from_unix(stream)))
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Connect to a simulated bus as the master.
    pub fn connect(path: impl AsRef<Path>) -> Result<BusStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to simulated bus");
        Ok(BusStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket() {
                debug!(path = ?self.path, "removing bus socket");
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}
