use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Smallest read timeout handed to the OS; a zero timeout means "block
/// forever" on some platforms.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// A byte channel the bus can poll with a bounded wait.
///
/// Reads that see no data within the timeout fail with
/// `ErrorKind::TimedOut` or `ErrorKind::WouldBlock`; callers treat both as
/// "nothing arrived yet".
pub trait BusPort: Read + Write + Send {
    /// Bound how long the next `read` may block.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;
}

/// A connected bus channel: a serial device or a Unix socket.
pub struct BusStream {
    inner: BusStreamInner,
}

enum BusStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for BusStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for BusStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl BusPort for BusStream {
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.set_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => {
                stream.set_read_timeout(Some(timeout)).map_err(Into::into)
            }
        }
    }
}

impl BusStream {
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: BusStreamInner::Serial(port),
        }
    }

    /// Wrap an already connected Unix socket.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: BusStreamInner::Unix(stream),
        }
    }

    /// A connected pair of in-process channels, one per bus side.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Try to clone this channel so reads and writes can be owned separately.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            BusStreamInner::Serial(port) => Ok(Self::from_serial(port.try_clone()?)),
            #[cfg(unix)]
            BusStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Short channel kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            BusStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            BusStreamInner::Unix(_) => "unix",
        }
    }
}

impl std::fmt::Debug for BusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            BusStreamInner::Serial(port) => f
                .debug_struct("BusStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            #[cfg(unix)]
            BusStreamInner::Unix(_) => f.debug_struct("BusStream").field("type", &"unix").finish(),
        }
    }
}
