use std::path::PathBuf;

/// Errors that can occur while opening or driving a bus channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a serial device.
    #[error("failed to open serial port {path}: {source}")]
    Serial {
        path: String,
        source: serialport::Error,
    },

    /// Failed to bind to the specified socket path.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified socket path.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        TransportError::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
