use std::fmt;
use std::io;

use cmdbus_master::BusError;
use cmdbus_slave::{ConfigError, RuntimeError};
use cmdbus_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::PermissionDenied => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn bus_error(context: &str, err: BusError) -> CliError {
    match err {
        BusError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        BusError::Decode { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        BusError::InvalidAddress => CliError::new(USAGE, format!("{context}: {err}")),
        BusError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
        BusError::Io(source) => io_error(context, source),
        BusError::Transport(err) => transport_error(context, err),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    match err {
        ConfigError::Read { source, .. } => io_error(context, source),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn runtime_error(context: &str, err: RuntimeError) -> CliError {
    match err {
        RuntimeError::Transport(err) => transport_error(context, err),
        RuntimeError::InvalidAddress | RuntimeError::MissingSafeHandler { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        RuntimeError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
        RuntimeError::Frame(err) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
