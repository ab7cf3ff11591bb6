use std::path::PathBuf;

/// Errors raised while building a dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The command id already has a handler on this board.
    #[error("command {0} is already registered")]
    DuplicateCommand(u8),
}

/// Errors raised while loading or validating a board configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read board config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid board config json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid board config: {0}")]
    Invalid(String),

    #[error("board config registers conflicting commands: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Errors that stop a slave runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Address 0 is never assigned to a board.
    #[error("board address 0 is not addressable")]
    InvalidAddress,

    /// Every board must answer the emergency-stop command.
    #[error("board {address} has no handler for the emergency-stop command")]
    MissingSafeHandler { address: u8 },

    #[error("frame error: {0}")]
    Frame(#[from] cmdbus_frame::FrameError),

    #[error("transport error: {0}")]
    Transport(#[from] cmdbus_transport::TransportError),

    /// The master side of the channel went away.
    #[error("bus disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
