use std::time::Duration;

/// Errors returned by [`crate::BusClient`].
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Nothing arrived within the reply window.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// Bytes arrived but never formed a valid reply to this request.
    #[error("no valid reply from board {address} to command {command} ({bytes} bytes received)")]
    Decode { address: u8, command: u8, bytes: u64 },

    /// Address 0 is never assigned to a board and there is no broadcast.
    #[error("board address 0 is not addressable")]
    InvalidAddress,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel was closed by the other side.
    #[error("bus disconnected")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(#[from] cmdbus_transport::TransportError),
}

impl BusError {
    /// Whether the error ended one call but left the channel usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BusError::Timeout(_) | BusError::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
