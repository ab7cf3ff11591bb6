/// Errors that can occur while encoding, decoding or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame checksum does not match its body.
    #[error("corrupt frame (checksum 0x{actual:02X}, expected 0x{expected:02X})")]
    FrameCorrupt { expected: u8, actual: u8 },

    /// An escape byte was followed by a value that does not unescape to a sentinel.
    #[error("corrupt frame (invalid escape 0x{0:02X})")]
    InvalidEscape(u8),

    /// Framing was lost before `END_BYTE` arrived.
    #[error("frame too short (framing lost after {received} bytes)")]
    FrameTooShort { received: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Line noise the decoder has already recovered from.
    pub fn is_noise(&self) -> bool {
        matches!(
            self,
            FrameError::FrameCorrupt { .. }
                | FrameError::InvalidEscape(_)
                | FrameError::FrameTooShort { .. }
        )
    }

    /// A read that gave up because nothing arrived within the port timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            FrameError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_classification() {
        assert!(FrameError::FrameCorrupt {
            expected: 1,
            actual: 2
        }
        .is_noise());
        assert!(FrameError::InvalidEscape(0x00).is_noise());
        assert!(FrameError::FrameTooShort { received: 3 }.is_noise());
        assert!(!FrameError::ConnectionClosed.is_noise());
    }

    #[test]
    fn timeout_classification() {
        let timed_out = FrameError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        let would_block = FrameError::Io(std::io::Error::from(std::io::ErrorKind::WouldBlock));
        let broken = FrameError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(timed_out.is_timeout());
        assert!(would_block.is_timeout());
        assert!(!broken.is_timeout());
        assert!(!FrameError::ConnectionClosed.is_timeout());
    }
}
