use std::io::{ErrorKind, Write};

use bytes::{Buf, BytesMut};

use crate::codec::{encode_frame, Transaction, MAX_WIRE_SIZE};
use crate::error::{FrameError, Result};

fn retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Interrupted | ErrorKind::WouldBlock)
}

/// Encodes transactions onto any `Write` channel.
///
/// Every transaction leaves as one contiguous burst followed by a flush, so
/// a UART never idles mid-frame between our own writes.
pub struct FrameWriter<T> {
    inner: T,
    pending: BytesMut,
    frames_written: u64,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(MAX_WIRE_SIZE),
            frames_written: 0,
        }
    }

    /// Encode `transaction`, push every byte out and flush.
    ///
    /// A channel that accepts zero bytes is reported as
    /// [`FrameError::ConnectionClosed`].
    pub fn write_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        self.pending.clear();
        encode_frame(transaction, &mut self.pending);

        while self.pending.has_remaining() {
            match self.inner.write(self.pending.chunk()) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.pending.advance(n),
                Err(err) if retryable(err.kind()) => {}
                Err(err) => return Err(err.into()),
            }
        }

        self.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Err(err) if retryable(err.kind()) => continue,
                other => return other.map_err(FrameError::Io),
            }
        }
    }

    /// Transactions fully written since construction.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
