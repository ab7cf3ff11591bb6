use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{Transaction, MAX_WIRE_SIZE};
use crate::decoder::FrameDecoder;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 4 * MAX_WIRE_SIZE;

/// Counters describing what a reader has seen on the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub bytes_read: u64,
    pub frames_decoded: u64,
    /// Corrupt or truncated frames dropped by the decoder.
    pub frames_discarded: u64,
}

/// Reads verified transactions from any `Read` channel.
///
/// Partial reads, line noise and resynchronisation are handled here. Callers
/// see whole transactions, I/O errors (including read timeouts) and
/// end-of-stream; never a damaged frame.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: FrameDecoder,
    stats: ReaderStats,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            decoder: FrameDecoder::new(),
            stats: ReaderStats::default(),
        }
    }

    /// Read the next valid transaction (blocking, subject to the channel's
    /// read timeout).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at end-of-stream.
    pub fn read_transaction(&mut self) -> Result<Transaction> {
        loop {
            if let Some(transaction) = self.decode_buffered() {
                return Ok(transaction);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.stats.bytes_read += read as u64;
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Return a buffered transaction or perform at most one read.
    ///
    /// `Ok(None)` means no complete frame arrived within one read timeout.
    /// Loops that must keep a fixed cadence (e.g. a board's control step)
    /// use this instead of [`FrameReader::read_transaction`].
    pub fn try_read_transaction(&mut self) -> Result<Option<Transaction>> {
        if let Some(transaction) = self.decode_buffered() {
            return Ok(Some(transaction));
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match self.inner.read(&mut chunk) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(None),
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(None)
            }
            Err(err) => return Err(FrameError::Io(err)),
        };

        self.stats.bytes_read += read as u64;
        self.buf.extend_from_slice(&chunk[..read]);
        Ok(self.decode_buffered())
    }

    fn decode_buffered(&mut self) -> Option<Transaction> {
        loop {
            match self.decoder.decode(&mut self.buf) {
                Ok(Some(transaction)) => {
                    self.stats.frames_decoded += 1;
                    return Some(transaction);
                }
                Ok(None) => return None,
                Err(err) => {
                    self.stats.frames_discarded += 1;
                    debug!(error = %err, "discarding damaged frame");
                }
            }
        }
    }

    /// Forget buffered bytes and any partial frame.
    pub fn discard_buffered(&mut self) {
        self.buf.clear();
        self.decoder.reset();
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner channel.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{encode_frame, START_BYTE};

    fn wire(transactions: &[Transaction]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for tx in transactions {
            encode_frame(tx, &mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_transaction() {
        let tx = Transaction::new(1, 2, 120);
        let mut reader = FrameReader::new(Cursor::new(wire(&[tx])));

        assert_eq!(reader.read_transaction().unwrap(), tx);
        assert_eq!(reader.stats().frames_decoded, 1);
    }

    #[test]
    fn read_multiple_transactions_from_one_chunk() {
        let txs = [
            Transaction::new(1, 2, 1),
            Transaction::new(1, 3, 2),
            Transaction::new(4, 20, -3),
        ];
        let mut reader = FrameReader::new(Cursor::new(wire(&txs)));

        for expected in txs {
            assert_eq!(reader.read_transaction().unwrap(), expected);
        }
        assert!(matches!(
            reader.read_transaction().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn partial_read_handling() {
        let tx = Transaction::new(5, 30, 350);
        let byte_reader = ByteByByteReader {
            bytes: wire(&[tx]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);
        assert_eq!(reader.read_transaction().unwrap(), tx);
    }

    #[test]
    fn damaged_frames_are_skipped_and_counted() {
        let good = Transaction::new(2, 12, 170);
        let mut bytes = wire(&[Transaction::new(2, 12, 12)]);
        bytes[4] ^= 0x01;
        bytes.extend([START_BYTE, 0x02]);
        bytes.extend(wire(&[good]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_transaction().unwrap(), good);

        let stats = reader.stats();
        assert_eq!(stats.frames_discarded, 2);
        assert_eq!(stats.frames_decoded, 1);
    }

    #[test]
    fn connection_closed_mid_frame() {
        let bytes = wire(&[Transaction::new(1, 2, 3)]);
        let mut reader = FrameReader::new(Cursor::new(bytes[..5].to_vec()));
        assert!(matches!(
            reader.read_transaction().unwrap_err(),
            FrameError::ConnectionClosed
        ));
        assert_eq!(reader.stats().bytes_read, 5);
    }

    #[test]
    fn read_timeout_propagates_and_keeps_partial_frame() {
        let tx = Transaction::new(9, 9, 9);
        let bytes = wire(&[tx]);
        let (head, tail) = bytes.split_at(4);
        let port = StutteringReader {
            chunks: vec![Ok(head.to_vec()), Err(ErrorKind::TimedOut), Ok(tail.to_vec())],
        };
        let mut reader = FrameReader::new(port);

        let err = reader.read_transaction().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(reader.read_transaction().unwrap(), tx);
    }

    #[test]
    fn interrupted_read_retries() {
        let tx = Transaction::new(8, 8, 8);
        let port = StutteringReader {
            chunks: vec![Err(ErrorKind::Interrupted), Ok(wire(&[tx]))],
        };
        let mut reader = FrameReader::new(port);
        assert_eq!(reader.read_transaction().unwrap(), tx);
    }

    #[test]
    fn discard_buffered_drops_stale_bytes() {
        let stale = Transaction::new(1, 2, 1);
        let fresh = Transaction::new(1, 2, 2);
        let port = StutteringReader {
            chunks: vec![
                Ok(wire(&[stale, stale])),
                Err(ErrorKind::WouldBlock),
                Ok(wire(&[fresh])),
            ],
        };
        let mut reader = FrameReader::new(port);

        assert_eq!(reader.read_transaction().unwrap(), stale);
        reader.discard_buffered();
        assert!(reader.read_transaction().unwrap_err().is_timeout());
        assert_eq!(reader.read_transaction().unwrap(), fresh);
    }

    #[test]
    fn try_read_performs_one_read_at_most() {
        let tx = Transaction::new(1, 2, 120);
        let bytes = wire(&[tx, tx]);
        let (head, tail) = bytes.split_at(3);
        let port = StutteringReader {
            chunks: vec![
                Ok(head.to_vec()),
                Err(ErrorKind::TimedOut),
                Ok(tail.to_vec()),
            ],
        };
        let mut reader = FrameReader::new(port);

        assert_eq!(reader.try_read_transaction().unwrap(), None);
        assert_eq!(reader.try_read_transaction().unwrap(), None);
        assert_eq!(reader.try_read_transaction().unwrap(), Some(tx));
        // Second frame is already buffered; no read needed.
        assert_eq!(reader.try_read_transaction().unwrap(), Some(tx));
        assert!(matches!(
            reader.try_read_transaction().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    /// Replays a script of chunks and error kinds, then reports EOF.
    struct StutteringReader {
        chunks: Vec<std::result::Result<Vec<u8>, ErrorKind>>,
    }

    impl Read for StutteringReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(kind) => Err(std::io::Error::from(kind)),
            }
        }
    }
}
