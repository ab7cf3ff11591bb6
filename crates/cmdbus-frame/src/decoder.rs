use bytes::{Buf, BytesMut};

use crate::codec::{
    checksum, needs_escape, Transaction, BODY_LEN, END_BYTE, ESCAPE_BYTE, ESCAPE_MASK,
    MAX_WIRE_SIZE, START_BYTE,
};
use crate::error::{FrameError, Result};

/// Where the decoder is inside the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Between frames; everything except `START_BYTE` is ignored.
    Idle,
    /// Collecting body bytes.
    InFrame,
    /// The previous byte was `ESCAPE_BYTE`.
    Escaped,
    /// Body complete. Holds the checksum once it has been read; the next
    /// byte must then be `END_BYTE`.
    ExpectChecksum { checksum: Option<u8> },
}

/// Streaming frame decoder.
///
/// Bytes may be fed one at a time or in arbitrary chunks. The decoder never
/// blocks: it answers "need more bytes" until a frame completes or framing is
/// lost. Every error leaves the decoder resynchronised, ready for the next
/// `START_BYTE`.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecoderState,
    body: [u8; BODY_LEN],
    len: usize,
    /// Raw bytes consumed since the current `START_BYTE`, inclusive.
    raw_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            body: [0; BODY_LEN],
            len: 0,
            raw_len: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.len = 0;
        self.raw_len = 0;
    }

    fn begin(&mut self) {
        self.state = DecoderState::InFrame;
        self.len = 0;
        self.raw_len = 1;
    }

    /// Abandon the partial frame. A `START_BYTE` that caused the loss opens
    /// the next frame straight away.
    fn lost_framing(&mut self, byte: u8) -> FrameError {
        let received = self.raw_len;
        if byte == START_BYTE {
            self.begin();
        } else {
            self.reset();
        }
        FrameError::FrameTooShort { received }
    }

    fn store(&mut self, value: u8) {
        if self.len < BODY_LEN {
            self.body[self.len] = value;
            self.len += 1;
            self.state = if self.len == BODY_LEN {
                DecoderState::ExpectChecksum { checksum: None }
            } else {
                DecoderState::InFrame
            };
        } else {
            self.state = DecoderState::ExpectChecksum {
                checksum: Some(value),
            };
        }
    }

    /// Feed one byte.
    ///
    /// Returns `Ok(Some(_))` when this byte completes a valid frame and
    /// `Ok(None)` when more bytes are needed.
    pub fn push(&mut self, byte: u8) -> Result<Option<Transaction>> {
        if self.state == DecoderState::Idle {
            if byte == START_BYTE {
                self.begin();
            }
            return Ok(None);
        }

        self.raw_len += 1;
        if self.raw_len > MAX_WIRE_SIZE {
            return Err(self.lost_framing(byte));
        }

        match self.state {
            DecoderState::Idle => Ok(None),
            DecoderState::InFrame | DecoderState::ExpectChecksum { checksum: None } => {
                match byte {
                    START_BYTE | END_BYTE => Err(self.lost_framing(byte)),
                    ESCAPE_BYTE => {
                        self.state = DecoderState::Escaped;
                        Ok(None)
                    }
                    value => {
                        self.store(value);
                        Ok(None)
                    }
                }
            }
            DecoderState::Escaped => {
                if byte == START_BYTE {
                    return Err(self.lost_framing(byte));
                }
                let value = byte ^ ESCAPE_MASK;
                if !needs_escape(value) {
                    self.reset();
                    return Err(FrameError::InvalidEscape(byte));
                }
                self.store(value);
                Ok(None)
            }
            DecoderState::ExpectChecksum {
                checksum: Some(received),
            } => {
                if byte != END_BYTE {
                    return Err(self.lost_framing(byte));
                }
                let expected = checksum(&self.body);
                let transaction = Transaction::from_body(&self.body);
                self.reset();
                if received != expected {
                    return Err(FrameError::FrameCorrupt {
                        expected,
                        actual: received,
                    });
                }
                Ok(Some(transaction))
            }
        }
    }

    /// Consume bytes from `src` until a frame completes, an error occurs or
    /// `src` is exhausted.
    ///
    /// Bytes are consumed up to and including the one that produced the
    /// result, so calling again continues with the rest of the stream.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Transaction>> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(transaction) = self.push(byte)? {
                return Ok(Some(transaction));
            }
        }
        Ok(None)
    }
}
