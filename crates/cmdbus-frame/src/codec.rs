use bytes::{BufMut, BytesMut};

use crate::decoder::FrameDecoder;
use crate::error::{FrameError, Result};

/// Marks the beginning of a frame.
pub const START_BYTE: u8 = 0xA5;

/// Marks the end of a frame.
pub const END_BYTE: u8 = 0x5A;

/// Introduces a stuffed byte.
pub const ESCAPE_BYTE: u8 = 0x7D;

/// XORed into a stuffed byte so it no longer looks like a sentinel.
pub const ESCAPE_MASK: u8 = 0x20;

/// Bus-wide emergency stop. Every board answers it.
pub const SAFE_COMMAND: u8 = 255;

/// Address + command + sequence + 4 payload bytes.
pub const BODY_LEN: usize = 7;

/// Smallest possible frame: nothing stuffed.
pub const MIN_WIRE_SIZE: usize = 1 + BODY_LEN + 1 + 1;

/// Largest possible frame: every body byte and the checksum stuffed.
pub const MAX_WIRE_SIZE: usize = 1 + 2 * (BODY_LEN + 1) + 1;

/// One bus transaction, in either direction.
///
/// A request carries the master's payload for `command_id` on
/// `board_address`; the reply reuses the same envelope with the board's
/// payload. `sequence` is chosen by the master and echoed by the board, so a
/// reply can only ever be paired with the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    pub board_address: u8,
    pub command_id: u8,
    pub sequence: u8,
    pub payload: i32,
}

impl Transaction {
    /// A transaction in sequence slot 0.
    pub fn new(board_address: u8, command_id: u8, payload: i32) -> Self {
        Self {
            board_address,
            command_id,
            sequence: 0,
            payload,
        }
    }

    pub fn with_sequence(self, sequence: u8) -> Self {
        Self { sequence, ..self }
    }

    /// Whether this frame answers `request`.
    pub fn is_reply_to(&self, request: &Transaction) -> bool {
        self.board_address == request.board_address
            && self.command_id == request.command_id
            && self.sequence == request.sequence
    }

    /// The same envelope, sequence included, carrying a different payload.
    pub fn reply(&self, payload: i32) -> Self {
        Self { payload, ..*self }
    }

    /// The unescaped body bytes covered by the checksum.
    pub fn body(&self) -> [u8; BODY_LEN] {
        let p = self.payload.to_be_bytes();
        [
            self.board_address,
            self.command_id,
            self.sequence,
            p[0],
            p[1],
            p[2],
            p[3],
        ]
    }

    pub(crate) fn from_body(body: &[u8; BODY_LEN]) -> Self {
        Self {
            board_address: body[0],
            command_id: body[1],
            sequence: body[2],
            payload: i32::from_be_bytes([body[3], body[4], body[5], body[6]]),
        }
    }

    /// Number of bytes this transaction occupies on the wire.
    pub fn wire_size(&self) -> usize {
        let body = self.body();
        let stuffed = body
            .iter()
            .chain(std::iter::once(&checksum(&body)))
            .filter(|b| needs_escape(**b))
            .count();
        MIN_WIRE_SIZE + stuffed
    }
}

/// XOR of the unescaped body bytes.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc ^ b)
}

pub(crate) fn needs_escape(byte: u8) -> bool {
    matches!(byte, START_BYTE | END_BYTE | ESCAPE_BYTE)
}

fn put_stuffed(dst: &mut BytesMut, byte: u8) {
    if needs_escape(byte) {
        dst.put_u8(ESCAPE_BYTE);
        dst.put_u8(byte ^ ESCAPE_MASK);
    } else {
        dst.put_u8(byte);
    }
}

/// Append one encoded frame to `dst`.
///
/// Wire format (before stuffing):
/// ```text
/// ┌───────┬─────────┬─────────┬──────────┬──────────────────┬──────────┬──────┐
/// │ START │ address │ command │ sequence │ payload (4B BE)  │ checksum │ END  │
/// │ 0xA5  │         │         │          │ two's complement │ XOR body │ 0x5A │
/// └───────┴─────────┴─────────┴──────────┴──────────────────┴──────────┴──────┘
/// ```
pub fn encode_frame(transaction: &Transaction, dst: &mut BytesMut) {
    let body = transaction.body();
    let sum = checksum(&body);

    dst.reserve(MAX_WIRE_SIZE);
    dst.put_u8(START_BYTE);
    for byte in body {
        put_stuffed(dst, byte);
    }
    put_stuffed(dst, sum);
    dst.put_u8(END_BYTE);
}

/// Decode the first complete frame in `bytes`.
///
/// Unlike [`FrameDecoder`], this does not skip past damaged frames: the first
/// error is returned.
pub fn decode_frame(bytes: &[u8]) -> Result<Transaction> {
    let mut decoder = FrameDecoder::new();
    for &byte in bytes {
        if let Some(transaction) = decoder.push(byte)? {
            return Ok(transaction);
        }
    }
    Err(FrameError::FrameTooShort {
        received: bytes.len(),
    })
}
