//! Self-synchronizing frame codec for command bus transactions.
//!
//! Every transaction travels as one frame:
//! - `START_BYTE`, board address, command id
//! - a sequence slot the board echoes back
//! - a 4-byte big-endian signed payload
//! - an XOR checksum over the seven body bytes, then `END_BYTE`
//!
//! Body and checksum bytes that collide with a sentinel are byte-stuffed, so
//! a receiver can always find the next frame boundary after losing a byte.
//! Corrupt or truncated frames are dropped inside this crate; callers only
//! ever see whole, verified transactions.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    checksum, decode_frame, encode_frame, Transaction, BODY_LEN, END_BYTE, ESCAPE_BYTE,
    ESCAPE_MASK, MAX_WIRE_SIZE, MIN_WIRE_SIZE, SAFE_COMMAND, START_BYTE,
};
pub use decoder::{DecoderState, FrameDecoder};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, ReaderStats};
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::BusCodec;
