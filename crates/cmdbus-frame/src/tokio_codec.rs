//! `tokio_util::codec` adapter for async masters and gateways.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{encode_frame, Transaction};
use crate::decoder::FrameDecoder;
use crate::error::FrameError;

/// Frames transactions for `FramedRead`/`FramedWrite`.
///
/// Damaged frames are skipped just like in [`crate::FrameReader`].
#[derive(Debug, Default)]
pub struct BusCodec {
    decoder: FrameDecoder,
    discarded: u64,
}

impl BusCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Damaged frames dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Decoder for BusCodec {
    type Item = Transaction;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.decoder.decode(src) {
                Err(err) if err.is_noise() => {
                    self.discarded += 1;
                    debug!(error = %err, "discarding damaged frame");
                }
                other => return other,
            }
        }
    }
}

impl Encoder<Transaction> for BusCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Transaction, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}
