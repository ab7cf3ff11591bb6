use std::io::{ErrorKind, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use cmdbus_frame::{FrameError, FrameReader, FrameWriter, Transaction, SAFE_COMMAND};
use cmdbus_transport::{open_serial, BusPort, BusStream, SerialConfig};
use tracing::{debug, warn};

use crate::error::{BusError, Result};

/// Reply window of a call.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(50);

/// Longest single read while waiting inside the reply window.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Client tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long a call waits for its reply.
    pub reply_timeout: Duration,
    /// Read timeout applied to the channel. Bounds how far past
    /// `reply_timeout` a call can overrun.
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }
}

struct Channel<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    next_sequence: u8,
}

impl<R, W> Channel<R, W> {
    fn take_sequence(&mut self) -> u8 {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.wrapping_add(1);
        sequence
    }
}

/// Synchronous request/response client for one bus.
///
/// Exactly one transaction is in flight at a time: [`BusClient::call`] holds
/// the channel until its reply arrives or the window closes. Each request
/// takes the next sequence slot; a reply that arrives after its call timed
/// out carries a stale slot and is dropped by whichever call reads it.
pub struct BusClient<R, W> {
    channel: Mutex<Channel<R, W>>,
    config: ClientConfig,
}

impl BusClient<BusStream, BusStream> {
    /// Use one bus channel for both directions.
    pub fn open(stream: BusStream, config: ClientConfig) -> Result<Self> {
        let reader = stream.try_clone()?;
        Self::new(reader, stream, config)
    }

    /// Open a serial bus device.
    pub fn open_serial(serial: &SerialConfig, config: ClientConfig) -> Result<Self> {
        Self::open(open_serial(serial)?, config)
    }

    /// Connect to a simulated bus on a Unix socket.
    #[cfg(unix)]
    pub fn connect_unix(path: impl AsRef<std::path::Path>, config: ClientConfig) -> Result<Self> {
        Self::open(cmdbus_transport::UnixDomainSocket::connect(path)?, config)
    }
}

impl<R, W> BusClient<R, W>
where
    R: BusPort,
    W: Write + Send,
{
    pub fn new(mut reader: R, writer: W, config: ClientConfig) -> Result<Self> {
        reader.set_read_timeout(config.poll_interval)?;
        Ok(Self {
            channel: Mutex::new(Channel {
                reader: FrameReader::new(reader),
                writer: FrameWriter::new(writer),
                next_sequence: 0,
            }),
            config,
        })
    }

    pub fn config(&self) -> ClientConfig {
        self.config
    }

    /// Send `payload` to `command_id` on board `board_address` and return
    /// the reply payload.
    ///
    /// Fails with [`BusError::Timeout`] if nothing arrived within the reply
    /// window and [`BusError::Decode`] if bytes arrived but no matching reply
    /// could be decoded from them. Nothing is retried.
    pub fn call(&self, board_address: u8, command_id: u8, payload: i32) -> Result<i32> {
        if board_address == 0 {
            return Err(BusError::InvalidAddress);
        }

        let mut channel = self.lock();
        channel.reader.discard_buffered();
        let bytes_before = channel.reader.stats().bytes_read;

        let request = Transaction::new(board_address, command_id, payload)
            .with_sequence(channel.take_sequence());
        channel
            .writer
            .write_transaction(&request)
            .map_err(channel_error)?;
        let deadline = Instant::now() + self.config.reply_timeout;

        loop {
            match channel.reader.try_read_transaction() {
                Ok(Some(reply)) if reply.is_reply_to(&request) => {
                    debug!(
                        address = board_address,
                        command = command_id,
                        sequence = request.sequence,
                        payload,
                        reply = reply.payload,
                        "call complete"
                    );
                    return Ok(reply.payload);
                }
                Ok(Some(stray)) => {
                    debug!(
                        address = stray.board_address,
                        command = stray.command_id,
                        sequence = stray.sequence,
                        payload = stray.payload,
                        "discarding stray frame"
                    );
                }
                Ok(None) => {}
                Err(err) => return Err(channel_error(err)),
            }

            if Instant::now() >= deadline {
                let bytes = channel.reader.stats().bytes_read - bytes_before;
                return Err(if bytes == 0 {
                    BusError::Timeout(self.config.reply_timeout)
                } else {
                    BusError::Decode {
                        address: board_address,
                        command: command_id,
                        bytes,
                    }
                });
            }
        }
    }

    /// Send the emergency stop to every address in turn, carrying on past
    /// failures.
    pub fn stop_all(&self, addresses: &[u8]) -> Vec<(u8, Result<i32>)> {
        addresses
            .iter()
            .map(|&address| {
                let result = self.call(address, SAFE_COMMAND, 0);
                if let Err(err) = &result {
                    warn!(address, error = %err, "emergency stop not acknowledged");
                }
                (address, result)
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Channel<R, W>> {
        self.channel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<R, W> std::fmt::Debug for BusClient<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn channel_error(err: FrameError) -> BusError {
    match err {
        FrameError::ConnectionClosed => BusError::Disconnected,
        FrameError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
            ) =>
        {
            BusError::Disconnected
        }
        FrameError::Io(io) => BusError::Io(io),
        other => BusError::Io(std::io::Error::new(ErrorKind::InvalidData, other)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Read;
    use std::sync::Arc;

    use bytes::BytesMut;
    use cmdbus_frame::{decode_frame, encode_frame};

    use super::*;

    /// Serves queued chunks, then times out like an idle serial line.
    struct ScriptedPort {
        chunks: VecDeque<Vec<u8>>,
        timeout: Duration,
        repeat_last: bool,
    }

    impl ScriptedPort {
        fn silent() -> Self {
            Self::with_chunks(Vec::new())
        }

        fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
                timeout: Duration::from_millis(1),
                repeat_last: false,
            }
        }

        fn noisy(noise: Vec<u8>) -> Self {
            Self {
                repeat_last: true,
                ..Self::with_chunks(vec![noise])
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let chunk = if self.repeat_last && self.chunks.len() == 1 {
                self.chunks.front().cloned()
            } else {
                self.chunks.pop_front()
            };
            match chunk {
                Some(chunk) => {
                    std::thread::sleep(Duration::from_millis(1));
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => {
                    std::thread::sleep(self.timeout);
                    Err(std::io::Error::new(ErrorKind::TimedOut, "idle"))
                }
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl BusPort for ScriptedPort {
        fn set_read_timeout(&mut self, timeout: Duration) -> cmdbus_transport::Result<()> {
            self.timeout = timeout;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("sink lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn frame(address: u8, command: u8, payload: i32) -> Vec<u8> {
        frame_in_slot(address, command, 0, payload)
    }

    fn frame_in_slot(address: u8, command: u8, sequence: u8, payload: i32) -> Vec<u8> {
        let mut wire = BytesMut::new();
        encode_frame(
            &Transaction::new(address, command, payload).with_sequence(sequence),
            &mut wire,
        );
        wire.to_vec()
    }

    fn config(reply_timeout_ms: u64) -> ClientConfig {
        ClientConfig {
            reply_timeout: Duration::from_millis(reply_timeout_ms),
            poll_interval: Duration::from_millis(2),
        }
    }

    #[test]
    fn returns_matching_reply_payload() {
        let sink = SharedSink::default();
        let port = ScriptedPort::with_chunks(vec![frame(3, 2, 120)]);
        let client = BusClient::new(port, sink.clone(), config(50)).expect("client");

        assert_eq!(client.call(3, 2, 120).expect("call should succeed"), 120);

        let sent = sink.0.lock().expect("sink lock").clone();
        assert_eq!(
            decode_frame(&sent).expect("request frame"),
            Transaction::new(3, 2, 120)
        );
    }

    #[test]
    fn stray_frames_are_skipped() {
        let port = ScriptedPort::with_chunks(vec![
            frame(4, 2, 1),
            frame(3, 9, 2),
            frame(3, 2, -7),
        ]);
        let client = BusClient::new(port, std::io::sink(), config(50)).expect("client");
        assert_eq!(client.call(3, 2, 0).expect("call should succeed"), -7);
    }

    #[test]
    fn reply_in_an_older_slot_is_not_accepted() {
        let sink = SharedSink::default();
        let port = ScriptedPort::with_chunks(vec![
            frame(1, 2, 5),
            frame_in_slot(1, 2, 0, 111),
            frame_in_slot(1, 2, 1, -222),
        ]);
        let client = BusClient::new(port, sink.clone(), config(50)).expect("client");

        assert_eq!(client.call(1, 2, 5).expect("first call"), 5);
        assert_eq!(client.call(1, 2, -222).expect("second call"), -222);

        let sent = sink.0.lock().expect("sink lock").clone();
        let mut reader = FrameReader::new(std::io::Cursor::new(sent));
        assert_eq!(reader.read_transaction().expect("first request").sequence, 0);
        assert_eq!(reader.read_transaction().expect("second request").sequence, 1);
    }

    #[test]
    fn sequence_slots_wrap_around() {
        let chunks = (0..=256u16)
            .map(|n| frame_in_slot(1, 2, n as u8, i32::from(n)))
            .collect();
        let client = BusClient::new(ScriptedPort::with_chunks(chunks), std::io::sink(), config(50))
            .expect("client");

        for n in 0..=256u16 {
            assert_eq!(client.call(1, 2, 0).expect("call"), i32::from(n));
        }
    }

    #[test]
    fn silence_times_out_no_earlier_than_the_window() {
        let client =
            BusClient::new(ScriptedPort::silent(), std::io::sink(), config(30)).expect("client");

        let started = Instant::now();
        let err = client.call(1, 2, 0).expect_err("call should time out");
        let elapsed = started.elapsed();

        assert!(matches!(err, BusError::Timeout(d) if d == Duration::from_millis(30)));
        assert!(elapsed >= Duration::from_millis(30), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
        assert!(err.is_recoverable());
    }

    #[test]
    fn garbage_reports_decode_error() {
        let port = ScriptedPort::noisy(vec![0xA5, 0x01, 0x5A, 0x33]);
        let client = BusClient::new(port, std::io::sink(), config(20)).expect("client");

        let err = client.call(1, 2, 0).expect_err("call should fail");
        assert!(matches!(
            err,
            BusError::Decode {
                address: 1,
                command: 2,
                ..
            }
        ));
    }

    #[test]
    fn corrupted_reply_is_a_decode_error() {
        let mut reply = frame(1, 2, 5);
        reply[3] ^= 0x01;
        let port = ScriptedPort::with_chunks(vec![reply]);
        let client = BusClient::new(port, std::io::sink(), config(20)).expect("client");

        assert!(matches!(
            client.call(1, 2, 5),
            Err(BusError::Decode { .. })
        ));
    }

    #[test]
    fn address_zero_is_refused_without_sending() {
        let sink = SharedSink::default();
        let client =
            BusClient::new(ScriptedPort::silent(), sink.clone(), config(20)).expect("client");

        assert!(matches!(client.call(0, 2, 1), Err(BusError::InvalidAddress)));
        assert!(sink.0.lock().expect("sink lock").is_empty());
    }

    #[test]
    fn stop_all_continues_past_failures() {
        let port = ScriptedPort::with_chunks(vec![frame(1, SAFE_COMMAND, 0)]);
        let client = BusClient::new(port, std::io::sink(), config(15)).expect("client");

        let results = client.stop_all(&[1, 2, 3]);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 1);
        assert_eq!(*results[0].1.as_ref().expect("board 1 replies"), 0);
        assert!(matches!(results[1].1, Err(BusError::Timeout(_))));
        assert!(matches!(results[2].1, Err(BusError::Timeout(_))));
    }

    #[test]
    fn end_of_stream_is_a_disconnect() {
        struct ClosedPort;
        impl Read for ClosedPort {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Ok(0)
            }
        }
        impl Write for ClosedPort {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        impl BusPort for ClosedPort {
            fn set_read_timeout(&mut self, _timeout: Duration) -> cmdbus_transport::Result<()> {
                Ok(())
            }
        }

        let client = BusClient::new(ClosedPort, std::io::sink(), config(20)).expect("client");
        assert!(matches!(client.call(1, 2, 0), Err(BusError::Disconnected)));
    }
}
