use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cmdbus_frame::{FrameError, FrameReader, FrameWriter, ReaderStats, Transaction};
use cmdbus_transport::BusPort;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::board::Board;
use crate::config::BoardConfig;
use crate::dispatch::DispatchOutcome;
use crate::error::{Result, RuntimeError};
use crate::handlers::SAFE_COMMAND;
use crate::io::{Actuators, Sensors};
use crate::state::BoardState;

/// Default poll window, and so control period, of a board.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Runtime tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Longest a poll waits for bytes before the control step runs anyway.
    pub poll_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl RuntimeConfig {
    pub fn for_board(config: &BoardConfig) -> Self {
        Self {
            poll_interval: config.control_period(),
        }
    }
}

/// Where the runtime is within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePhase {
    WaitingForFrame,
    Dispatching,
    Replying,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeStats {
    pub handled: u64,
    pub rejected: u64,
    pub unknown: u64,
    /// Frames addressed to other boards on the shared bus.
    pub ignored: u64,
    pub control_steps: u64,
}

/// Serves one board on one bus channel.
///
/// Each [`SlaveRuntime::poll_once`] waits at most one poll window for a
/// frame, answers it if it is addressed to this board, then runs one control
/// step. Every addressed frame gets exactly one reply, unknown commands
/// included.
pub struct SlaveRuntime<R, W, A, S> {
    board: Board,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    actuators: A,
    sensors: S,
    config: RuntimeConfig,
    phase: RuntimePhase,
    stats: RuntimeStats,
}

impl<R, W, A, S> SlaveRuntime<R, W, A, S>
where
    R: BusPort,
    W: Write + Send,
    A: Actuators,
    S: Sensors,
{
    /// Take ownership of `board` and its channel.
    ///
    /// Fails for address 0 or a board without an emergency-stop handler.
    /// All outputs are neutral when this returns.
    pub fn new(
        board: Board,
        mut reader: R,
        writer: W,
        mut actuators: A,
        sensors: S,
        config: RuntimeConfig,
    ) -> Result<Self> {
        if board.address() == 0 {
            return Err(RuntimeError::InvalidAddress);
        }
        if !board.table().contains(SAFE_COMMAND) {
            return Err(RuntimeError::MissingSafeHandler {
                address: board.address(),
            });
        }

        reader.set_read_timeout(config.poll_interval)?;
        actuators.neutral_all();

        info!(
            address = board.address(),
            commands = board.table().len(),
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "board runtime ready"
        );

        Ok(Self {
            board,
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            actuators,
            sensors,
            config,
            phase: RuntimePhase::WaitingForFrame,
            stats: RuntimeStats::default(),
        })
    }

    /// Wait one poll window for a frame, serve it, then run one control step.
    pub fn poll_once(&mut self) -> Result<()> {
        self.phase = RuntimePhase::WaitingForFrame;
        match self.reader.try_read_transaction() {
            Ok(Some(request)) => self.serve(request)?,
            Ok(None) => {}
            Err(err) => return Err(channel_error(err)),
        }
        self.control_step();
        Ok(())
    }

    fn serve(&mut self, request: Transaction) -> Result<()> {
        let address = self.board.address();
        if request.board_address != address {
            self.stats.ignored += 1;
            trace!(
                address = request.board_address,
                command = request.command_id,
                "frame for another board"
            );
            return Ok(());
        }

        self.phase = RuntimePhase::Dispatching;
        let (table, state, _) = self.board.parts_mut();
        let (payload, outcome) = table.dispatch(state, request.command_id, request.payload);

        match outcome {
            DispatchOutcome::Handled => self.stats.handled += 1,
            DispatchOutcome::Rejected => self.stats.rejected += 1,
            DispatchOutcome::UnknownCommand => {
                self.stats.unknown += 1;
                warn!(address, command = request.command_id, "unknown command");
            }
        }

        if request.command_id == SAFE_COMMAND && outcome == DispatchOutcome::Handled {
            self.actuators.neutral_all();
            info!(address, "emergency stop");
        }

        debug!(
            address,
            command = request.command_id,
            sequence = request.sequence,
            payload = request.payload,
            reply = payload,
            outcome = outcome.as_str(),
            "served command"
        );

        self.phase = RuntimePhase::Replying;
        self.writer
            .write_transaction(&request.reply(payload))
            .map_err(channel_error)?;
        self.phase = RuntimePhase::WaitingForFrame;
        Ok(())
    }

    /// Sample sensors, apply interlocks and write every owned output.
    pub fn control_step(&mut self) {
        let (_, state, controller) = self.board.parts_mut();
        controller.step(state, &mut self.sensors, &mut self.actuators);
        self.stats.control_steps += 1;
    }

    /// Poll until `running` clears or the channel fails. Outputs are neutral
    /// on return either way.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        info!(address = self.board.address(), "board runtime started");
        let result = loop {
            if !running.load(Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(err) = self.poll_once() {
                break Err(err);
            }
        };
        self.actuators.neutral_all();
        self.phase = RuntimePhase::WaitingForFrame;
        info!(
            address = self.board.address(),
            handled = self.stats.handled,
            "board runtime stopped"
        );
        result
    }

    /// Swap in a new channel, keeping board state and counters.
    pub fn reattach(&mut self, mut reader: R, writer: W) -> Result<()> {
        reader.set_read_timeout(self.config.poll_interval)?;
        self.reader = FrameReader::new(reader);
        self.writer = FrameWriter::new(writer);
        self.phase = RuntimePhase::WaitingForFrame;
        Ok(())
    }

    pub fn address(&self) -> u8 {
        self.board.address()
    }

    pub fn phase(&self) -> RuntimePhase {
        self.phase
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    pub fn reader_stats(&self) -> ReaderStats {
        self.reader.stats()
    }

    pub fn state(&self) -> &BoardState {
        self.board.state()
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }
}

fn channel_error(err: FrameError) -> RuntimeError {
    match err {
        FrameError::ConnectionClosed => RuntimeError::Disconnected,
        FrameError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
            ) =>
        {
            RuntimeError::Disconnected
        }
        other => RuntimeError::Frame(other),
    }
}
