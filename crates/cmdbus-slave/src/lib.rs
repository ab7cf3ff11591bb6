//! Slave side of the command bus.
//!
//! A board registers one handler per command id in a [`DispatchTable`] at
//! startup, then hands the table, its [`BoardState`] and its I/O to a
//! [`SlaveRuntime`]. The runtime answers every frame addressed to the board
//! and runs the control step that turns recorded goals into actuator output.
//!
//! Handlers never actuate directly. They record goals in [`BoardState`];
//! the [`Controller`] applies local interlocks and writes outputs on every
//! loop iteration.

pub mod board;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod drive;
pub mod error;
pub mod handlers;
pub mod io;
pub mod runtime;
pub mod state;

pub use board::{Board, BoardBuilder};
pub use config::{
    BoardConfig, EncoderConfig, HangerConfig, Interlock, PortFunction, TrayConfig,
};
pub use control::Controller;
pub use dispatch::{CommandHandler, DispatchOutcome, DispatchTable, Reply};
pub use drive::{map_range, DriveMapping};
pub use error::{ConfigError, DispatchError, RuntimeError};
pub use handlers::{SAFE_COMMAND, SPIN_MOTOR_BASE};
pub use io::{Actuators, Sensors, SimActuators, SimSensors};
pub use runtime::{RuntimeConfig, RuntimePhase, RuntimeStats, SlaveRuntime};
pub use state::{BoardState, HangerState, TrayPhase, TrayState};
