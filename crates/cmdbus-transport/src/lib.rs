//! Byte channel abstraction for the command bus.
//!
//! A bus is one shared, half-duplex byte channel between the master and every
//! board. In the field it is a serial port; for simulation and tests it is a
//! Unix domain socket. Everything above this crate only sees [`BusStream`] or
//! something implementing [`BusPort`].

pub mod error;
pub mod serial;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use serial::{open_serial, SerialConfig, DEFAULT_BAUD_RATE};
pub use traits::{BusPort, BusStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
