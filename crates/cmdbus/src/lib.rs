//! Addressed command bus between one master and a set of motor boards
//! sharing a serial link.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte channels (serial ports, simulated Unix-socket buses)
//! - [`frame`]: byte-stuffed frame codec and streaming decoder
//! - [`slave`]: board-side dispatch table and runtime loop (`slave` feature)
//! - [`master`]: synchronous bus client (`master` feature)
//!
//! ```no_run
//! use cmdbus::master::{BusClient, ClientConfig};
//! use cmdbus::transport::SerialConfig;
//!
//! let client = BusClient::open_serial(&SerialConfig::new("/dev/ttyUSB0"), ClientConfig::default())?;
//! let echoed = client.call(1, 2, 120)?;
//! assert_eq!(echoed, 120);
//! # Ok::<(), cmdbus::master::BusError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use cmdbus_transport::*;
}

/// Re-export frame codec types.
pub mod frame {
    pub use cmdbus_frame::*;
}

/// Re-export board-side types (requires `slave` feature).
#[cfg(feature = "slave")]
pub mod slave {
    pub use cmdbus_slave::*;
}

/// Re-export bus client types (requires `master` feature).
#[cfg(feature = "master")]
pub mod master {
    pub use cmdbus_master::*;
}
