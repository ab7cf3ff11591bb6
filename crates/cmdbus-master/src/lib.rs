//! Master side of the command bus.
//!
//! [`BusClient::call`] sends one addressed request and blocks until the
//! matching reply arrives or the reply window closes. Calls are serialised
//! on the channel, so a client can be shared between threads behind an
//! `Arc`.

pub mod client;
pub mod error;

pub use client::{BusClient, ClientConfig};
pub use cmdbus_frame::SAFE_COMMAND;
pub use error::{BusError, Result};
