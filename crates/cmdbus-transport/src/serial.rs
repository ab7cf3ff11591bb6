use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::BusStream;

/// Baud rate used by the motor boards unless configured otherwise.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Settings for opening a serial bus device.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    pub baud_rate: u32,
    /// Initial read timeout. Callers usually narrow it per read.
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(10),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Open a serial device as a bus channel (8N1, no flow control).
pub fn open_serial(config: &SerialConfig) -> Result<BusStream> {
    let port = serialport::new(config.path.as_str(), config.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|source| TransportError::Serial {
            path: config.path.clone(),
            source,
        })?;
    debug!(path = %config.path, baud = config.baud_rate, "opened serial bus");
    Ok(BusStream::from_serial(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_config_defaults() {
        let cfg = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(cfg.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(cfg.path, "/dev/ttyUSB0");

        let cfg = cfg.with_baud_rate(9600);
        assert_eq!(cfg.baud_rate, 9600);
    }

    #[test]
    fn open_missing_device_reports_path() {
        let cfg = SerialConfig::new("/dev/cmdbus-does-not-exist");
        let err = open_serial(&cfg).unwrap_err();
        match err {
            TransportError::Serial { path, .. } => assert_eq!(path, "/dev/cmdbus-does-not-exist"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
