use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drive::DriveMapping;
use crate::error::ConfigError;

/// Most ports a board may declare.
pub const MAX_PORTS: usize = 64;

/// What is wired to a board port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortFunction {
    /// An H-bridge driven motor, commandable over the bus.
    Motor,
    /// A rotary encoder.
    Encoder,
    /// Anything else (or an output owned by a board-local function).
    Other,
}

/// Limit switches guarding one motor port.
///
/// A tripped switch forces the goal to zero in its direction of travel;
/// travel away from the switch stays allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interlock {
    pub motor_port: usize,
    #[serde(default)]
    pub forward_limit: Option<usize>,
    #[serde(default)]
    pub reverse_limit: Option<usize>,
}

/// A hanger axis: the master sets a goal speed, the board drives its own
/// port and stops at either end switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangerConfig {
    pub command: u8,
    pub motor_port: usize,
    #[serde(default)]
    pub forward_limit: Option<usize>,
    #[serde(default)]
    pub reverse_limit: Option<usize>,
    /// Drive the motor opposite to the commanded sign.
    #[serde(default)]
    pub inverted: bool,
}

impl Default for HangerConfig {
    fn default() -> Self {
        Self {
            command: 20,
            motor_port: 1,
            forward_limit: Some(0),
            reverse_limit: Some(1),
            inverted: true,
        }
    }
}

impl HangerConfig {
    pub(crate) fn interlock(&self) -> Interlock {
        Interlock {
            motor_port: self.motor_port,
            forward_limit: self.forward_limit,
            reverse_limit: self.reverse_limit,
        }
    }
}

/// A tray stepped between slit positions. The master names a target
/// position; the board counts slit edges and drives toward it at a fixed
/// speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrayConfig {
    pub command: u8,
    pub motor_port: usize,
    /// Photo-interrupter watching the slit disc.
    pub slit: usize,
    /// Limit switch at the far end of travel.
    pub home_limit: usize,
    /// Position assigned when `home_limit` trips.
    #[serde(default = "default_tray_home_point")]
    pub home_point: i32,
    #[serde(default = "default_tray_speed")]
    pub speed: i32,
}

fn default_tray_home_point() -> i32 {
    7
}

fn default_tray_speed() -> i32 {
    100
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            command: 20,
            motor_port: 0,
            slit: 0,
            home_limit: 6,
            home_point: default_tray_home_point(),
            speed: default_tray_speed(),
        }
    }
}

/// A read-only command returning an encoder count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub command: u8,
    pub port: usize,
}

/// Static description of one board, loaded once at boot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Bus address, 1..=255.
    pub address: u8,
    pub ports: Vec<PortFunction>,
    #[serde(default = "default_max_pwm")]
    pub max_pwm: i32,
    #[serde(default = "default_max_duty")]
    pub max_duty: f32,
    #[serde(default = "default_control_period_ms")]
    pub control_period_ms: u64,
    #[serde(default)]
    pub interlocks: Vec<Interlock>,
    #[serde(default)]
    pub hanger: Option<HangerConfig>,
    #[serde(default)]
    pub tray: Option<TrayConfig>,
    #[serde(default)]
    pub encoders: Vec<EncoderConfig>,
}

fn default_max_pwm() -> i32 {
    250
}

fn default_max_duty() -> f32 {
    0.95
}

fn default_control_period_ms() -> u64 {
    2
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            address: 1,
            ports: vec![PortFunction::Motor; 4],
            max_pwm: default_max_pwm(),
            max_duty: default_max_duty(),
            control_period_ms: default_control_period_ms(),
            interlocks: Vec::new(),
            hanger: None,
            tray: None,
            encoders: Vec::new(),
        }
    }
}

impl BoardConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check internal consistency. Command id collisions are reported later,
    /// when the dispatch table is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address == 0 {
            return Err(invalid("address must be in 1..=255"));
        }
        if self.ports.is_empty() || self.ports.len() > MAX_PORTS {
            return Err(invalid(format!(
                "ports must list between 1 and {MAX_PORTS} entries"
            )));
        }
        if self.max_pwm <= 0 {
            return Err(invalid("max_pwm must be positive"));
        }
        if !(self.max_duty > 0.0 && self.max_duty <= 1.0) {
            return Err(invalid("max_duty must be in (0, 1]"));
        }
        if self.control_period_ms == 0 {
            return Err(invalid("control_period_ms must be positive"));
        }

        for interlock in &self.interlocks {
            if self.port(interlock.motor_port) != Some(PortFunction::Motor) {
                return Err(invalid(format!(
                    "interlock references port {} which is not a motor port",
                    interlock.motor_port
                )));
            }
        }

        if let Some(hanger) = &self.hanger {
            match self.port(hanger.motor_port) {
                None => {
                    return Err(invalid(format!(
                        "hanger port {} does not exist",
                        hanger.motor_port
                    )))
                }
                Some(PortFunction::Motor) => {
                    return Err(invalid(format!(
                        "hanger port {} is already a bus-commanded motor port",
                        hanger.motor_port
                    )))
                }
                Some(_) => {}
            }
        }

        if let Some(tray) = &self.tray {
            match self.port(tray.motor_port) {
                None => {
                    return Err(invalid(format!(
                        "tray port {} does not exist",
                        tray.motor_port
                    )))
                }
                Some(PortFunction::Motor) => {
                    return Err(invalid(format!(
                        "tray port {} is already a bus-commanded motor port",
                        tray.motor_port
                    )))
                }
                Some(_) => {}
            }
            if self.hanger.map(|hanger| hanger.motor_port) == Some(tray.motor_port) {
                return Err(invalid(format!(
                    "tray and hanger both drive port {}",
                    tray.motor_port
                )));
            }
            if tray.speed <= 0 {
                return Err(invalid("tray speed must be positive"));
            }
        }

        for encoder in &self.encoders {
            if self.port(encoder.port) != Some(PortFunction::Encoder) {
                return Err(invalid(format!(
                    "encoder command {} references port {} which is not an encoder port",
                    encoder.command, encoder.port
                )));
            }
        }

        Ok(())
    }

    fn port(&self, index: usize) -> Option<PortFunction> {
        self.ports.get(index).copied()
    }

    /// Indices of ports wired as motors.
    pub fn motor_ports(&self) -> impl Iterator<Item = usize> + '_ {
        self.ports
            .iter()
            .enumerate()
            .filter(|(_, function)| **function == PortFunction::Motor)
            .map(|(index, _)| index)
    }

    pub fn drive_mapping(&self) -> DriveMapping {
        DriveMapping {
            max_pwm: self.max_pwm,
            max_duty: self.max_duty,
        }
    }

    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
