use std::cmp::Ordering;

use tracing::{debug, info};

use crate::config::{BoardConfig, HangerConfig, Interlock, PortFunction, TrayConfig};
use crate::drive::DriveMapping;
use crate::io::{Actuators, Sensors};
use crate::state::{BoardState, TrayPhase, TrayState};

impl Interlock {
    /// Zero `goal` if it moves toward a tripped switch.
    pub fn clamp<S: Sensors + ?Sized>(&self, goal: i32, sensors: &mut S) -> i32 {
        let limit = match goal.signum() {
            1 => self.forward_limit,
            -1 => self.reverse_limit,
            _ => None,
        };
        match limit {
            Some(id) if sensors.limit_switch(id) => 0,
            _ => goal,
        }
    }
}

/// Turns the goals in [`BoardState`] into actuator output.
///
/// One [`Controller::step`] samples sensors, applies interlocks and writes
/// every owned output, whether or not a command arrived since the last step.
#[derive(Debug, Clone)]
pub struct Controller {
    mapping: DriveMapping,
    motor_ports: Vec<usize>,
    encoder_ports: Vec<usize>,
    interlocks: Vec<Interlock>,
    hanger: Option<HangerConfig>,
    tray: Option<TrayConfig>,
}

impl Controller {
    pub fn new(config: &BoardConfig) -> Self {
        let encoder_ports = config
            .ports
            .iter()
            .enumerate()
            .filter(|(_, function)| **function == PortFunction::Encoder)
            .map(|(port, _)| port)
            .collect();
        Self {
            mapping: config.drive_mapping(),
            motor_ports: config.motor_ports().collect(),
            encoder_ports,
            interlocks: config.interlocks.clone(),
            hanger: config.hanger,
            tray: config.tray,
        }
    }

    pub fn mapping(&self) -> DriveMapping {
        self.mapping
    }

    pub fn step<S, A>(&self, state: &mut BoardState, sensors: &mut S, actuators: &mut A)
    where
        S: Sensors + ?Sized,
        A: Actuators + ?Sized,
    {
        for &port in &self.encoder_ports {
            state.set_encoder_count(port, sensors.encoder_count(port));
        }

        for &port in &self.motor_ports {
            let goal = state.motor_goal(port);
            let speed = self
                .interlocks
                .iter()
                .filter(|interlock| interlock.motor_port == port)
                .fold(goal, |speed, interlock| interlock.clamp(speed, sensors));
            if speed != goal {
                debug!(port, goal, "interlock holding motor");
            }
            self.write(state, actuators, port, speed);
        }

        if let Some(config) = &self.hanger {
            self.step_hanger(config, state, sensors, actuators);
        }
        if let Some(config) = &self.tray {
            self.step_tray(config, state, sensors, actuators);
        }
    }

    fn step_hanger<S, A>(
        &self,
        config: &HangerConfig,
        state: &mut BoardState,
        sensors: &mut S,
        actuators: &mut A,
    ) where
        S: Sensors + ?Sized,
        A: Actuators + ?Sized,
    {
        let Some(hanger) = state.hanger_mut() else {
            return;
        };
        let speed = config.interlock().clamp(hanger.goal, sensors);
        if speed != hanger.current {
            debug!(goal = hanger.goal, current = speed, "hanger speed changed");
        }
        hanger.current = speed;
        let speed = if config.inverted { -speed } else { speed };
        self.write(state, actuators, config.motor_port, speed);
    }

    fn step_tray<S, A>(
        &self,
        config: &TrayConfig,
        state: &mut BoardState,
        sensors: &mut S,
        actuators: &mut A,
    ) where
        S: Sensors + ?Sized,
        A: Actuators + ?Sized,
    {
        let lit = sensors.slit_lit(config.slit);
        let home = sensors.limit_switch(config.home_limit);
        let Some(tray) = state.tray_mut() else {
            return;
        };
        track_tray(tray, config, lit, home);

        let speed = if tray.held {
            0
        } else {
            match tray.position.cmp(&tray.goal) {
                Ordering::Less => config.speed,
                Ordering::Greater => -config.speed,
                Ordering::Equal => 0,
            }
        };
        self.write(state, actuators, config.motor_port, speed);
    }

    fn write<A: Actuators + ?Sized>(
        &self,
        state: &mut BoardState,
        actuators: &mut A,
        port: usize,
        speed: i32,
    ) {
        let duty = self.mapping.duty(speed);
        actuators.set_drive(port, duty);
        state.record_drive(port, duty);
    }
}

/// Count one slit edge and handle the home switch.
fn track_tray(tray: &mut TrayState, config: &TrayConfig, lit: bool, home: bool) {
    let was_lit = std::mem::replace(&mut tray.slit_lit, lit);
    match tray.phase {
        TrayPhase::Loading => {
            if lit && !was_lit {
                tray.position += 1;
            }
            if home {
                info!(position = config.home_point, "tray homed");
                tray.position = config.home_point;
                tray.goal = 0;
                tray.phase = TrayPhase::Returning;
            }
        }
        TrayPhase::Returning => {
            if was_lit && !lit {
                tray.position -= 1;
            }
            if tray.position == 0 {
                tray.phase = TrayPhase::Loading;
            }
        }
    }
}
