use crate::config::{BoardConfig, PortFunction};

/// Goal and current speed of a limit-switched hanger axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HangerState {
    /// Last speed requested by the master.
    pub goal: i32,
    /// Speed actually driven after interlocks, as of the last control step.
    pub current: i32,
}

/// Which slit edge moves the tray position, and in which direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrayPhase {
    /// Counting up on every dark-to-light edge until the home switch trips.
    #[default]
    Loading,
    /// Counting down on every light-to-dark edge until position 0.
    Returning,
}

/// Slit-counted position of a tray axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrayState {
    /// Target position requested by the master.
    pub goal: i32,
    /// Position counted from slit edges.
    pub position: i32,
    pub phase: TrayPhase,
    /// Slit reading from the previous control step.
    pub slit_lit: bool,
    /// Set by an emergency stop; the tray stays put until its next command.
    pub held: bool,
}

/// Per-board state shared by command handlers and the control step.
///
/// Handlers write goals here; the control step reads them, samples sensors
/// and writes outputs. Nothing else holds board state.
#[derive(Debug, Clone)]
pub struct BoardState {
    ports: Vec<PortFunction>,
    motor_goals: Vec<i32>,
    drives: Vec<f32>,
    encoder_counts: Vec<i32>,
    hanger: Option<HangerState>,
    tray: Option<TrayState>,
    emergency_stops: u64,
}

impl BoardState {
    pub fn new(config: &BoardConfig) -> Self {
        let n = config.ports.len();
        Self {
            ports: config.ports.clone(),
            motor_goals: vec![0; n],
            drives: vec![0.0; n],
            encoder_counts: vec![0; n],
            hanger: config.hanger.as_ref().map(|_| HangerState::default()),
            tray: config.tray.as_ref().map(|_| TrayState::default()),
            emergency_stops: 0,
        }
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub fn is_motor_port(&self, port: usize) -> bool {
        self.ports.get(port) == Some(&PortFunction::Motor)
    }

    /// Record a goal speed for a motor port. Returns `false` if `port` is not
    /// a motor port on this board.
    pub fn set_motor_goal(&mut self, port: usize, speed: i32) -> bool {
        if !self.is_motor_port(port) {
            return false;
        }
        self.motor_goals[port] = speed;
        true
    }

    pub fn motor_goal(&self, port: usize) -> i32 {
        self.motor_goals.get(port).copied().unwrap_or(0)
    }

    /// Duty written to `port` by the last control step.
    pub fn drive(&self, port: usize) -> f32 {
        self.drives.get(port).copied().unwrap_or(0.0)
    }

    pub fn drives(&self) -> &[f32] {
        &self.drives
    }

    pub(crate) fn record_drive(&mut self, port: usize, duty: f32) {
        if let Some(slot) = self.drives.get_mut(port) {
            *slot = duty;
        }
    }

    pub fn encoder_count(&self, port: usize) -> i32 {
        self.encoder_counts.get(port).copied().unwrap_or(0)
    }

    pub(crate) fn set_encoder_count(&mut self, port: usize, count: i32) {
        if let Some(slot) = self.encoder_counts.get_mut(port) {
            *slot = count;
        }
    }

    pub fn hanger(&self) -> Option<&HangerState> {
        self.hanger.as_ref()
    }

    pub fn hanger_mut(&mut self) -> Option<&mut HangerState> {
        self.hanger.as_mut()
    }

    pub fn tray(&self) -> Option<&TrayState> {
        self.tray.as_ref()
    }

    pub fn tray_mut(&mut self) -> Option<&mut TrayState> {
        self.tray.as_mut()
    }

    /// Clear every goal so the next control step drives all outputs to
    /// neutral.
    pub fn stop_all(&mut self) {
        self.motor_goals.iter_mut().for_each(|goal| *goal = 0);
        if let Some(hanger) = self.hanger.as_mut() {
            hanger.goal = 0;
        }
        if let Some(tray) = self.tray.as_mut() {
            tray.goal = tray.position;
            tray.held = true;
        }
        self.emergency_stops += 1;
    }

    /// Number of emergency stops handled since boot.
    pub fn emergency_stops(&self) -> u64 {
        self.emergency_stops
    }
}
