//! Seams between the control step and the hardware.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Motor outputs of a board.
pub trait Actuators: Send {
    /// Drive `port` at a signed duty in `[-1.0, 1.0]`. The sign selects the
    /// bridge direction.
    fn set_drive(&mut self, port: usize, duty: f32);

    /// Put every output into its neutral state.
    fn neutral_all(&mut self);
}

/// Inputs sampled by the control step.
pub trait Sensors: Send {
    /// Whether limit switch `id` is tripped. Pull-up polarity is the
    /// implementation's concern.
    fn limit_switch(&mut self, id: usize) -> bool;

    fn encoder_count(&mut self, port: usize) -> i32;

    /// Whether photo-interrupter `id` currently sees light through a slit.
    fn slit_lit(&mut self, id: usize) -> bool;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct OutputBank {
    drives: Vec<f32>,
    writes: u64,
    neutral_calls: u64,
}

/// In-memory actuators. Clones share the same outputs, so a test or a CLI
/// can keep a handle while the runtime owns another.
#[derive(Debug, Clone, Default)]
pub struct SimActuators {
    inner: Arc<Mutex<OutputBank>>,
}

impl SimActuators {
    pub fn new(ports: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputBank {
                drives: vec![0.0; ports],
                ..OutputBank::default()
            })),
        }
    }

    /// Last duty written to `port`.
    pub fn drive(&self, port: usize) -> f32 {
        lock(&self.inner).drives.get(port).copied().unwrap_or(0.0)
    }

    pub fn drives(&self) -> Vec<f32> {
        lock(&self.inner).drives.clone()
    }

    /// Whether every output is neutral.
    pub fn is_neutral(&self) -> bool {
        lock(&self.inner).drives.iter().all(|duty| *duty == 0.0)
    }

    /// Total `set_drive` calls.
    pub fn writes(&self) -> u64 {
        lock(&self.inner).writes
    }

    pub fn neutral_calls(&self) -> u64 {
        lock(&self.inner).neutral_calls
    }
}

impl Actuators for SimActuators {
    fn set_drive(&mut self, port: usize, duty: f32) {
        let mut bank = lock(&self.inner);
        if port >= bank.drives.len() {
            bank.drives.resize(port + 1, 0.0);
        }
        bank.drives[port] = duty;
        bank.writes += 1;
    }

    fn neutral_all(&mut self) {
        let mut bank = lock(&self.inner);
        bank.drives.iter_mut().for_each(|duty| *duty = 0.0);
        bank.neutral_calls += 1;
    }
}

#[derive(Debug, Default)]
struct InputBank {
    limits: BTreeMap<usize, bool>,
    encoders: BTreeMap<usize, i32>,
    slits: BTreeMap<usize, bool>,
}

/// In-memory sensors, settable through any clone.
#[derive(Debug, Clone, Default)]
pub struct SimSensors {
    inner: Arc<Mutex<InputBank>>,
}

impl SimSensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_limit_switch(&self, id: usize, tripped: bool) {
        lock(&self.inner).limits.insert(id, tripped);
    }

    pub fn set_encoder_count(&self, port: usize, count: i32) {
        lock(&self.inner).encoders.insert(port, count);
    }

    pub fn set_slit(&self, id: usize, lit: bool) {
        lock(&self.inner).slits.insert(id, lit);
    }
}

impl Sensors for SimSensors {
    fn limit_switch(&mut self, id: usize) -> bool {
        lock(&self.inner).limits.get(&id).copied().unwrap_or(false)
    }

    fn encoder_count(&mut self, port: usize) -> i32 {
        lock(&self.inner).encoders.get(&port).copied().unwrap_or(0)
    }

    fn slit_lit(&mut self, id: usize) -> bool {
        lock(&self.inner).slits.get(&id).copied().unwrap_or(false)
    }
}
