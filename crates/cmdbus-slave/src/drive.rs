/// Linear map of `value` from one range onto another, clamping the input to
/// the source range first.
pub fn map_range(value: f32, from_low: f32, from_high: f32, to_low: f32, to_high: f32) -> f32 {
    let value = value.clamp(from_low, from_high);
    (value - from_low) * (to_high - to_low) / (from_high - from_low) + to_low
}

/// Converts a commanded motor speed into a signed PWM duty cycle.
///
/// Speeds span `[-max_pwm, max_pwm]`; duty spans `[-max_duty, max_duty]`.
/// The sign selects the bridge direction. Zero is exactly neutral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveMapping {
    pub max_pwm: i32,
    pub max_duty: f32,
}

impl Default for DriveMapping {
    fn default() -> Self {
        Self {
            max_pwm: 250,
            max_duty: 0.95,
        }
    }
}

impl DriveMapping {
    pub fn duty(&self, speed: i32) -> f32 {
        if speed == 0 {
            return 0.0;
        }
        let max = self.max_pwm as f32;
        map_range(speed as f32, -max, max, -self.max_duty, self.max_duty)
    }
}
