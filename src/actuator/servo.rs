use std::sync::Arc;

use parking_lot::Mutex;

use super::{Axis, ServoCommand};
use crate::config::ServoConfig;
use crate::error::ActuatorError;

/// Hardware PWM channel access (LEDC on the target board).
pub trait PwmWriter: Send {
    fn attach(&mut self, axis: Axis, pin: u8, frequency_hz: u32, resolution_bits: u8) -> Result<(), ActuatorError>;

    fn write_duty(&mut self, axis: Axis, duty: u32);
}

/// Positions the two gimbal servos. Returns the angle actually applied
/// after clamping.
pub trait ServoActuator: Send {
    fn begin(&mut self) -> Result<(), ActuatorError>;

    fn set_angle(&mut self, axis: Axis, degrees: f32) -> f32;

    fn angle(&self, axis: Axis) -> f32;

    fn command(&self) -> ServoCommand {
        ServoCommand {
            pitch: self.angle(Axis::Pitch),
            roll: self.angle(Axis::Roll),
        }
    }

    fn center(&mut self) {
        self.set_angle(Axis::Pitch, 0.0);
        self.set_angle(Axis::Roll, 0.0);
    }
}

impl<T: ServoActuator + ?Sized> ServoActuator for Box<T> {
    fn begin(&mut self) -> Result<(), ActuatorError> {
        (**self).begin()
    }

    fn set_angle(&mut self, axis: Axis, degrees: f32) -> f32 {
        (**self).set_angle(axis, degrees)
    }

    fn angle(&self, axis: Axis) -> f32 {
        (**self).angle(axis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoLimits {
    pub min_angle: f32,
    pub max_angle: f32,
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    pub frequency_hz: u32,
    pub resolution_bits: u8,
}

impl ServoLimits {
    pub fn clamp(&self, degrees: f32) -> f32 {
        if degrees.is_nan() {
            return 0.0_f32.clamp(self.min_angle, self.max_angle);
        }
        degrees.clamp(self.min_angle, self.max_angle)
    }

    pub fn pulse_us(&self, degrees: f32) -> f32 {
        let normalized = (self.clamp(degrees) - self.min_angle) / (self.max_angle - self.min_angle);
        self.min_pulse_us as f32 + normalized * (self.max_pulse_us - self.min_pulse_us) as f32
    }

    /// Duty cycle register value for `degrees` at the configured frequency.
    pub fn angle_to_duty(&self, degrees: f32) -> u32 {
        let period_us = 1_000_000.0 / self.frequency_hz as f32;
        let max_duty = ((1u32 << self.resolution_bits) - 1) as f32;
        (self.pulse_us(degrees) / period_us * max_duty) as u32
    }
}

impl From<&ServoConfig> for ServoLimits {
    fn from(cfg: &ServoConfig) -> Self {
        Self {
            min_angle: cfg.min_angle,
            max_angle: cfg.max_angle,
            min_pulse_us: cfg.min_pulse_us,
            max_pulse_us: cfg.max_pulse_us,
            frequency_hz: cfg.frequency_hz,
            resolution_bits: cfg.resolution_bits,
        }
    }
}

pub struct ServoController<W> {
    writer: W,
    limits: ServoLimits,
    pins: [u8; 2],
    current: ServoCommand,
    initialized: bool,
}

impl<W: PwmWriter> ServoController<W> {
    pub fn new(writer: W, cfg: &ServoConfig) -> Self {
        Self {
            writer,
            limits: ServoLimits::from(cfg),
            pins: [cfg.pitch_pin, cfg.roll_pin],
            current: ServoCommand::default(),
            initialized: false,
        }
    }

    pub fn limits(&self) -> ServoLimits {
        self.limits
    }

    /// Narrows or widens the angle range at runtime. Angles already
    /// commanded are not re-clamped until the next write.
    pub fn set_angle_limits(&mut self, min: f32, max: f32) -> Result<(), ActuatorError> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(ActuatorError::InvalidLimits { min, max });
        }
        self.limits.min_angle = min;
        self.limits.max_angle = max;
        log::info!("[SERVO] Angle limits: [{:.1}, {:.1}] degrees", min, max);
        Ok(())
    }
}

impl<W: PwmWriter> ServoActuator for ServoController<W> {
    fn begin(&mut self) -> Result<(), ActuatorError> {
        let l = self.limits;
        if !(l.min_angle.is_finite() && l.max_angle.is_finite() && l.min_angle < l.max_angle)
            || l.min_pulse_us >= l.max_pulse_us
        {
            return Err(ActuatorError::InvalidLimits { min: l.min_angle, max: l.max_angle });
        }
        if l.frequency_hz == 0 || !(1..=20).contains(&l.resolution_bits) {
            return Err(ActuatorError::InvalidTiming {
                frequency_hz: l.frequency_hz,
                resolution_bits: l.resolution_bits,
            });
        }
        log::info!(
            "[SERVO] Initializing on pins: pitch={}, roll={}, {} Hz",
            self.pins[0],
            self.pins[1],
            l.frequency_hz
        );
        for axis in Axis::ALL {
            self.writer
                .attach(axis, self.pins[axis.index()], l.frequency_hz, l.resolution_bits)?;
        }
        self.initialized = true;
        self.center();
        Ok(())
    }

    fn set_angle(&mut self, axis: Axis, degrees: f32) -> f32 {
        if !self.initialized {
            log::error!("[SERVO] {} write before initialization", axis);
            return self.current.get(axis);
        }
        let angle = self.limits.clamp(degrees);
        self.writer.write_duty(axis, self.limits.angle_to_duty(angle));
        self.current.set(axis, angle);
        angle
    }

    fn angle(&self, axis: Axis) -> f32 {
        self.current.get(axis)
    }
}

// ============================================================================
// RECORDING PWM - Simulated LEDC channels
// ============================================================================

#[derive(Debug, Default)]
struct PwmLog {
    attached: [bool; 2],
    duty: [u32; 2],
    writes: u64,
}

/// PWM sink that remembers the last duty per axis. Clones share state, so a
/// test can keep one handle while the control task owns the other.
#[derive(Clone, Default)]
pub struct RecordingPwm {
    log: Arc<Mutex<PwmLog>>,
    pub fail_attach: bool,
}

impl RecordingPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duty(&self, axis: Axis) -> u32 {
        self.log.lock().duty[axis.index()]
    }

    pub fn is_attached(&self, axis: Axis) -> bool {
        self.log.lock().attached[axis.index()]
    }

    pub fn writes(&self) -> u64 {
        self.log.lock().writes
    }
}

impl PwmWriter for RecordingPwm {
    fn attach(&mut self, axis: Axis, pin: u8, _frequency_hz: u32, _resolution_bits: u8) -> Result<(), ActuatorError> {
        if self.fail_attach {
            return Err(ActuatorError::ChannelUnavailable(format!("{} servo on pin {}", axis, pin)));
        }
        self.log.lock().attached[axis.index()] = true;
        Ok(())
    }

    fn write_duty(&mut self, axis: Axis, duty: u32) {
        let mut log = self.log.lock();
        log.duty[axis.index()] = duty;
        log.writes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servo() -> (ServoController<RecordingPwm>, RecordingPwm) {
        let pwm = RecordingPwm::new();
        let mut ctl = ServoController::new(pwm.clone(), &ServoConfig::default());
        ctl.begin().unwrap();
        (ctl, pwm)
    }

    #[test]
    fn begin_attaches_and_centers() {
        let (ctl, pwm) = servo();
        assert!(pwm.is_attached(Axis::Pitch) && pwm.is_attached(Axis::Roll));
        assert_eq!(ctl.command(), ServoCommand::default());
        // 1500us of a 20ms period at 16 bits
        assert_eq!(pwm.duty(Axis::Pitch), 4915);
    }

    #[test]
    fn clamps_to_configured_range() {
        let (mut ctl, pwm) = servo();
        assert_eq!(ctl.set_angle(Axis::Roll, 120.0), 90.0);
        assert_eq!(ctl.angle(Axis::Roll), 90.0);
        assert_eq!(pwm.duty(Axis::Roll), ServoLimits::from(&ServoConfig::default()).angle_to_duty(90.0));
        assert_eq!(ctl.set_angle(Axis::Pitch, -135.0), -90.0);
        assert_eq!(ctl.set_angle(Axis::Pitch, f32::NAN), 0.0);
    }

    #[test]
    fn angle_limits_change_at_runtime() {
        let (mut ctl, _pwm) = servo();
        ctl.set_angle_limits(-30.0, 45.0).unwrap();
        assert_eq!(ctl.set_angle(Axis::Pitch, 60.0), 45.0);
        assert_eq!(ctl.set_angle(Axis::Roll, -60.0), -30.0);

        let err = ctl.set_angle_limits(20.0, 10.0).unwrap_err();
        assert!(matches!(err, ActuatorError::InvalidLimits { .. }));
        assert!(ctl.set_angle_limits(f32::NAN, 10.0).is_err());
        assert_eq!(ctl.limits().min_angle, -30.0);
        assert_eq!(ctl.limits().max_angle, 45.0);
    }

    #[test]
    fn begin_rejects_bad_pwm_timing() {
        for cfg in [
            ServoConfig { frequency_hz: 0, ..ServoConfig::default() },
            ServoConfig { resolution_bits: 0, ..ServoConfig::default() },
            ServoConfig { resolution_bits: 32, ..ServoConfig::default() },
        ] {
            let pwm = RecordingPwm::new();
            let mut ctl = ServoController::new(pwm.clone(), &cfg);
            let err = ctl.begin().unwrap_err();
            assert!(matches!(err, ActuatorError::InvalidTiming { .. }), "{:?}", cfg);
            assert!(!pwm.is_attached(Axis::Pitch));
        }
    }

    #[test]
    fn pulse_width_spans_range() {
        let limits = ServoLimits::from(&ServoConfig::default());
        assert_eq!(limits.pulse_us(-90.0), 500.0);
        assert_eq!(limits.pulse_us(90.0), 2500.0);
        assert!(limits.angle_to_duty(-90.0) < limits.angle_to_duty(90.0));
    }

    #[test]
    fn writes_before_begin_are_ignored() {
        let pwm = RecordingPwm::new();
        let mut ctl = ServoController::new(pwm.clone(), &ServoConfig::default());
        assert_eq!(ctl.set_angle(Axis::Pitch, 30.0), 0.0);
        assert_eq!(pwm.writes(), 0);
    }

    #[test]
    fn attach_failure_is_reported() {
        let mut pwm = RecordingPwm::new();
        pwm.fail_attach = true;
        let mut ctl = ServoController::new(pwm, &ServoConfig::default());
        assert!(matches!(ctl.begin(), Err(ActuatorError::ChannelUnavailable(_))));
    }
}
