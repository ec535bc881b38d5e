// Runtime configuration, loaded from TOML with per-section defaults
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::scheduler::OverrunPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GimbalConfig {
    pub sensor: SensorConfig,
    pub filter: FilterConfig,
    pub pid: PidConfig,
    pub servo: ServoConfig,
    pub tasks: TaskConfig,
    pub link: LinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub sda_pin: u8,
    pub scl_pin: u8,
    pub i2c_frequency_hz: u32,
    pub calibration_samples: usize,
    pub calibration_sample_delay_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sda_pin: 21,
            scl_pin: 22,
            i2c_frequency_hz: 400_000,
            calibration_samples: 1000,
            calibration_sample_delay_ms: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Gyro trust weight of the complementary filter.
    pub alpha: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { alpha: 0.96 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub pitch: AxisPidConfig,
    pub roll: AxisPidConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AxisPidConfig {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub output_min: f32,
    pub output_max: f32,
    pub integral_min: f32,
    pub integral_max: f32,
}

impl Default for AxisPidConfig {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            output_min: -90.0,
            output_max: 90.0,
            integral_min: -10.0,
            integral_max: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub pitch_pin: u8,
    pub roll_pin: u8,
    pub frequency_hz: u32,
    pub resolution_bits: u8,
    pub min_angle: f32,
    pub max_angle: f32,
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            pitch_pin: 12,
            roll_pin: 13,
            frequency_hz: 50,
            resolution_bits: 16,
            min_angle: -90.0,
            max_angle: 90.0,
            min_pulse_us: 500,
            max_pulse_us: 2500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub sensor_period_ms: u64,
    pub control_period_ms: u64,
    pub telemetry_period_ms: u64,
    pub link_poll_ms: u64,
    pub sensor_lock_timeout_ms: u64,
    pub control_lock_timeout_ms: u64,
    pub telemetry_lock_timeout_ms: u64,
    pub overrun_policy: OverrunPolicy,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            sensor_period_ms: 10,
            control_period_ms: 20,
            telemetry_period_ms: 100,
            link_poll_ms: 2,
            sensor_lock_timeout_ms: 5,
            control_lock_timeout_ms: 5,
            telemetry_lock_timeout_ms: 10,
            overrun_policy: OverrunPolicy::CatchUp,
        }
    }
}

impl TaskConfig {
    pub fn sensor_period(&self) -> Duration {
        Duration::from_millis(self.sensor_period_ms)
    }

    pub fn control_period(&self) -> Duration {
        Duration::from_millis(self.control_period_ms)
    }

    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms)
    }

    pub fn link_poll(&self) -> Duration {
        Duration::from_millis(self.link_poll_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub heartbeat_interval_ms: u64,
    pub outbox_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 8887,
            path: "/esp32".to_string(),
            heartbeat_interval_ms: 10_000,
            outbox_capacity: 32,
        }
    }
}

impl GimbalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.filter.alpha) {
            return Err(ConfigError::Invalid(format!(
                "filter.alpha {} outside [0, 1]",
                self.filter.alpha
            )));
        }
        let periods = [
            ("tasks.sensor_period_ms", self.tasks.sensor_period_ms),
            ("tasks.control_period_ms", self.tasks.control_period_ms),
            ("tasks.telemetry_period_ms", self.tasks.telemetry_period_ms),
            ("tasks.link_poll_ms", self.tasks.link_poll_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        let (min_angle, max_angle) = (self.servo.min_angle, self.servo.max_angle);
        if !(min_angle.is_finite() && max_angle.is_finite() && min_angle < max_angle) {
            return Err(ConfigError::Invalid(format!(
                "servo angle range [{}, {}] is empty",
                self.servo.min_angle, self.servo.max_angle
            )));
        }
        if self.servo.min_pulse_us >= self.servo.max_pulse_us || self.servo.frequency_hz == 0 {
            return Err(ConfigError::Invalid("servo pulse range or frequency".to_string()));
        }
        if self.servo.resolution_bits == 0 || self.servo.resolution_bits > 20 {
            return Err(ConfigError::Invalid(format!(
                "servo.resolution_bits {} outside 1..=20",
                self.servo.resolution_bits
            )));
        }
        for (axis, pid) in [("pitch", &self.pid.pitch), ("roll", &self.pid.roll)] {
            let values = [
                pid.kp,
                pid.ki,
                pid.kd,
                pid.output_min,
                pid.output_max,
                pid.integral_min,
                pid.integral_max,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::Invalid(format!("pid.{} has a non-finite gain or limit", axis)));
            }
            if pid.output_min >= pid.output_max || pid.integral_min > pid.integral_max {
                return Err(ConfigError::Invalid(format!("pid.{} limits are inverted", axis)));
            }
        }
        if self.link.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid("link.heartbeat_interval_ms must be positive".to_string()));
        }
        if self.link.outbox_capacity == 0 {
            return Err(ConfigError::Invalid("link.outbox_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

pub fn parse_config(text: &str) -> Result<GimbalConfig, ConfigError> {
    let config: GimbalConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn read_config(path: impl AsRef<Path>) -> Result<GimbalConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Loads the config file, falling back to defaults when it is missing or invalid.
pub fn load_config(path: impl AsRef<Path>) -> GimbalConfig {
    let path = path.as_ref();
    match read_config(path) {
        Ok(config) => {
            log::info!("[CONFIG] Loaded {}", path.display());
            config
        }
        Err(err) => {
            log::warn!("[CONFIG] {} ({}), using defaults", err, path.display());
            GimbalConfig::default()
        }
    }
}
