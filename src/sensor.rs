//! Sensor module - IMU samples, calibration and attitude estimation

pub mod calibration;
pub mod filter;
pub mod simulated;

use std::ops::Sub;

use crate::config::SensorConfig;
use crate::error::SensorError;

// ============================================================================
// SENSOR SAMPLE
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// One 6-axis reading from the IMU.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSample {
    /// m/s^2
    pub accel: Vector3,
    /// rad/s
    pub gyro: Vector3,
    /// degrees Celsius
    pub temperature: f32,
    pub timestamp_ms: u32,
}

// ============================================================================
// SENSOR DRIVER CAPABILITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub sda_pin: u8,
    pub scl_pin: u8,
    pub frequency_hz: u32,
}

impl From<&SensorConfig> for BusConfig {
    fn from(cfg: &SensorConfig) -> Self {
        Self {
            sda_pin: cfg.sda_pin,
            scl_pin: cfg.scl_pin,
            frequency_hz: cfg.i2c_frequency_hz,
        }
    }
}

/// Raw access to a 6-axis motion sensor. Bus bring-up and register
/// programming live behind this trait.
pub trait SensorDriver: Send {
    fn begin(&mut self, bus: &BusConfig) -> Result<(), SensorError>;

    fn read_raw_sample(&mut self) -> Result<SensorSample, SensorError>;
}

impl<T: SensorDriver + ?Sized> SensorDriver for Box<T> {
    fn begin(&mut self, bus: &BusConfig) -> Result<(), SensorError> {
        (**self).begin(bus)
    }

    fn read_raw_sample(&mut self) -> Result<SensorSample, SensorError> {
        (**self).read_raw_sample()
    }
}

pub use calibration::{CalibratedSensor, CalibrationOffsets};
pub use filter::{constrain_angle, AttitudeEstimate, ComplementaryFilter};
pub use simulated::SimulatedImu;
