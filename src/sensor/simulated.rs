use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::calibration::STANDARD_GRAVITY;
use super::{BusConfig, SensorDriver, SensorSample, Vector3};
use crate::clock::Uptime;
use crate::error::SensorError;

/// Host stand-in for the MPU6050: a rigid body at a fixed tilt, with
/// constant bias, uniform noise and injectable read failures.
pub struct SimulatedImu {
    rng: StdRng,
    uptime: Uptime,
    initialized: bool,
    sequence_counter: u64,
    failures_pending: u32,
    pub present: bool,
    /// True tilt in radians.
    pub pitch: f32,
    pub roll: f32,
    /// True angular rate in rad/s (x = pitch, y = roll, z = yaw).
    pub rotation_rate: Vector3,
    pub accel_bias: Vector3,
    pub gyro_bias: Vector3,
    pub noise_amplitude: f32,
    pub temperature: f32,
}

impl SimulatedImu {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            uptime: Uptime::start(),
            initialized: false,
            sequence_counter: 0,
            failures_pending: 0,
            present: true,
            pitch: 0.0,
            roll: 0.0,
            rotation_rate: Vector3::ZERO,
            accel_bias: Vector3::new(0.12, -0.08, 0.2),
            gyro_bias: Vector3::new(0.015, -0.01, 0.005),
            noise_amplitude: 0.02,
            temperature: 25.0,
        }
    }

    pub fn with_uptime(mut self, uptime: Uptime) -> Self {
        self.uptime = uptime;
        self
    }

    /// Tilts the simulated body by the given deltas (radians).
    pub fn inject_disturbance(&mut self, pitch_delta: f32, roll_delta: f32) {
        self.pitch += pitch_delta;
        self.roll += roll_delta;
    }

    /// The next `count` reads return an error.
    pub fn fail_next_reads(&mut self, count: u32) {
        self.failures_pending = count;
    }

    pub fn get_sequence(&self) -> u64 {
        self.sequence_counter
    }

    fn noise(&mut self) -> f32 {
        if self.noise_amplitude > 0.0 {
            self.rng.gen_range(-self.noise_amplitude..self.noise_amplitude)
        } else {
            0.0
        }
    }

    fn gravity(&self) -> Vector3 {
        Vector3::new(
            -STANDARD_GRAVITY * self.pitch.sin(),
            STANDARD_GRAVITY * self.pitch.cos() * self.roll.sin(),
            STANDARD_GRAVITY * self.pitch.cos() * self.roll.cos(),
        )
    }
}

impl SensorDriver for SimulatedImu {
    fn begin(&mut self, bus: &BusConfig) -> Result<(), SensorError> {
        if !self.present {
            return Err(SensorError::DeviceNotFound(format!(
                "no MPU6050 on sda={} scl={}",
                bus.sda_pin, bus.scl_pin
            )));
        }
        self.initialized = true;
        log::info!(
            "[SENSOR] Simulated IMU initialized (sda={}, scl={}, {} Hz)",
            bus.sda_pin,
            bus.scl_pin,
            bus.frequency_hz
        );
        Ok(())
    }

    fn read_raw_sample(&mut self) -> Result<SensorSample, SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(SensorError::ReadFailed("i2c transaction timed out".to_string()));
        }

        self.sequence_counter += 1;
        let g = self.gravity();
        let accel = Vector3::new(
            g.x + self.accel_bias.x + self.noise(),
            g.y + self.accel_bias.y + self.noise(),
            g.z + self.accel_bias.z + self.noise(),
        );
        let gyro = Vector3::new(
            self.rotation_rate.x + self.gyro_bias.x + self.noise(),
            self.rotation_rate.y + self.gyro_bias.y + self.noise(),
            self.rotation_rate.z + self.gyro_bias.z + self.noise(),
        );

        Ok(SensorSample {
            accel,
            gyro,
            temperature: self.temperature,
            timestamp_ms: self.uptime.millis(),
        })
    }
}
