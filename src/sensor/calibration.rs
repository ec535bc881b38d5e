use std::thread;
use std::time::Duration;

use super::{BusConfig, SensorDriver, SensorSample, Vector3};
use crate::error::SensorError;

pub const STANDARD_GRAVITY: f32 = 9.81;

/// Per-axis bias subtracted from every raw sample once calibrated.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibrationOffsets {
    pub accel: Vector3,
    pub gyro: Vector3,
    pub calibrated: bool,
}

impl CalibrationOffsets {
    /// Averages `samples`; the unit must be level and stationary, so Z keeps
    /// one g of acceleration after correction.
    ///
    /// Fails when fewer than half of `requested` readings were valid.
    pub fn from_samples(samples: &[SensorSample], requested: usize) -> Result<Self, SensorError> {
        let valid = samples.len();
        if valid == 0 || valid < requested / 2 {
            return Err(SensorError::CalibrationFailed { valid, requested });
        }

        let mut accel = Vector3::ZERO;
        let mut gyro = Vector3::ZERO;
        for s in samples {
            accel.x += s.accel.x;
            accel.y += s.accel.y;
            accel.z += s.accel.z;
            gyro.x += s.gyro.x;
            gyro.y += s.gyro.y;
            gyro.z += s.gyro.z;
        }
        let n = valid as f32;

        Ok(Self {
            accel: Vector3::new(accel.x / n, accel.y / n, accel.z / n - STANDARD_GRAVITY),
            gyro: Vector3::new(gyro.x / n, gyro.y / n, gyro.z / n),
            calibrated: true,
        })
    }

    pub fn apply(&self, sample: SensorSample) -> SensorSample {
        if !self.calibrated {
            return sample;
        }
        SensorSample {
            accel: sample.accel - self.accel,
            gyro: sample.gyro - self.gyro,
            ..sample
        }
    }
}

/// Wraps a raw driver and hands out bias-corrected samples.
pub struct CalibratedSensor<D> {
    driver: D,
    offsets: CalibrationOffsets,
}

impl<D: SensorDriver> CalibratedSensor<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            offsets: CalibrationOffsets::default(),
        }
    }

    pub fn begin(&mut self, bus: &BusConfig) -> Result<(), SensorError> {
        self.driver.begin(bus)
    }

    pub fn read_calibrated_sample(&mut self) -> Result<SensorSample, SensorError> {
        let raw = self.driver.read_raw_sample()?;
        Ok(self.offsets.apply(raw))
    }

    /// Collects `samples` raw readings spaced by `spacing` and installs the
    /// resulting offsets. On failure the previous offsets are kept.
    pub fn calibrate(&mut self, samples: usize, spacing: Duration) -> Result<CalibrationOffsets, SensorError> {
        log::info!("[SENSOR] Starting calibration with {} samples", samples);
        let mut collected = Vec::with_capacity(samples);

        for i in 0..samples {
            match self.driver.read_raw_sample() {
                Ok(sample) => collected.push(sample),
                Err(err) => log::debug!("[SENSOR] Calibration sample {} dropped: {}", i, err),
            }
            if !spacing.is_zero() {
                thread::sleep(spacing);
            }
            if i % 100 == 0 {
                log::debug!("[SENSOR] Calibration progress {}/{}", i, samples);
            }
        }

        let offsets = CalibrationOffsets::from_samples(&collected, samples)?;
        self.offsets = offsets;
        log::info!(
            "[SENSOR] Calibration complete: accel ({:.4}, {:.4}, {:.4}) m/s^2, gyro ({:.4}, {:.4}, {:.4}) rad/s",
            offsets.accel.x,
            offsets.accel.y,
            offsets.accel.z,
            offsets.gyro.x,
            offsets.gyro.y,
            offsets.gyro.z
        );
        Ok(offsets)
    }

    pub fn offsets(&self) -> CalibrationOffsets {
        self.offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::simulated::SimulatedImu;

    fn sample(accel: Vector3, gyro: Vector3) -> SensorSample {
        SensorSample {
            accel,
            gyro,
            ..Default::default()
        }
    }

    #[test]
    fn averages_bias_and_keeps_gravity_on_z() {
        let samples = vec![
            sample(Vector3::new(0.2, -0.1, 9.91), Vector3::new(0.01, 0.02, -0.03)),
            sample(Vector3::new(0.4, -0.3, 10.11), Vector3::new(0.03, 0.04, -0.01)),
        ];
        let offsets = CalibrationOffsets::from_samples(&samples, 2).unwrap();
        assert!((offsets.accel.x - 0.3).abs() < 1e-5);
        assert!((offsets.accel.y + 0.2).abs() < 1e-5);
        assert!((offsets.accel.z - 0.2).abs() < 1e-4);
        assert!((offsets.gyro.z + 0.02).abs() < 1e-6);
        assert!(offsets.calibrated);
    }

    #[test]
    fn too_few_valid_samples_fail() {
        let samples = vec![sample(Vector3::ZERO, Vector3::ZERO); 4];
        let err = CalibrationOffsets::from_samples(&samples, 10).unwrap_err();
        assert_eq!(err, SensorError::CalibrationFailed { valid: 4, requested: 10 });
    }

    #[test]
    fn uncalibrated_offsets_pass_samples_through() {
        let raw = sample(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.1, 0.2, 0.3));
        assert_eq!(CalibrationOffsets::default().apply(raw), raw);
    }

    #[test]
    fn calibration_removes_simulated_bias() {
        let mut imu = SimulatedImu::new(7);
        imu.gyro_bias = Vector3::new(0.05, -0.02, 0.01);
        imu.accel_bias = Vector3::new(0.3, -0.2, 0.15);
        imu.noise_amplitude = 0.0;
        let mut sensor = CalibratedSensor::new(imu);
        sensor.begin(&BusConfig { sda_pin: 21, scl_pin: 22, frequency_hz: 400_000 }).unwrap();
        sensor.calibrate(50, Duration::ZERO).unwrap();

        let s = sensor.read_calibrated_sample().unwrap();
        assert!(s.gyro.x.abs() < 1e-4);
        assert!(s.accel.x.abs() < 1e-4);
        assert!((s.accel.z - STANDARD_GRAVITY).abs() < 1e-3);
    }

    #[test]
    fn failed_calibration_keeps_previous_offsets() {
        let mut imu = SimulatedImu::new(7);
        imu.fail_next_reads(100);
        let mut sensor = CalibratedSensor::new(imu);
        sensor.begin(&BusConfig { sda_pin: 21, scl_pin: 22, frequency_hz: 400_000 }).unwrap();
        assert!(sensor.calibrate(20, Duration::ZERO).is_err());
        assert!(!sensor.offsets().calibrated);
    }
}
