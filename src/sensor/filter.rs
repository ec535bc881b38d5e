// Complementary filter: gyro integration blended with accelerometer tilt
use std::f32::consts::{PI, TAU};

use super::{SensorSample, Vector3};

pub const DEFAULT_ALPHA: f32 = 0.96;

/// Orientation in radians, every angle within (-pi, pi].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttitudeEstimate {
    pub pitch: f32,
    pub roll: f32,
    /// Pure gyro integration; drifts.
    pub yaw: f32,
    pub timestamp_ms: u32,
}

impl AttitudeEstimate {
    pub fn pitch_deg(&self) -> f32 {
        self.pitch.to_degrees()
    }

    pub fn roll_deg(&self) -> f32 {
        self.roll.to_degrees()
    }

    pub fn yaw_deg(&self) -> f32 {
        self.yaw.to_degrees()
    }
}

/// Wraps `angle` into (-pi, pi]. Non-finite input maps to 0.
pub fn constrain_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle;
    if a.abs() > 4.0 * PI {
        a %= TAU;
    }
    while a > PI {
        a -= TAU;
    }
    while a <= -PI {
        a += TAU;
    }
    a
}

/// Gravity-referenced (pitch, roll) from an acceleration vector.
pub fn accel_angles(accel: Vector3) -> (f32, f32) {
    let pitch = (-accel.x).atan2((accel.y * accel.y + accel.z * accel.z).sqrt());
    let roll = accel.y.atan2(accel.z);
    (pitch, roll)
}

pub struct ComplementaryFilter {
    alpha: f32,
    attitude: AttitudeEstimate,
}

impl ComplementaryFilter {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            attitude: AttitudeEstimate::default(),
        }
    }

    /// Fuses one gyro/accel pair. `dt` is the measured interval in seconds.
    pub fn update(&mut self, gyro: Vector3, accel: Vector3, dt: f32) -> AttitudeEstimate {
        let gyro_pitch = gyro.x * dt;
        let gyro_roll = gyro.y * dt;
        let gyro_yaw = gyro.z * dt;

        let (accel_pitch, accel_roll) = accel_angles(accel);

        let a = self.alpha;
        let pitch = a * (self.attitude.pitch + gyro_pitch) + (1.0 - a) * accel_pitch;
        let roll = a * (self.attitude.roll + gyro_roll) + (1.0 - a) * accel_roll;
        let yaw = self.attitude.yaw + gyro_yaw;

        self.attitude.pitch = constrain_angle(pitch);
        self.attitude.roll = constrain_angle(roll);
        self.attitude.yaw = constrain_angle(yaw);
        self.attitude
    }

    pub fn update_sample(&mut self, sample: &SensorSample, dt: f32) -> AttitudeEstimate {
        self.attitude.timestamp_ms = sample.timestamp_ms;
        self.update(sample.gyro, sample.accel, dt)
    }

    pub fn attitude(&self) -> AttitudeEstimate {
        self.attitude
    }

    pub fn reset(&mut self) {
        self.attitude.pitch = 0.0;
        self.attitude.roll = 0.0;
        self.attitude.yaw = 0.0;
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = if alpha.is_nan() { DEFAULT_ALPHA } else { alpha.clamp(0.0, 1.0) };
        log::info!("[FILTER] Alpha set to {:.3}", self.alpha);
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for ComplementaryFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn level() -> Vector3 {
        Vector3::new(0.0, 0.0, 9.81)
    }

    #[test]
    fn constrain_angle_range_and_idempotence() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10_000 {
            let x: f32 = rng.gen_range(-1000.0..1000.0);
            let c = constrain_angle(x);
            assert!(c > -PI && c <= PI, "{} -> {}", x, c);
            assert_eq!(constrain_angle(c), c);
        }
        assert_eq!(constrain_angle(PI), PI);
        assert_eq!(constrain_angle(-PI), PI);
        assert_eq!(constrain_angle(0.5), 0.5);
        assert_eq!(constrain_angle(f32::NAN), 0.0);
    }

    #[test]
    fn fused_angle_lies_between_gyro_and_accel_estimates() {
        let tilt = 0.4_f32;
        let accel = Vector3::new(-9.81 * tilt.sin(), 0.0, 9.81 * tilt.cos());
        let gyro = Vector3::new(0.5, 0.0, 0.0);
        let dt = 0.01;

        for step in 0..=20 {
            let alpha = step as f32 / 20.0;
            let mut filter = ComplementaryFilter::new(alpha);
            let out = filter.update(gyro, accel, dt);
            let gyro_only = 0.5 * dt;
            let (lo, hi) = (gyro_only.min(tilt), gyro_only.max(tilt));
            assert!(out.pitch >= lo - 1e-6 && out.pitch <= hi + 1e-6, "alpha {}", alpha);
        }

        let mut pure_gyro = ComplementaryFilter::new(1.0);
        assert!((pure_gyro.update(gyro, accel, dt).pitch - 0.005).abs() < 1e-6);
        let mut pure_accel = ComplementaryFilter::new(0.0);
        assert!((pure_accel.update(gyro, accel, dt).pitch - tilt).abs() < 1e-5);
    }

    #[test]
    fn converges_to_accelerometer_tilt() {
        let roll = -0.3_f32;
        let accel = Vector3::new(0.0, 9.81 * roll.sin(), 9.81 * roll.cos());
        let mut filter = ComplementaryFilter::default();
        for _ in 0..500 {
            filter.update(Vector3::ZERO, accel, 0.01);
        }
        assert!((filter.attitude().roll - roll).abs() < 1e-3);
    }

    #[test]
    fn yaw_integrates_and_wraps() {
        let mut filter = ComplementaryFilter::default();
        let gyro = Vector3::new(0.0, 0.0, 1.0);
        for _ in 0..400 {
            filter.update(gyro, level(), 0.01);
        }
        let yaw = filter.attitude().yaw;
        assert!((yaw - (4.0 - TAU)).abs() < 1e-3, "yaw {}", yaw);
    }

    #[test]
    fn reset_and_alpha_clamp() {
        let mut filter = ComplementaryFilter::new(2.0);
        assert_eq!(filter.alpha(), 1.0);
        filter.set_alpha(-0.5);
        assert_eq!(filter.alpha(), 0.0);
        filter.update(Vector3::new(1.0, 1.0, 1.0), Vector3::new(1.0, 1.0, 9.0), 0.1);
        filter.reset();
        let a = filter.attitude();
        assert_eq!((a.pitch, a.roll, a.yaw), (0.0, 0.0, 0.0));
    }
}
