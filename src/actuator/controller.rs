use crate::config::AxisPidConfig;

/// Weight of the previous filtered derivative in the derivative low-pass.
const DERIVATIVE_SMOOTHING: f32 = 0.8;

const DEFAULT_OUTPUT_LIMIT: f32 = 90.0;
const DEFAULT_INTEGRAL_LIMIT: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Contributions of the last `compute` call, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

/// Single-axis PID with clamped integrator and low-pass filtered derivative.
///
/// A non-positive or non-finite `dt` only refreshes the proportional term:
/// the integrator, derivative filter and previous error are left as they
/// were, and the output reuses the stored I and D contributions.
#[derive(Debug, Clone)]
pub struct PidController {
    // Gains
    kp: f32,
    ki: f32,
    kd: f32,

    // Limits
    output_min: f32,
    output_max: f32,
    integral_min: f32,
    integral_max: f32,

    // State
    integral: f32,
    prev_error: f32,
    prev_derivative: f32,
    terms: PidTerms,
    last_output: f32,
    first_run: bool,
}

impl PidController {
    /// Non-finite output limits fall back to ±90.
    pub fn new(kp: f32, ki: f32, kd: f32, output_min: f32, output_max: f32) -> Self {
        let (output_min, output_max) = finite_bounds(output_min, output_max).unwrap_or_else(|| {
            log::warn!("[PID] Non-finite output limits, using ±{}", DEFAULT_OUTPUT_LIMIT);
            (-DEFAULT_OUTPUT_LIMIT, DEFAULT_OUTPUT_LIMIT)
        });
        Self {
            kp,
            ki,
            kd,
            output_min,
            output_max,
            integral_min: -DEFAULT_INTEGRAL_LIMIT,
            integral_max: DEFAULT_INTEGRAL_LIMIT,
            integral: 0.0,
            prev_error: 0.0,
            prev_derivative: 0.0,
            terms: PidTerms::default(),
            last_output: 0.0,
            first_run: true,
        }
    }

    pub fn from_config(cfg: &AxisPidConfig) -> Self {
        let mut pid = Self::new(cfg.kp, cfg.ki, cfg.kd, cfg.output_min, cfg.output_max);
        match finite_bounds(cfg.integral_min, cfg.integral_max) {
            Some((min, max)) => {
                pid.integral_min = min;
                pid.integral_max = max;
            }
            None => log::warn!("[PID] Non-finite integral limits, using ±{}", DEFAULT_INTEGRAL_LIMIT),
        }
        pid
    }

    pub fn compute(&mut self, setpoint: f32, measurement: f32, dt: f32) -> f32 {
        let error = setpoint - measurement;
        self.terms.p = self.kp * error;

        if dt > 0.0 && dt.is_finite() {
            // Anti-windup: clamp the accumulator, not the output
            self.integral = (self.integral + error * dt).clamp(self.integral_min, self.integral_max);
            self.terms.i = self.ki * self.integral;

            if self.first_run {
                self.prev_derivative = 0.0;
                self.terms.d = 0.0;
            } else {
                let derivative = (error - self.prev_error) / dt;
                let filtered = DERIVATIVE_SMOOTHING * self.prev_derivative
                    + (1.0 - DERIVATIVE_SMOOTHING) * derivative;
                self.prev_derivative = filtered;
                self.terms.d = self.kd * filtered;
            }

            self.prev_error = error;
            self.first_run = false;
        } else {
            log::debug!("[PID] Ignoring non-positive dt {}", dt);
            self.terms.i = self.ki * self.integral;
            self.terms.d = if self.first_run { 0.0 } else { self.kd * self.prev_derivative };
        }

        let output = self.terms.p + self.terms.i + self.terms.d;
        self.last_output = clamp_finite(output, self.output_min, self.output_max);
        self.last_output
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.prev_derivative = 0.0;
        self.terms = PidTerms::default();
        self.last_output = 0.0;
        self.first_run = true;
    }

    /// Non-finite gains are refused and the current ones kept.
    pub fn set_gains(&mut self, kp: f32, ki: f32, kd: f32) {
        if !(kp.is_finite() && ki.is_finite() && kd.is_finite()) {
            log::warn!("[PID] Ignoring non-finite gains: Kp={}, Ki={}, Kd={}", kp, ki, kd);
            return;
        }
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        log::info!("[PID] Gains updated: Kp={:.3}, Ki={:.3}, Kd={:.3}", kp, ki, kd);
    }

    pub fn gains(&self) -> PidGains {
        PidGains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
        }
    }

    pub fn set_output_limits(&mut self, min: f32, max: f32) {
        let Some((min, max)) = finite_bounds(min, max) else {
            log::warn!("[PID] Ignoring non-finite output limits [{}, {}]", min, max);
            return;
        };
        self.output_min = min;
        self.output_max = max;
        self.last_output = clamp_finite(self.last_output, min, max);
        log::info!("[PID] Output limits: [{:.1}, {:.1}]", min, max);
    }

    pub fn set_integral_limits(&mut self, min: f32, max: f32) {
        let Some((min, max)) = finite_bounds(min, max) else {
            log::warn!("[PID] Ignoring non-finite integral limits [{}, {}]", min, max);
            return;
        };
        self.integral_min = min;
        self.integral_max = max;
        self.integral = self.integral.clamp(min, max);
        log::info!("[PID] Integral limits: [{:.1}, {:.1}]", min, max);
    }

    pub fn output_limits(&self) -> (f32, f32) {
        (self.output_min, self.output_max)
    }

    pub fn integral_limits(&self) -> (f32, f32) {
        (self.integral_min, self.integral_max)
    }

    pub fn terms(&self) -> PidTerms {
        self.terms
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn last_output(&self) -> f32 {
        self.last_output
    }
}

/// Orders a pair of bounds. `None` if either is NaN or infinite.
fn finite_bounds(a: f32, b: f32) -> Option<(f32, f32)> {
    if !(a.is_finite() && b.is_finite()) {
        return None;
    }
    Some(if a <= b { (a, b) } else { (b, a) })
}

// NaN from a bad gain must not escape the output range
fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0_f32.clamp(min, max)
    } else {
        value.clamp(min, max)
    }
}
