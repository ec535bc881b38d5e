//! Actuator module - per-axis PID control and servo output

pub mod controller;
pub mod servo;

use std::fmt;

// ============================================================================
// AXIS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Pitch = 0,
    Roll = 1,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Pitch, Axis::Roll];

    pub fn from_wire(value: u8) -> Option<Axis> {
        match value {
            0 => Some(Axis::Pitch),
            1 => Some(Axis::Roll),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Pitch => write!(f, "PITCH"),
            Axis::Roll => write!(f, "ROLL"),
        }
    }
}

// ============================================================================
// SERVO COMMAND
// ============================================================================

/// Angles actually applied to the servos, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServoCommand {
    pub pitch: f32,
    pub roll: f32,
}

impl ServoCommand {
    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Roll => self.roll,
        }
    }

    pub fn set(&mut self, axis: Axis, degrees: f32) {
        match axis {
            Axis::Pitch => self.pitch = degrees,
            Axis::Roll => self.roll = degrees,
        }
    }
}

pub use controller::{PidController, PidGains, PidTerms};
pub use servo::{PwmWriter, RecordingPwm, ServoActuator, ServoController, ServoLimits};
