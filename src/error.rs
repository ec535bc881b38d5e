//! Error types for the stabilization core.
//!
//! Every recoverable fault (sensor read, protocol validation, transport send)
//! has its own type so the tasks can decide locally whether to skip a cycle
//! or count an error. Only `BootError` is fatal.

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    NotInitialized,
    DeviceNotFound(String),
    ReadFailed(String),
    CalibrationFailed { valid: usize, requested: usize },
}

impl Display for SensorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::NotInitialized => write!(f, "sensor not initialized"),
            SensorError::DeviceNotFound(detail) => write!(f, "sensor not found: {}", detail),
            SensorError::ReadFailed(detail) => write!(f, "sensor read failed: {}", detail),
            SensorError::CalibrationFailed { valid, requested } => write!(
                f,
                "too many failed samples during calibration ({}/{} valid)",
                valid, requested
            ),
        }
    }
}

impl std::error::Error for SensorError {}

/// Reasons an inbound frame is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    TooShort { len: usize },
    BadMagic(u16),
    BadVersion(u8),
    UnknownType(u8),
    LengthMismatch { expected: usize, actual: usize },
    CrcMismatch { expected: u16, actual: u16 },
    InvalidAxis(u8),
    InvalidStatus(u8),
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::TooShort { len } => write!(f, "frame too short ({} bytes)", len),
            ProtocolError::BadMagic(magic) => write!(f, "bad magic 0x{:04X}", magic),
            ProtocolError::BadVersion(version) => write!(f, "unsupported version 0x{:02X}", version),
            ProtocolError::UnknownType(tag) => write!(f, "unknown message type 0x{:02X}", tag),
            ProtocolError::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch: expected {} bytes, got {}", expected, actual)
            }
            ProtocolError::CrcMismatch { expected, actual } => {
                write!(f, "crc mismatch: computed 0x{:04X}, received 0x{:04X}", expected, actual)
            }
            ProtocolError::InvalidAxis(axis) => write!(f, "invalid axis {}", axis),
            ProtocolError::InvalidStatus(status) => write!(f, "invalid system status {}", status),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    NotConnected,
    ConnectFailed(String),
    SendFailed(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "transport not connected"),
            TransportError::ConnectFailed(detail) => write!(f, "connect failed: {}", detail),
            TransportError::SendFailed(detail) => write!(f, "send failed: {}", detail),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorError {
    InvalidLimits { min: f32, max: f32 },
    InvalidTiming { frequency_hz: u32, resolution_bits: u8 },
    ChannelUnavailable(String),
}

impl Display for ActuatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::InvalidLimits { min, max } => {
                write!(f, "invalid servo limits [{}, {}]", min, max)
            }
            ActuatorError::InvalidTiming { frequency_hz, resolution_bits } => write!(
                f,
                "invalid pwm timing: {} Hz at {} bits (need a positive frequency and 1..=20 bits)",
                frequency_hz, resolution_bits
            ),
            ActuatorError::ChannelUnavailable(detail) => write!(f, "pwm channel unavailable: {}", detail),
        }
    }
}

impl std::error::Error for ActuatorError {}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {}", err),
            ConfigError::Parse(err) => write!(f, "cannot parse config: {}", err),
            ConfigError::Invalid(detail) => write!(f, "invalid config: {}", detail),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Faults that stop the system before any task runs.
#[derive(Debug)]
pub enum BootError {
    Sensor(SensorError),
    Actuator(ActuatorError),
    Spawn { task: &'static str, source: std::io::Error },
}

impl Display for BootError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Sensor(err) => write!(f, "sensor initialization failed: {}", err),
            BootError::Actuator(err) => write!(f, "actuator initialization failed: {}", err),
            BootError::Spawn { task, source } => write!(f, "failed to spawn {} task: {}", task, source),
        }
    }
}

impl std::error::Error for BootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootError::Sensor(err) => Some(err),
            BootError::Actuator(err) => Some(err),
            BootError::Spawn { source, .. } => Some(source),
        }
    }
}

impl From<SensorError> for BootError {
    fn from(err: SensorError) -> Self {
        BootError::Sensor(err)
    }
}

impl From<ActuatorError> for BootError {
    fn from(err: ActuatorError) -> Self {
        BootError::Actuator(err)
    }
}
