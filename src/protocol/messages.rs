//! Fixed-layout payloads. Reserved bytes are written as zero and ignored
//! on decode.

use byteorder::{ByteOrder, LittleEndian};

use super::{CONTROL_PAYLOAD_SIZE, HEARTBEAT_PAYLOAD_SIZE, PID_UPDATE_PAYLOAD_SIZE, TELEMETRY_PAYLOAD_SIZE};
use crate::actuator::Axis;
use crate::error::ProtocolError;

fn expect_len(payload: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if payload.len() != expected {
        return Err(ProtocolError::LengthMismatch {
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

// ============================================================================
// TELEMETRY (gimbal -> ground)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryFrame {
    pub timestamp_ms: u32,
    /// degrees
    pub pitch: f32,
    pub roll: f32,
    pub yaw: f32,
    pub servo_pitch: f32,
    pub servo_roll: f32,
    pub free_heap: u32,
    /// 0-100 %, or `CPU_LOAD_UNAVAILABLE`
    pub cpu_load: u8,
    /// dBm
    pub rssi: i8,
    pub task_errors: u8,
    pub loop_count: u32,
}

impl TelemetryFrame {
    pub fn encode_payload(&self) -> [u8; TELEMETRY_PAYLOAD_SIZE] {
        let mut buf = [0u8; TELEMETRY_PAYLOAD_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.timestamp_ms);
        LittleEndian::write_f32(&mut buf[4..8], self.pitch);
        LittleEndian::write_f32(&mut buf[8..12], self.roll);
        LittleEndian::write_f32(&mut buf[12..16], self.yaw);
        LittleEndian::write_f32(&mut buf[16..20], self.servo_pitch);
        LittleEndian::write_f32(&mut buf[20..24], self.servo_roll);
        LittleEndian::write_u32(&mut buf[24..28], self.free_heap);
        buf[28] = self.cpu_load;
        buf[29] = self.rssi as u8;
        buf[30] = self.task_errors;
        LittleEndian::write_u32(&mut buf[32..36], self.loop_count);
        buf
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(payload, TELEMETRY_PAYLOAD_SIZE)?;
        Ok(Self {
            timestamp_ms: LittleEndian::read_u32(&payload[0..4]),
            pitch: LittleEndian::read_f32(&payload[4..8]),
            roll: LittleEndian::read_f32(&payload[8..12]),
            yaw: LittleEndian::read_f32(&payload[12..16]),
            servo_pitch: LittleEndian::read_f32(&payload[16..20]),
            servo_roll: LittleEndian::read_f32(&payload[20..24]),
            free_heap: LittleEndian::read_u32(&payload[24..28]),
            cpu_load: payload[28],
            rssi: payload[29] as i8,
            task_errors: payload[30],
            loop_count: LittleEndian::read_u32(&payload[32..36]),
        })
    }
}

// ============================================================================
// CONTROL (ground -> gimbal)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlCommand {
    /// degrees
    pub target_pitch: f32,
    pub target_roll: f32,
}

impl ControlCommand {
    pub fn encode_payload(&self) -> [u8; CONTROL_PAYLOAD_SIZE] {
        let mut buf = [0u8; CONTROL_PAYLOAD_SIZE];
        LittleEndian::write_f32(&mut buf[0..4], self.target_pitch);
        LittleEndian::write_f32(&mut buf[4..8], self.target_roll);
        buf
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(payload, CONTROL_PAYLOAD_SIZE)?;
        Ok(Self {
            target_pitch: LittleEndian::read_f32(&payload[0..4]),
            target_roll: LittleEndian::read_f32(&payload[4..8]),
        })
    }
}

// ============================================================================
// PID UPDATE (ground -> gimbal)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidUpdateCommand {
    pub axis: Axis,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub integral_min: f32,
    pub integral_max: f32,
}

impl PidUpdateCommand {
    pub fn encode_payload(&self) -> [u8; PID_UPDATE_PAYLOAD_SIZE] {
        let mut buf = [0u8; PID_UPDATE_PAYLOAD_SIZE];
        buf[0] = self.axis.to_wire();
        LittleEndian::write_f32(&mut buf[4..8], self.kp);
        LittleEndian::write_f32(&mut buf[8..12], self.ki);
        LittleEndian::write_f32(&mut buf[12..16], self.kd);
        LittleEndian::write_f32(&mut buf[16..20], self.integral_min);
        LittleEndian::write_f32(&mut buf[20..24], self.integral_max);
        buf
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(payload, PID_UPDATE_PAYLOAD_SIZE)?;
        let axis = Axis::from_wire(payload[0]).ok_or(ProtocolError::InvalidAxis(payload[0]))?;
        Ok(Self {
            axis,
            kp: LittleEndian::read_f32(&payload[4..8]),
            ki: LittleEndian::read_f32(&payload[8..12]),
            kd: LittleEndian::read_f32(&payload[12..16]),
            integral_min: LittleEndian::read_f32(&payload[16..20]),
            integral_max: LittleEndian::read_f32(&payload[20..24]),
        })
    }
}

// ============================================================================
// HEARTBEAT (both directions)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SystemStatus {
    #[default]
    Ok = 0,
    Warning = 1,
    Error = 2,
}

impl SystemStatus {
    pub fn from_wire(value: u8) -> Option<SystemStatus> {
        match value {
            0 => Some(SystemStatus::Ok),
            1 => Some(SystemStatus::Warning),
            2 => Some(SystemStatus::Error),
            _ => None,
        }
    }

    /// Derived from the task error counter: any error warns, a saturated
    /// counter is an error.
    pub fn from_error_count(errors: u8) -> SystemStatus {
        match errors {
            0 => SystemStatus::Ok,
            u8::MAX => SystemStatus::Error,
            _ => SystemStatus::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatFrame {
    pub timestamp_ms: u32,
    pub status: SystemStatus,
}

impl HeartbeatFrame {
    pub fn encode_payload(&self) -> [u8; HEARTBEAT_PAYLOAD_SIZE] {
        let mut buf = [0u8; HEARTBEAT_PAYLOAD_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.timestamp_ms);
        buf[4] = self.status as u8;
        buf
    }

    pub fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        expect_len(payload, HEARTBEAT_PAYLOAD_SIZE)?;
        let status = SystemStatus::from_wire(payload[4]).ok_or(ProtocolError::InvalidStatus(payload[4]))?;
        Ok(Self {
            timestamp_ms: LittleEndian::read_u32(&payload[0..4]),
            status,
        })
    }
}
