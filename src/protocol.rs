//! Binary link protocol shared with the ground station.
//!
//! Every frame is `header(6) | payload(fixed per type) | crc16(2)`, all
//! fields little-endian and packed. Payload sizes are protocol constants;
//! the header's length field only serves as a sanity check.

pub mod codec;
pub mod crc;
pub mod messages;

pub const PROTOCOL_MAGIC: u16 = 0xAA55;
pub const PROTOCOL_VERSION: u8 = 0x01;

pub const HEADER_SIZE: usize = 6;
pub const CRC_SIZE: usize = 2;

pub const TELEMETRY_PAYLOAD_SIZE: usize = 40;
pub const CONTROL_PAYLOAD_SIZE: usize = 8;
pub const PID_UPDATE_PAYLOAD_SIZE: usize = 24;
pub const HEARTBEAT_PAYLOAD_SIZE: usize = 8;
pub const ACK_PAYLOAD_SIZE: usize = 0;

pub const TELEMETRY_MSG_SIZE: usize = HEADER_SIZE + TELEMETRY_PAYLOAD_SIZE + CRC_SIZE;
pub const CONTROL_MSG_SIZE: usize = HEADER_SIZE + CONTROL_PAYLOAD_SIZE + CRC_SIZE;
pub const PID_UPDATE_MSG_SIZE: usize = HEADER_SIZE + PID_UPDATE_PAYLOAD_SIZE + CRC_SIZE;
pub const HEARTBEAT_MSG_SIZE: usize = HEADER_SIZE + HEARTBEAT_PAYLOAD_SIZE + CRC_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// gimbal -> ground
    Telemetry = 0x01,
    /// ground -> gimbal
    Control = 0x02,
    /// ground -> gimbal
    PidUpdate = 0x03,
    Heartbeat = 0x04,
    /// Reserved, no current flow sends it.
    Ack = 0x0F,
}

impl MessageType {
    pub fn from_tag(tag: u8) -> Option<MessageType> {
        match tag {
            0x01 => Some(MessageType::Telemetry),
            0x02 => Some(MessageType::Control),
            0x03 => Some(MessageType::PidUpdate),
            0x04 => Some(MessageType::Heartbeat),
            0x0F => Some(MessageType::Ack),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn payload_size(self) -> usize {
        match self {
            MessageType::Telemetry => TELEMETRY_PAYLOAD_SIZE,
            MessageType::Control => CONTROL_PAYLOAD_SIZE,
            MessageType::PidUpdate => PID_UPDATE_PAYLOAD_SIZE,
            MessageType::Heartbeat => HEARTBEAT_PAYLOAD_SIZE,
            MessageType::Ack => ACK_PAYLOAD_SIZE,
        }
    }

    pub fn frame_size(self) -> usize {
        HEADER_SIZE + self.payload_size() + CRC_SIZE
    }
}

pub use codec::{decode, encode, peek_header, Header, Message};
pub use crc::crc16;
pub use messages::{ControlCommand, HeartbeatFrame, PidUpdateCommand, SystemStatus, TelemetryFrame};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sizes_match_wire_table() {
        assert_eq!(TELEMETRY_MSG_SIZE, 48);
        assert_eq!(CONTROL_MSG_SIZE, 16);
        assert_eq!(PID_UPDATE_MSG_SIZE, 32);
        assert_eq!(HEARTBEAT_MSG_SIZE, 16);
        assert_eq!(MessageType::Ack.frame_size(), 8);
    }

    #[test]
    fn tags_round_trip() {
        for t in [
            MessageType::Telemetry,
            MessageType::Control,
            MessageType::PidUpdate,
            MessageType::Heartbeat,
            MessageType::Ack,
        ] {
            assert_eq!(MessageType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(MessageType::from_tag(0x05), None);
    }
}
