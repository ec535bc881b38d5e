use byteorder::{ByteOrder, LittleEndian};

use super::crc::crc16;
use super::messages::{ControlCommand, HeartbeatFrame, PidUpdateCommand, TelemetryFrame};
use super::{MessageType, CRC_SIZE, HEADER_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use crate::error::ProtocolError;

/// Envelope header as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u16,
    pub version: u8,
    pub msg_type: u8,
    pub payload_len: u16,
}

impl Header {
    pub fn for_type(msg_type: MessageType) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            msg_type: msg_type.tag(),
            payload_len: msg_type.payload_size() as u16,
        }
    }

    fn write(&self, buf: &mut [u8]) {
        LittleEndian::write_u16(&mut buf[0..2], self.magic);
        buf[2] = self.version;
        buf[3] = self.msg_type;
        LittleEndian::write_u16(&mut buf[4..6], self.payload_len);
    }
}

/// Reads the header without validating anything past its length.
pub fn peek_header(frame: &[u8]) -> Option<Header> {
    if frame.len() < HEADER_SIZE {
        return None;
    }
    Some(Header {
        magic: LittleEndian::read_u16(&frame[0..2]),
        version: frame[2],
        msg_type: frame[3],
        payload_len: LittleEndian::read_u16(&frame[4..6]),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Telemetry(TelemetryFrame),
    Control(ControlCommand),
    PidUpdate(PidUpdateCommand),
    Heartbeat(HeartbeatFrame),
    Ack,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Telemetry(_) => MessageType::Telemetry,
            Message::Control(_) => MessageType::Control,
            Message::PidUpdate(_) => MessageType::PidUpdate,
            Message::Heartbeat(_) => MessageType::Heartbeat,
            Message::Ack => MessageType::Ack,
        }
    }
}

/// Builds a complete frame: header, payload, then the CRC over both.
pub fn encode(message: &Message) -> Vec<u8> {
    let msg_type = message.message_type();
    let payload_len = msg_type.payload_size();
    let mut frame = vec![0u8; msg_type.frame_size()];

    Header::for_type(msg_type).write(&mut frame[..HEADER_SIZE]);

    let payload = &mut frame[HEADER_SIZE..HEADER_SIZE + payload_len];
    match message {
        Message::Telemetry(t) => payload.copy_from_slice(&t.encode_payload()),
        Message::Control(c) => payload.copy_from_slice(&c.encode_payload()),
        Message::PidUpdate(p) => payload.copy_from_slice(&p.encode_payload()),
        Message::Heartbeat(h) => payload.copy_from_slice(&h.encode_payload()),
        Message::Ack => {}
    }

    let crc_offset = HEADER_SIZE + payload_len;
    let crc = crc16(&frame[..crc_offset]);
    LittleEndian::write_u16(&mut frame[crc_offset..crc_offset + CRC_SIZE], crc);
    frame
}

pub fn decode(frame: &[u8]) -> Result<Message, ProtocolError> {
    let header = peek_header(frame).ok_or(ProtocolError::TooShort { len: frame.len() })?;

    if header.magic != PROTOCOL_MAGIC {
        return Err(ProtocolError::BadMagic(header.magic));
    }
    if header.version != PROTOCOL_VERSION {
        return Err(ProtocolError::BadVersion(header.version));
    }
    let msg_type = MessageType::from_tag(header.msg_type).ok_or(ProtocolError::UnknownType(header.msg_type))?;

    let payload_len = msg_type.payload_size();
    if header.payload_len as usize != payload_len {
        return Err(ProtocolError::LengthMismatch {
            expected: payload_len,
            actual: header.payload_len as usize,
        });
    }
    if frame.len() != msg_type.frame_size() {
        return Err(ProtocolError::LengthMismatch {
            expected: msg_type.frame_size(),
            actual: frame.len(),
        });
    }

    let crc_offset = HEADER_SIZE + payload_len;
    let expected = crc16(&frame[..crc_offset]);
    let actual = LittleEndian::read_u16(&frame[crc_offset..crc_offset + CRC_SIZE]);
    if expected != actual {
        return Err(ProtocolError::CrcMismatch { expected, actual });
    }

    let payload = &frame[HEADER_SIZE..crc_offset];
    let message = match msg_type {
        MessageType::Telemetry => Message::Telemetry(TelemetryFrame::decode_payload(payload)?),
        MessageType::Control => Message::Control(ControlCommand::decode_payload(payload)?),
        MessageType::PidUpdate => Message::PidUpdate(PidUpdateCommand::decode_payload(payload)?),
        MessageType::Heartbeat => Message::Heartbeat(HeartbeatFrame::decode_payload(payload)?),
        MessageType::Ack => Message::Ack,
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Axis;
    use crate::protocol::messages::SystemStatus;
    use crate::protocol::{CONTROL_MSG_SIZE, TELEMETRY_MSG_SIZE};

    fn telemetry() -> TelemetryFrame {
        TelemetryFrame {
            timestamp_ms: 123_456,
            pitch: 12.5,
            roll: -3.25,
            yaw: 0.0,
            servo_pitch: 10.0,
            servo_roll: -2.0,
            free_heap: 180_000,
            cpu_load: 37,
            rssi: -55,
            task_errors: 0,
            loop_count: 4242,
        }
    }

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::Telemetry(telemetry()),
            Message::Control(ControlCommand { target_pitch: 15.0, target_roll: -7.5 }),
            Message::PidUpdate(PidUpdateCommand {
                axis: Axis::Pitch,
                kp: 2.0,
                ki: 0.1,
                kd: 0.05,
                integral_min: -10.0,
                integral_max: 10.0,
            }),
            Message::Heartbeat(HeartbeatFrame { timestamp_ms: 10_000, status: SystemStatus::Ok }),
            Message::Ack,
        ]
    }

    #[test]
    fn telemetry_frame_layout() {
        let frame = encode(&Message::Telemetry(telemetry()));
        assert_eq!(frame.len(), TELEMETRY_MSG_SIZE);
        assert_eq!(&frame[0..2], &[0x55, 0xAA]);
        assert_eq!(frame[2], 0x01);
        assert_eq!(frame[3], 0x01);
        assert_eq!(&frame[4..6], &[40, 0]);
        assert_eq!(&frame[10..14], &12.5f32.to_le_bytes());
        assert_eq!(&frame[14..18], &(-3.25f32).to_le_bytes());
        let crc = crc16(&frame[..46]);
        assert_eq!(&frame[46..48], &crc.to_le_bytes());

        match decode(&frame).unwrap() {
            Message::Telemetry(t) => {
                assert_eq!(t.pitch, 12.5);
                assert_eq!(t.roll, -3.25);
                assert_eq!(t.loop_count, 4242);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn attitude_only_telemetry_frame() {
        let frame = encode(&Message::Telemetry(TelemetryFrame {
            pitch: 12.5,
            roll: -3.25,
            ..Default::default()
        }));
        assert_eq!(frame.len(), 48);
        assert_eq!(&frame[..6], &[0x55, 0xAA, 0x01, 0x01, 0x28, 0x00]);
        assert_eq!(&frame[6..10], &[0, 0, 0, 0]);
        assert_eq!(&frame[10..14], &[0x00, 0x00, 0x48, 0x41]);
        assert_eq!(&frame[14..18], &[0x00, 0x00, 0x50, 0xC0]);
        assert!(frame[18..46].iter().all(|&b| b == 0));
        assert_eq!(crc16(&frame[..46]), 0x77D8);
        assert_eq!(&frame[46..48], &[0xD8, 0x77]);
    }

    #[test]
    fn every_message_type_decodes_to_itself() {
        for message in sample_messages() {
            let frame = encode(&message);
            assert_eq!(frame.len(), message.message_type().frame_size());
            assert_eq!(decode(&frame).unwrap(), message);
        }
    }

    #[test]
    fn any_single_bit_flip_is_rejected() {
        for message in sample_messages() {
            let frame = encode(&message);
            for byte in 0..frame.len() {
                for bit in 0..8 {
                    let mut corrupted = frame.clone();
                    corrupted[byte] ^= 1 << bit;
                    assert!(
                        decode(&corrupted).is_err(),
                        "flip at byte {byte} bit {bit} of {:?} was accepted",
                        message.message_type()
                    );
                }
            }
        }
    }

    #[test]
    fn short_input_is_too_short() {
        assert_eq!(decode(&[0x55, 0xAA, 0x01]), Err(ProtocolError::TooShort { len: 3 }));
        assert_eq!(decode(&[]), Err(ProtocolError::TooShort { len: 0 }));
    }

    #[test]
    fn header_fields_are_checked_in_order() {
        let good = encode(&Message::Control(ControlCommand { target_pitch: 1.0, target_roll: 2.0 }));

        let mut bad_magic = good.clone();
        bad_magic[0] = 0x00;
        assert_eq!(decode(&bad_magic), Err(ProtocolError::BadMagic(0xAA00)));

        let mut bad_version = good.clone();
        bad_version[2] = 0x02;
        assert_eq!(decode(&bad_version), Err(ProtocolError::BadVersion(0x02)));

        let mut bad_type = good.clone();
        bad_type[3] = 0x07;
        assert_eq!(decode(&bad_type), Err(ProtocolError::UnknownType(0x07)));

        let mut bad_len = good.clone();
        bad_len[4] = 9;
        assert_eq!(
            decode(&bad_len),
            Err(ProtocolError::LengthMismatch { expected: 8, actual: 9 })
        );

        let mut truncated = good.clone();
        truncated.pop();
        assert_eq!(
            decode(&truncated),
            Err(ProtocolError::LengthMismatch { expected: CONTROL_MSG_SIZE, actual: CONTROL_MSG_SIZE - 1 })
        );

        let mut bad_crc = good;
        bad_crc[CONTROL_MSG_SIZE - 1] ^= 0xFF;
        assert!(matches!(decode(&bad_crc), Err(ProtocolError::CrcMismatch { .. })));
    }

    #[test]
    fn valid_crc_with_bad_axis_is_invalid_axis() {
        let mut frame = encode(&Message::PidUpdate(PidUpdateCommand {
            axis: Axis::Roll,
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            integral_min: -1.0,
            integral_max: 1.0,
        }));
        frame[HEADER_SIZE] = 5;
        let crc = crc16(&frame[..frame.len() - CRC_SIZE]);
        let len = frame.len();
        frame[len - 2..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(decode(&frame), Err(ProtocolError::InvalidAxis(5)));
    }

    #[test]
    fn peek_header_reports_raw_fields() {
        let frame = encode(&Message::Ack);
        let header = peek_header(&frame).unwrap();
        assert_eq!(header, Header::for_type(MessageType::Ack));
        assert_eq!(header.payload_len, 0);
        assert!(peek_header(&frame[..5]).is_none());
    }
}
