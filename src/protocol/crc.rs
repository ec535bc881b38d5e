// CRC-16/ARC: reflected polynomial 0xA001, init 0x0000, no final xor
use crc::{Crc, CRC_16_ARC};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
