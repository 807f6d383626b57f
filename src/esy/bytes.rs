//! Big-endian integer helpers shared by the header, segment and command code.
//!
//! Nothing in here fails: short input reads as zero, since a garbled frame
//! off the wire must still produce a best-effort result.

pub fn read_u16_be(b0: u8, b1: u8) -> u16 {
    u16::from_be_bytes([b0, b1])
}

pub fn read_i16_be(b0: u8, b1: u8) -> i16 {
    i16::from_be_bytes([b0, b1])
}

pub fn read_u32_be(data: &[u8]) -> u32 {
    word4(data).map(u32::from_be_bytes).unwrap_or(0)
}

pub fn read_i32_be(data: &[u8]) -> i32 {
    word4(data).map(i32::from_be_bytes).unwrap_or(0)
}

pub fn write_u16_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn write_i16_be(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn write_u32_be(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

fn word4(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4).and_then(|b| b.try_into().ok())
}

/// Packs a decimal identifier (eg a user id) into the 8-byte header field.
///
/// The value's significant bytes end up right-aligned, which is exactly a
/// big-endian u64. Empty, non-numeric or overflowing input packs to zeros.
pub fn encode_identifier(id: &str) -> [u8; 8] {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return [0; 8];
    }

    id.parse::<u64>().map(u64::to_be_bytes).unwrap_or([0; 8])
}

pub fn decode_identifier(bytes: &[u8; 8]) -> u64 {
    u64::from_be_bytes(*bytes)
}
