mod common;
use common::*;

use esy::header::HEADER_SIZE;
use esy::{DataLengthWidth, FunctionCode, MessageHeader};

#[test]
fn round_trip() {
    common_setup();

    let header = Factory::header(300);
    let bytes = header.to_bytes();

    assert_eq!(bytes.len(), HEADER_SIZE);
    assert_eq!(&bytes[0..4], &[0, 0, 0, 6]);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
    assert_eq!(bytes[16], 0x03);
    assert_eq!(bytes[17], 0x10);
    // reserved
    assert_eq!(&bytes[19..22], &[0, 0, 0]);
    assert_eq!(&bytes[22..24], &[0x01, 0x2c]);

    assert_eq!(MessageHeader::parse(&bytes), Some(header));
}

#[test]
fn round_trip_u32_length() {
    common_setup();

    let header = Factory::header(70000);
    let bytes = header.to_bytes_with(DataLengthWidth::U32);

    assert_eq!(bytes[19], 0);
    assert_eq!(&bytes[20..24], &70000u32.to_be_bytes());
    assert_eq!(
        MessageHeader::parse_with(&bytes, DataLengthWidth::U32),
        Some(header)
    );
}

#[test]
fn short_frame_has_no_header() {
    common_setup();

    assert_eq!(MessageHeader::parse(&[]), None);
    assert_eq!(MessageHeader::parse(&[0; 23]), None);
    assert!(MessageHeader::parse(&[0; 24]).is_some());
}

#[test]
fn function_and_sub_id() {
    common_setup();

    let mut header = Factory::header(0);
    assert_eq!(header.function(), Some(FunctionCode::Read));
    assert_eq!(header.sub_id(), 1);

    header.function_code = 0x83;
    assert_eq!(header.function(), Some(FunctionCode::Alarm));

    // unknown codes are kept raw
    header.function_code = 0x42;
    let parsed = MessageHeader::parse(&header.to_bytes()).unwrap();
    assert_eq!(parsed.function_code, 0x42);
    assert_eq!(parsed.function(), None);
}

#[test]
fn payload_is_truncated_to_frame() {
    common_setup();

    let mut frame = Factory::header(10).to_bytes().to_vec();
    frame.extend_from_slice(&[1, 2, 3, 4]);

    let header = MessageHeader::parse(&frame).unwrap();
    assert_eq!(header.payload(&frame), &[1, 2, 3, 4]);
}

#[test]
fn payload_ignores_trailing_bytes() {
    common_setup();

    let mut frame = Factory::header(2).to_bytes().to_vec();
    frame.extend_from_slice(&[1, 2, 3, 4]);

    let header = MessageHeader::parse(&frame).unwrap();
    assert_eq!(header.payload(&frame), &[1, 2]);
}
