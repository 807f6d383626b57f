use crate::prelude::*;

use bytes::BufMut;
use nom::{
    bytes::complete::take,
    number::complete::{be_u16, be_u32, be_u8},
    IResult,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

pub const HEADER_SIZE: usize = 24;

// {{{ FunctionCode
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    Read = 0x03,
    WriteSingle = 0x06,
    WriteMultiple = 0x10,
    // device-originated alarm/response frames
    Alarm = 0x83,
}
// }}}

// {{{ DataLengthWidth
/// Where the header keeps the payload length. Firmware differs: most put a
/// u16 at 22..24, some use the whole of 20..24 as a u32.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLengthWidth {
    #[default]
    U16,
    U32,
}

impl DataLengthWidth {
    fn reserved_len(&self) -> usize {
        match self {
            Self::U16 => 3,
            Self::U32 => 1,
        }
    }

    /// Largest payload the length field can describe.
    pub fn max_len(&self) -> usize {
        match self {
            Self::U16 => usize::from(u16::MAX),
            Self::U32 => u32::MAX as usize,
        }
    }
}
// }}}

// {{{ MessageHeader
/// Fixed 24 byte frame header.
///
/// ```text
/// 0..4   config_id     u32
/// 4..8   msg_id        u32
/// 8..16  identifier    8 opaque bytes (or a packed user id)
/// 16     function_code u8
/// 17     source_id     u8, high nibble is the sub-id
/// 18     page_index    u8
/// 19..   reserved
/// 22..24 data_length   u16 (or 20..24 as u32)
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MessageHeader {
    pub config_id: u32,
    pub msg_id: u32,
    pub identifier: [u8; 8],
    pub function_code: u8,
    pub source_id: u8,
    pub page_index: u8,
    pub data_length: u32,
}

impl MessageHeader {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        Self::parse_with(frame, DataLengthWidth::default())
    }

    pub fn parse_with(frame: &[u8], width: DataLengthWidth) -> Option<Self> {
        if frame.len() < HEADER_SIZE {
            debug!(
                "header parse failed: {} bytes, need {}",
                frame.len(),
                HEADER_SIZE
            );
            return None;
        }

        match Self::fields(frame, width) {
            Ok((_, header)) => {
                debug!(
                    "header: config_id={} msg_id={} fc={:#04x} source={:#04x} page={} data_length={}",
                    header.config_id,
                    header.msg_id,
                    header.function_code,
                    header.source_id,
                    header.page_index,
                    header.data_length
                );
                Some(header)
            }
            Err(err) => {
                debug!("header parse failed: {:?}", err);
                None
            }
        }
    }

    fn fields(input: &[u8], width: DataLengthWidth) -> IResult<&[u8], Self> {
        let (input, config_id) = be_u32(input)?;
        let (input, msg_id) = be_u32(input)?;
        let (input, id) = take(8usize)(input)?;
        let (input, function_code) = be_u8(input)?;
        let (input, source_id) = be_u8(input)?;
        let (input, page_index) = be_u8(input)?;
        let (input, _) = take(width.reserved_len())(input)?;
        let (input, data_length) = match width {
            DataLengthWidth::U16 => {
                let (input, len) = be_u16(input)?;
                (input, u32::from(len))
            }
            DataLengthWidth::U32 => be_u32(input)?,
        };

        let mut identifier = [0; 8];
        identifier.copy_from_slice(id);

        Ok((
            input,
            Self {
                config_id,
                msg_id,
                identifier,
                function_code,
                source_id,
                page_index,
                data_length,
            },
        ))
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.to_bytes_with(DataLengthWidth::default())
    }

    /// Reserved bytes are always written as zero. With a u16 width only the
    /// low 16 bits of data_length fit.
    pub fn to_bytes_with(&self, width: DataLengthWidth) -> [u8; HEADER_SIZE] {
        let mut out = [0; HEADER_SIZE];
        let mut buf = &mut out[..];

        buf.put_u32(self.config_id);
        buf.put_u32(self.msg_id);
        buf.put_slice(&self.identifier);
        buf.put_u8(self.function_code);
        buf.put_u8(self.source_id);
        buf.put_u8(self.page_index);
        buf.put_bytes(0, width.reserved_len());
        if self.data_length as usize > width.max_len() {
            warn!(
                "data_length {} doesn't fit a {:?} length field, truncated",
                self.data_length, width
            );
        }
        match width {
            DataLengthWidth::U16 => buf.put_u16(self.data_length as u16),
            DataLengthWidth::U32 => buf.put_u32(self.data_length),
        }

        out
    }

    pub fn function(&self) -> Option<FunctionCode> {
        FunctionCode::try_from(self.function_code).ok()
    }

    pub fn sub_id(&self) -> u8 {
        self.source_id >> 4
    }

    /// The payload this header describes, cut short if the frame is.
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        let available = frame.len().saturating_sub(HEADER_SIZE);
        let wanted = self.data_length as usize;
        if wanted > available {
            debug!(
                "data_length {} exceeds the {} bytes available, truncating",
                wanted, available
            );
        }

        frame
            .get(HEADER_SIZE..HEADER_SIZE + wanted.min(available))
            .unwrap_or_default()
    }
}
// }}}
