use crate::prelude::*;

use crate::esy::bytes::encode_identifier;
use crate::esy::header::{DataLengthWidth, FunctionCode, MessageHeader, HEADER_SIZE};

use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// One entry of a multi-register write: `values` land at consecutive
/// addresses starting from `address`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(from = "WriteSpec")]
pub struct RegisterWrite {
    pub address: u16,
    pub values: Vec<u16>,
}

// accepts [addr, value] or [addr, [v1, v2, ..]]
#[derive(Deserialize)]
#[serde(untagged)]
enum WriteValues {
    One(u16),
    Many(Vec<u16>),
}

#[derive(Deserialize)]
struct WriteSpec(u16, WriteValues);

impl From<WriteSpec> for RegisterWrite {
    fn from(w: WriteSpec) -> Self {
        let values = match w.1 {
            WriteValues::One(v) => vec![v],
            WriteValues::Many(v) => v,
        };
        Self {
            address: w.0,
            values,
        }
    }
}

impl RegisterWrite {
    pub fn single(address: u16, value: u16) -> Self {
        Self {
            address,
            values: vec![value],
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(pos, v)| (self.address.wrapping_add(pos as u16), *v))
    }
}

/// A logical request to turn into a DOWN frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Request {
    WriteSingle { address: u16, value: u16 },
    Read { address: u16, count: u16 },
    Poll { segment_ids: Vec<u16> },
    MultiWrite { writes: Vec<RegisterWrite> },
}

/// Builds outbound frames for one device/user.
///
/// msg_id counts up per encoder and wraps at u32::MAX.
#[derive(Debug)]
pub struct CommandEncoder {
    identifier: [u8; 8],
    config_id: u32,
    width: DataLengthWidth,
    msg_id: AtomicU32,
}

impl CommandEncoder {
    /// source nibble for frames we originate
    pub const APP_SOURCE: u8 = 0x02;

    pub fn new(user_id: &str) -> Self {
        Self {
            identifier: encode_identifier(user_id),
            config_id: 0,
            width: DataLengthWidth::default(),
            msg_id: AtomicU32::new(0),
        }
    }

    pub fn with_config_id(mut self, config_id: u32) -> Self {
        self.config_id = config_id;
        self
    }

    pub fn with_width(mut self, width: DataLengthWidth) -> Self {
        self.width = width;
        self
    }

    /// Largest payload one frame can carry with this encoder's width.
    pub fn max_payload(&self) -> usize {
        self.width.max_len()
    }

    pub fn next_msg_id(&self) -> u32 {
        self.msg_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    fn frame(
        &self,
        function: FunctionCode,
        config_id: u32,
        msg_id: u32,
        page_index: u8,
        source_id: u8,
        payload: &[u8],
    ) -> Vec<u8> {
        let header = MessageHeader {
            config_id,
            msg_id,
            identifier: self.identifier,
            function_code: function.into(),
            source_id: source_id << 4,
            page_index,
            data_length: payload.len() as u32,
        };

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        frame.put_slice(&header.to_bytes_with(self.width));
        frame.put_slice(payload);

        trace!("built {:?} frame: {:02x?}", function, &frame[..]);
        frame.to_vec()
    }

    /// header + (address, value)
    pub fn build_write_single(
        &self,
        config_id: u32,
        address: u16,
        value: u16,
        page_index: u8,
        source_id: u8,
    ) -> Vec<u8> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16(address);
        payload.put_u16(value);

        self.frame(
            FunctionCode::WriteSingle,
            config_id,
            self.next_msg_id(),
            page_index,
            source_id,
            &payload,
        )
    }

    /// header + (address, count)
    pub fn build_read(&self, address: u16, count: u16) -> Vec<u8> {
        let mut payload = BytesMut::with_capacity(4);
        payload.put_u16(address);
        payload.put_u16(count);

        self.frame(
            FunctionCode::Read,
            self.config_id,
            self.next_msg_id(),
            0,
            Self::APP_SOURCE,
            &payload,
        )
    }

    /// header + segment count + segment ids, sent as a READ
    pub fn build_poll_request(&self, segment_ids: &[u16], msg_id: u32) -> Vec<u8> {
        let mut payload = BytesMut::with_capacity(2 + segment_ids.len() * 2);
        payload.put_u16(segment_ids.len() as u16);
        for id in segment_ids {
            payload.put_u16(*id);
        }

        self.frame(
            FunctionCode::Read,
            self.config_id,
            msg_id,
            0,
            Self::APP_SOURCE,
            &payload,
        )
    }

    /// header + (address, value) for every register written
    pub fn build_multi_write(&self, writes: &[RegisterWrite], msg_id: u32) -> Vec<u8> {
        let mut payload = BytesMut::new();
        for (address, value) in writes.iter().flat_map(|w| w.pairs()) {
            payload.put_u16(address);
            payload.put_u16(value);
        }

        self.frame(
            FunctionCode::WriteMultiple,
            self.config_id,
            msg_id,
            0,
            Self::APP_SOURCE,
            &payload,
        )
    }

    pub fn encode_command(&self, request: &Request) -> Vec<u8> {
        match request {
            Request::WriteSingle { address, value } => self.build_write_single(
                self.config_id,
                *address,
                *value,
                0,
                Self::APP_SOURCE,
            ),
            Request::Read { address, count } => self.build_read(*address, *count),
            Request::Poll { segment_ids } => {
                self.build_poll_request(segment_ids, self.next_msg_id())
            }
            Request::MultiWrite { writes } => self.build_multi_write(writes, self.next_msg_id()),
        }
    }
}
