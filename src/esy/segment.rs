use crate::prelude::*;

use nom::{bytes::complete::take, number::complete::be_u16};
use nom_derive::{Nom, Parse};

type NomError<'a> = nom::error::Error<&'a [u8]>;

pub const SEGMENT_HEADER_SIZE: usize = 8;

// segment_type values
pub const HOLDING: u16 = 3;
pub const INPUT: u16 = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Nom)]
#[nom(BigEndian)]
pub struct SegmentHeader {
    pub segment_id: u16,
    pub segment_type: u16,
    pub segment_address: u16,
    pub params_num: u16,
}

/// A contiguous run of registers from one register space.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParamSegment {
    pub segment_id: u16,
    pub segment_type: u16,
    pub segment_address: u16,
    pub params_num: u16,
    pub values: Vec<u8>,
}

impl ParamSegment {
    fn new(header: SegmentHeader, values: &[u8]) -> Self {
        Self {
            segment_id: header.segment_id,
            segment_type: header.segment_type,
            segment_address: header.segment_address,
            params_num: header.params_num,
            values: values.to_vec(),
        }
    }

    /// (address, raw word bytes) for every register carried.
    pub fn words(&self) -> impl Iterator<Item = (u16, [u8; 2])> + '_ {
        self.values
            .chunks_exact(2)
            .enumerate()
            .map(|(pos, w)| (self.segment_address.wrapping_add(pos as u16), [w[0], w[1]]))
    }
}

/// Splits a frame payload into segments.
///
/// Layout is a u16 segment count then, per segment, an 8 byte sub-header
/// followed by params_num*2 value bytes. Decoding stops at the first segment
/// that doesn't fit; everything before it is returned.
pub fn decode(payload: &[u8]) -> Vec<ParamSegment> {
    let mut segments = Vec::new();

    let (mut input, count) = match be_u16::<_, NomError>(payload) {
        Ok(r) => r,
        Err(_) => return segments,
    };

    for index in 0..count {
        let (rest, header) = match SegmentHeader::parse(input) {
            Ok(r) => r,
            Err(_) => {
                debug!(
                    "segment {}/{}: {} bytes left, not enough for a sub-header",
                    index,
                    count,
                    input.len()
                );
                break;
            }
        };

        let value_len = usize::from(header.params_num) * 2;
        let (rest, values) = match take::<_, _, NomError>(value_len)(rest) {
            Ok(r) => r,
            Err(_) => {
                debug!(
                    "segment {}/{} (id={}) truncated: need {} bytes, have {}",
                    index,
                    count,
                    header.segment_id,
                    value_len,
                    rest.len()
                );
                break;
            }
        };

        debug!(
            "segment {}/{}: id={} type={} addr={} params={}",
            index,
            count,
            header.segment_id,
            header.segment_type,
            header.segment_address,
            header.params_num
        );

        segments.push(ParamSegment::new(header, values));
        input = rest;
    }

    segments
}
