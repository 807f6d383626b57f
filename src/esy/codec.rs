use crate::prelude::*;

use crate::esy::catalog::{RegisterCatalog, RegisterTable, Slot};
use crate::esy::header::MessageHeader;
use crate::esy::profile::VariantProfile;
use crate::esy::segment::{self, ParamSegment};
use crate::esy::telemetry::{self, RegisterValues, TelemetrySnapshot};

use std::sync::Arc;

/// Looks every register of every segment up in `table`.
///
/// Unmapped registers are kept as their raw signed value under the table's
/// debug key. A 32-bit definition consumes the following register too.
pub fn resolve(table: &RegisterTable, segments: &[ParamSegment]) -> RegisterValues {
    let mut values = RegisterValues::new();

    for segment in segments {
        let words: Vec<(u16, [u8; 2])> = segment.words().collect();
        let mut i = 0;

        while i < words.len() {
            let (address, word) = words[i];
            let slot = Slot {
                segment_id: segment.segment_id,
                function_code: segment.segment_type,
                address,
                offset: i as u16,
            };

            if let Some(definition) = table.locate(&slot) {
                let width = definition.width();
                let raw: Vec<u8> = words
                    .iter()
                    .skip(i)
                    .take(width)
                    .flat_map(|(_, w)| *w)
                    .collect();

                if let Some(v) = definition.decode(&raw) {
                    values.insert(definition.data_key.clone(), v);
                    i += width;
                    continue;
                }

                debug!(
                    "{} at {} runs past the end of segment {}",
                    definition.data_key, address, segment.segment_id
                );
            }

            let key = table.debug_key(&slot);
            let raw = i16::from_be_bytes(word);
            debug!("unmapped register {} = {}", key, raw);
            values.insert(key, f64::from(raw));
            i += 1;
        }
    }

    values
}

/// Frame bytes in, telemetry out.
pub struct FrameDecoder {
    catalog: Arc<RegisterCatalog>,
    profile: VariantProfile,
}

impl FrameDecoder {
    pub fn new(catalog: Arc<RegisterCatalog>, profile: VariantProfile) -> Self {
        Self { catalog, profile }
    }

    pub fn decode_header(&self, frame: &[u8]) -> Option<MessageHeader> {
        MessageHeader::parse_with(frame, self.profile.data_length_width)
    }

    /// None only when the header itself can't be read. Everything after
    /// that is best effort.
    pub fn decode_frame(&self, frame: &[u8]) -> Option<TelemetrySnapshot> {
        let header = self.decode_header(frame)?;
        let segments = segment::decode(header.payload(frame));
        debug!(
            "frame {} ({:?}): {} segments",
            header.msg_id,
            header.function(),
            segments.len()
        );

        // one table for the whole frame, even if a swap lands mid-decode
        let table = self.catalog.snapshot();
        if table.is_empty() {
            debug!("register catalog is empty, only raw values will be decoded");
        }

        let values = resolve(&table, &segments);
        Some(telemetry::synthesize(&self.profile, &table, values))
    }
}
