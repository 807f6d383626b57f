use crate::prelude::*;

use esy::{CommandEncoder, Request};
use std::sync::Arc;

pub struct Poll {
    channels: Channels,
    encoder: Arc<CommandEncoder>,
    segment_ids: Vec<u16>,
}

impl Poll {
    pub fn new(channels: Channels, encoder: Arc<CommandEncoder>, segment_ids: Vec<u16>) -> Self {
        Self {
            channels,
            encoder,
            segment_ids,
        }
    }

    pub async fn run(&self) -> Result<Vec<u8>> {
        if self.segment_ids.is_empty() {
            bail!("poll request with no segments");
        }

        // u16 segment count, then one u16 per segment
        let count = self.segment_ids.len();
        if count > usize::from(u16::MAX) || 2 + count * 2 > self.encoder.max_payload() {
            bail!("{} segments won't fit in one poll request", count);
        }

        debug!("[poll] requesting segments {:?}", self.segment_ids);

        let frame = self.encoder.encode_command(&Request::Poll {
            segment_ids: self.segment_ids.clone(),
        });

        super::send_frame(&self.channels, frame.clone())?;

        Ok(frame)
    }
}
