use crate::prelude::*;

use esy::{CommandEncoder, RegisterWrite, Request};
use std::sync::Arc;

pub struct WriteMulti {
    channels: Channels,
    encoder: Arc<CommandEncoder>,
    writes: Vec<RegisterWrite>,
}

impl WriteMulti {
    pub fn new(channels: Channels, encoder: Arc<CommandEncoder>, writes: Vec<RegisterWrite>) -> Self {
        Self {
            channels,
            encoder,
            writes,
        }
    }

    pub async fn run(&self) -> Result<Vec<u8>> {
        if self.writes.iter().all(|w| w.values.is_empty()) {
            bail!("nothing to write");
        }

        let registers: usize = self.writes.iter().map(|w| w.values.len()).sum();
        if registers * 4 > self.encoder.max_payload() {
            bail!("{} registers won't fit in one frame", registers);
        }

        let frame = self.encoder.encode_command(&Request::MultiWrite {
            writes: self.writes.clone(),
        });

        for (address, value) in self.writes.iter().flat_map(|w| w.pairs()) {
            debug!("[write_multi] register {} = {}", address, value);
        }
        info!("[write_multi] sending {} byte frame", frame.len());

        super::send_frame(&self.channels, frame.clone())?;

        Ok(frame)
    }
}
