use crate::prelude::*;

use esy::{CommandEncoder, Request};
use std::sync::Arc;

pub struct ReadHold {
    channels: Channels,
    encoder: Arc<CommandEncoder>,
    register: u16,
    count: u16,
}

impl ReadHold {
    pub fn new<U>(channels: Channels, encoder: Arc<CommandEncoder>, register: U, count: u16) -> Self
    where
        U: Into<u16>,
    {
        Self {
            channels,
            encoder,
            register: register.into(),
            count,
        }
    }

    /// The reply arrives asynchronously on UP and is published as telemetry.
    pub async fn run(&self) -> Result<Vec<u8>> {
        if self.count == 0 {
            bail!("read of register {} with count 0", self.register);
        }

        info!(
            "[read_hold] reading {} register(s) from {}",
            self.count, self.register
        );

        let frame = self.encoder.encode_command(&Request::Read {
            address: self.register,
            count: self.count,
        });

        super::send_frame(&self.channels, frame.clone())?;

        Ok(frame)
    }
}
