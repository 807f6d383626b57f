use crate::prelude::*;

use esy::{CommandEncoder, Request};
use std::sync::Arc;

pub struct SetHold {
    channels: Channels,
    encoder: Arc<CommandEncoder>,
    register: u16,
    value: u16,
}

impl SetHold {
    pub fn new<U>(channels: Channels, encoder: Arc<CommandEncoder>, register: U, value: u16) -> Self
    where
        U: Into<u16>,
    {
        Self {
            channels,
            encoder,
            register: register.into(),
            value,
        }
    }

    pub async fn run(&self) -> Result<Vec<u8>> {
        let frame = self.encoder.encode_command(&Request::WriteSingle {
            address: self.register,
            value: self.value,
        });

        info!(
            "[set_hold] writing register {} = {} ({} byte frame)",
            self.register,
            self.value,
            frame.len()
        );

        super::send_frame(&self.channels, frame.clone())?;

        Ok(frame)
    }
}
