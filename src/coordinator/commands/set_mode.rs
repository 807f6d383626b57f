use crate::prelude::*;

use esy::catalog::MODE_REGISTER;
use esy::telemetry::ModeString;
use esy::CommandEncoder;
use std::sync::Arc;

use super::set_hold::SetHold;

pub struct SetMode {
    channels: Channels,
    encoder: Arc<CommandEncoder>,
    mode: u16,
}

impl SetMode {
    pub fn new(channels: Channels, encoder: Arc<CommandEncoder>, mode: u16) -> Self {
        Self {
            channels,
            encoder,
            mode,
        }
    }

    pub async fn run(&self) -> Result<Vec<u8>> {
        if !ModeString::is_known(self.mode) {
            bail!("refusing to set unknown operating mode {}", self.mode);
        }

        info!(
            "[set_mode] switching to {} ({})",
            ModeString::from_value(self.mode),
            self.mode
        );

        SetHold::new(self.channels.clone(), self.encoder.clone(), MODE_REGISTER, self.mode)
            .run()
            .await
    }
}
