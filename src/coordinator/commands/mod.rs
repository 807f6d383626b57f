use crate::prelude::*;

use crate::esy::link;

pub mod poll;
pub mod read_hold;
pub mod reload_definition;
pub mod set_hold;
pub mod set_mode;
pub mod write_multi;

/// Hands an encoded frame to the cloud link for publishing on DOWN.
pub fn send_frame(channels: &Channels, frame: Vec<u8>) -> Result<()> {
    if channels.to_cloud.send(link::ChannelData::Frame(frame)).is_err() {
        bail!("send(to_cloud) failed - channel closed?");
    }

    Ok(())
}
