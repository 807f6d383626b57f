use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    pub from_cloud: broadcast::Sender<esy::link::ChannelData>,
    pub to_cloud: broadcast::Sender<esy::link::ChannelData>,
    pub from_mqtt: broadcast::Sender<mqtt::ChannelData>,
    pub to_mqtt: broadcast::Sender<mqtt::ChannelData>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            from_cloud: Self::channel(),
            to_cloud: Self::channel(),
            from_mqtt: Self::channel(),
            to_mqtt: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
