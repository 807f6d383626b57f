use crate::prelude::*;

use crate::esy::codec::FrameDecoder;
use crate::esy::header::MessageHeader;
use crate::esy::telemetry::TelemetrySnapshot;
use crate::esy::topics::{DeviceTopics, TopicKind};

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;

const RECONNECT_DELAY_SECS: u64 = 5;
const KEEPALIVE_SECS: u64 = 60;

#[derive(Clone, Debug, PartialEq)]
pub enum ChannelData {
    Connected,    // these three only ever go
    Disconnected, // link->coordinator
    Telemetry(Box<TelemetrySnapshot>),
    Alarm(Alarm),
    News(String),
    Frame(Vec<u8>), // coordinator/scheduler->link, published to DOWN
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;
pub type Receiver = broadcast::Receiver<ChannelData>;

// Alarm {{{
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alarm {
    pub header: Option<MessageHeader>,
    pub raw: Vec<u8>,
}

impl Alarm {
    pub fn new(header: Option<MessageHeader>, raw: &[u8]) -> Self {
        Self {
            header,
            raw: raw.to_vec(),
        }
    }

    pub fn hex(&self) -> String {
        self.raw.iter().map(|b| format!("{:02x}", b)).collect()
    }
} // }}}

/// Connection to the vendor broker that carries the binary protocol.
#[derive(Clone)]
pub struct Link {
    config: ConfigWrapper,
    channels: Channels,
    decoder: Arc<FrameDecoder>,
    topics: DeviceTopics,
}

impl Link {
    pub fn new(config: ConfigWrapper, channels: Channels, decoder: Arc<FrameDecoder>) -> Self {
        let device = config.device();
        let mut topics = DeviceTopics::new(device.serial());
        if !device.user_id().is_empty() {
            topics = topics.with_user(device.user_id());
        }

        Self {
            config,
            channels,
            decoder,
            topics,
        }
    }

    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    pub async fn start(&self) -> Result<()> {
        let cloud = self.config.cloud();

        if !cloud.enabled() {
            info!("cloud link disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new(cloud.client_id(), cloud.host(), cloud.port());
        options.set_keep_alive(Duration::from_secs(KEEPALIVE_SECS));
        if let (Some(u), Some(p)) = (cloud.username(), cloud.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing cloud link at {}:{}", cloud.host(), cloud.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(self.receiver(eventloop, client.clone()), self.sender(client))?;

        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_cloud.send(ChannelData::Shutdown);
    }

    async fn subscribe(&self, client: &AsyncClient) -> Result<()> {
        for topic in self.topics.inbound() {
            info!("subscribing to {}", topic);
            client.subscribe(topic, QoS::AtMostOnce).await?;
        }

        Ok(())
    }

    // cloud -> coordinator
    async fn receiver(&self, mut eventloop: EventLoop, client: AsyncClient) -> Result<()> {
        let mut shutdown = self.channels.to_cloud.subscribe();

        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("cloud link connected");
                        self.subscribe(&client).await?;
                        self.forward(ChannelData::Connected);
                    }
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        if let Err(err) = self.handle_publish(&publish.topic, &publish.payload) {
                            warn!("{:?}", err);
                        }
                    }
                    Err(err) => {
                        error!("cloud link: {}", err);
                        self.forward(ChannelData::Disconnected);
                        info!("reconnecting in {}s", RECONNECT_DELAY_SECS);
                        tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                    }
                    _ => {} // keepalives etc
                },
                message = shutdown.recv() => match message {
                    Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                    _ => {}
                },
            }
        }

        info!("cloud receiver loop exiting");
        Ok(())
    }

    fn forward(&self, data: ChannelData) {
        if self.channels.from_cloud.send(data).is_err() {
            debug!("no listeners on from_cloud");
        }
    }

    /// Decodes one inbound publish and passes the result on.
    pub fn handle_publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let data = match self.topics.classify(topic) {
            Some(kind @ (TopicKind::Up | TopicKind::Event)) => {
                debug!("{:?} frame on {} ({} bytes)", kind, topic, payload.len());
                match self.decoder.decode_frame(payload) {
                    Some(snapshot) => {
                        debug!(
                            "telemetry: pv={}W grid={}W battery={}W load={}W soc={}%",
                            snapshot.pv_power,
                            snapshot.grid_power,
                            snapshot.battery_power,
                            snapshot.load_power,
                            snapshot.battery_soc
                        );
                        ChannelData::Telemetry(Box::new(snapshot))
                    }
                    None => bail!("undecodable frame on {} ({} bytes)", topic, payload.len()),
                }
            }
            Some(TopicKind::Alarm) => {
                let alarm = Alarm::new(self.decoder.decode_header(payload), payload);
                match &alarm.header {
                    Some(header) => info!(
                        "alarm on {} (function {:?}, source {}): {}",
                        topic,
                        header.function(),
                        header.sub_id(),
                        alarm.hex()
                    ),
                    None => info!("alarm on {} ({} bytes): {}", topic, payload.len(), alarm.hex()),
                }
                ChannelData::Alarm(alarm)
            }
            Some(TopicKind::News) => ChannelData::News(String::from_utf8_lossy(payload).into_owned()),
            Some(TopicKind::Down) | None => {
                debug!("ignoring message on {}", topic);
                return Ok(());
            }
        };

        if self.channels.from_cloud.send(data).is_err() {
            bail!("send(from_cloud) failed - channel closed?");
        }

        Ok(())
    }

    // coordinator -> cloud
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        let mut receiver = self.channels.to_cloud.subscribe();

        loop {
            match receiver.recv().await? {
                ChannelData::Shutdown => {
                    info!("cloud sender received shutdown signal");
                    let _ = client.disconnect().await;
                    break;
                }
                ChannelData::Frame(frame) => {
                    info!("publishing {} bytes to {}", frame.len(), self.topics.down);
                    if let Err(err) = client
                        .publish(&self.topics.down, QoS::AtLeastOnce, false, frame)
                        .await
                    {
                        error!("cloud publish failed: {:?}", err);
                    }
                }
                _ => {}
            }
        }

        info!("cloud sender loop exiting");
        Ok(())
    }
}
