use crate::prelude::*;

use crate::esy::link::Alarm;
use crate::esy::telemetry::TelemetrySnapshot;
use crate::esy::RegisterWrite;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish, QoS};
use std::time::Duration;

const PUBLISH_ATTEMPTS: u32 = 3;

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

/// Which device a command topic is addressed to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    Serial(String),
    All,
}

impl Message {
    pub fn for_telemetry(
        serial: &str,
        snapshot: &TelemetrySnapshot,
        publish_individual: bool,
    ) -> Result<Vec<Message>> {
        let mut r = vec![Message {
            topic: format!("{}/telemetry", serial),
            retain: false,
            payload: serde_json::to_string(snapshot)?,
        }];

        if publish_individual {
            for (key, value) in snapshot.derived() {
                r.push(Message {
                    topic: format!("{}/telemetry/{}", serial, key),
                    retain: false,
                    payload: value,
                });
            }
        }

        Ok(r)
    }

    pub fn for_alarm(serial: &str, alarm: &Alarm) -> Message {
        Message {
            topic: format!("{}/alarm", serial),
            retain: false,
            payload: alarm.hex(),
        }
    }

    pub fn for_news(serial: &str, news: &str) -> Message {
        Message {
            topic: format!("{}/news", serial),
            retain: false,
            payload: news.to_owned(),
        }
    }

    pub fn to_command(&self) -> Result<Command> {
        use Command::*;

        let (_target, parts) = self.split_cmd_topic()?;

        let r = match parts[..] {
            ["set", "hold", register] => SetHold(register.parse()?, self.payload_int()?),
            ["set", "mode"] => SetMode(self.payload_int()?),
            ["set", "multi"] => WriteMulti(self.payload_writes()?),
            ["read", "hold", register] => ReadHold(register.parse()?, self.payload_int_or_1()?),
            ["read", "poll"] => Poll(self.payload_segments()?),
            ["reload_definition"] => ReloadDefinition,
            [..] => bail!("unhandled: {:?}", self),
        };

        Ok(r)
    }

    // given a cmd Message, return the device it is intended for.
    //
    // eg cmd/ESY1234567/set/hold/57 => (Serial(ESY1234567), ['set', 'hold', '57'])
    pub fn split_cmd_topic(&self) -> Result<(Target, Vec<&str>)> {
        let parts: Vec<&str> = self.topic.split('/').collect();

        // this *shouldn't* happen as our subscribe is for <ns>/cmd/<serial>/#
        if parts.len() < 3 || parts[0] != "cmd" {
            bail!("ignoring badly formed MQTT topic: {}", self.topic);
        }

        let target = match parts[1] {
            "all" => Target::All,
            "" => bail!("ignoring MQTT topic with empty serial: {}", self.topic),
            serial => Target::Serial(serial.to_owned()),
        };

        Ok((target, parts[2..].to_vec()))
    }

    fn payload_int_or_1(&self) -> Result<u16> {
        self.payload_int().or(Ok(1))
    }

    fn payload_int(&self) -> Result<u16> {
        self.payload
            .trim()
            .parse()
            .map_err(|err| anyhow!("payload_int: {}", err))
    }

    // empty payload means "use the configured segments"
    fn payload_segments(&self) -> Result<Option<Vec<u16>>> {
        if self.payload.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.payload)
            .map(Some)
            .map_err(|err| anyhow!("payload_segments: {}", err))
    }

    // [[57, 5], [60, [1, 2]]]
    fn payload_writes(&self) -> Result<Vec<RegisterWrite>> {
        let writes: Vec<RegisterWrite> = serde_json::from_str(&self.payload)
            .map_err(|err| anyhow!("payload_writes: {}", err))?;
        if writes.is_empty() {
            bail!("payload_writes: no registers given");
        }
        Ok(writes)
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

/// Client for the local broker that home automation talks to.
#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    channels: Channels,
}

impl Mqtt {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let c = self.config.mqtt();

        if !c.enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let client_id = format!("sunhome-bridge-{}", self.config.device().serial());
        let mut options = MqttOptions::new(client_id, c.host(), c.port());

        let will = LastWill {
            topic: self.lwt_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        let namespace = self.config.mqtt().namespace().to_owned();

        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        client
            .subscribe(format!("{}/cmd/all/#", namespace), QoS::AtMostOnce)
            .await?;

        client
            .subscribe(
                format!("{}/cmd/{}/#", namespace, self.config.device().serial()),
                QoS::AtMostOnce,
            )
            .await?;

        Ok(())
    }

    // mqtt -> coordinator
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        let mut shutdown = self.channels.to_mqtt.subscribe();

        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        if let Err(err) = self.handle_message(publish) {
                            warn!("{:?}", err);
                        }
                    }
                    Err(e) => {
                        error!("{}", e);
                        info!("reconnecting in 5s");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {} // keepalives etc
                },
                message = shutdown.recv() => match message {
                    Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                    _ => {}
                },
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    fn handle_message(&self, publish: Publish) -> Result<()> {
        // remove the namespace, including the first /
        // doing it this way means we don't break if namespace happens to contain a /
        let namespace = self.config.mqtt().namespace().to_owned();
        let topic = publish
            .topic
            .strip_prefix(&namespace)
            .and_then(|t| t.strip_prefix('/'))
            .ok_or_else(|| anyhow!("topic {} outside namespace {}", publish.topic, namespace))?
            .to_owned();

        let message = Message {
            topic,
            retain: publish.retain,
            payload: String::from_utf8(publish.payload.to_vec())?,
        };
        debug!("RX: {:?}", message);
        if self
            .channels
            .from_mqtt
            .send(ChannelData::Message(message))
            .is_err()
        {
            bail!("send(from_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    // coordinator -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use ChannelData::*;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await? {
                Shutdown => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client
                        .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "offline")
                        .await;
                    let _ = client.disconnect().await;
                    break;
                }
                Message(message) => {
                    let topic = format!("{}/{}", self.config.mqtt().namespace(), message.topic);
                    debug!("publishing: {} = {}", topic, message.payload);
                    let payload = message.payload.into_bytes();
                    for attempt in 1..=PUBLISH_ATTEMPTS {
                        match client
                            .publish(&topic, QoS::AtLeastOnce, message.retain, payload.clone())
                            .await
                        {
                            Ok(_) => break,
                            Err(err) => {
                                error!(
                                    "MQTT publish failed: {:?} - retrying in 10s (attempt {}/{})",
                                    err, attempt, PUBLISH_ATTEMPTS
                                );
                                tokio::time::sleep(Duration::from_secs(10)).await;
                            }
                        }
                    }
                }
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.mqtt().namespace())
    }
}
