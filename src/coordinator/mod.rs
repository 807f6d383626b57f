use crate::prelude::*;

pub mod commands;

use esy::link;
use esy::{CommandEncoder, RegisterCatalog, TelemetrySnapshot};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FrameStats {
    telemetry_frames: u64,
    alarms: u64,
    news: u64,
    frames_sent: u64,
    commands_ok: u64,
    commands_failed: u64,
    mqtt_messages_sent: u64,
    mqtt_errors: u64,
    cloud_connects: u64,
    cloud_disconnects: u64,
}

impl FrameStats {
    pub fn print_summary(&self) {
        info!("Frame Statistics:");
        info!("  Telemetry frames decoded: {}", self.telemetry_frames);
        info!("  Alarms received: {}", self.alarms);
        info!("  News messages received: {}", self.news);
        info!("  Frames sent: {}", self.frames_sent);
        info!("  Commands:");
        info!("    OK: {}", self.commands_ok);
        info!("    FAIL: {}", self.commands_failed);
        info!("  MQTT:");
        info!("    Messages sent: {}", self.mqtt_messages_sent);
        info!("    Errors: {}", self.mqtt_errors);
        info!("  Cloud link:");
        info!("    Connects: {}", self.cloud_connects);
        info!("    Disconnects: {}", self.cloud_disconnects);
    }
}

#[derive(Clone)]
pub struct Coordinator {
    config: ConfigWrapper,
    channels: Channels,
    catalog: Arc<RegisterCatalog>,
    encoder: Arc<CommandEncoder>,
    pub stats: Arc<Mutex<FrameStats>>,
}

impl Coordinator {
    pub fn new(
        config: ConfigWrapper,
        channels: Channels,
        catalog: Arc<RegisterCatalog>,
        encoder: Arc<CommandEncoder>,
    ) -> Self {
        Self {
            config,
            channels,
            catalog,
            encoder,
            stats: Arc::new(Mutex::new(FrameStats::default())),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if self.config.mqtt().enabled() {
            futures::try_join!(self.cloud_receiver(), self.mqtt_receiver())?;
        } else {
            self.cloud_receiver().await?;
        }

        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.from_cloud.send(link::ChannelData::Shutdown);

        if self.config.mqtt().enabled() {
            let _ = self.channels.from_mqtt.send(mqtt::ChannelData::Shutdown);
        }
    }

    fn with_stats<F: FnOnce(&mut FrameStats)>(&self, f: F) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    async fn mqtt_receiver(&self) -> Result<()> {
        let mut receiver = self.channels.from_mqtt.subscribe();

        while let mqtt::ChannelData::Message(message) = receiver.recv().await? {
            if let Err(err) = self.process_message(message).await {
                error!("{:?}", err);
            }
        }

        Ok(())
    }

    /// Handles one message from a `cmd/` topic. A reply is published on the
    /// matching `result/` topic for every command that parses.
    pub async fn process_message(&self, message: mqtt::Message) -> Result<()> {
        let (target, _) = message.split_cmd_topic()?;
        if !self.config.is_target(&target) {
            debug!("ignoring command for {:?}", target);
            return Ok(());
        }

        let command = message.to_command()?;
        info!("parsed command {:?}", command);

        let serial = self.config.device().serial().to_owned();
        let topic = command.to_result_topic(&serial);

        let payload = match self.process_command(command).await {
            Ok(_) => {
                self.with_stats(|s| s.commands_ok += 1);
                "OK"
            }
            Err(err) => {
                error!("{}: {:?}", topic, err);
                self.with_stats(|s| s.commands_failed += 1);
                "FAIL"
            }
        };

        self.publish_message(topic, payload.to_owned(), false)
    }

    async fn process_command(&self, command: Command) -> Result<()> {
        use commands::*;
        use Command::*;

        if command.is_write() && self.config.read_only() {
            bail!("refusing {:?}, bridge is read-only", command);
        }

        let channels = self.channels.clone();
        let encoder = self.encoder.clone();

        match command {
            SetHold(register, value) => {
                set_hold::SetHold::new(channels, encoder, register, value)
                    .run()
                    .await?;
            }
            SetMode(mode) => {
                set_mode::SetMode::new(channels, encoder, mode).run().await?;
            }
            WriteMulti(writes) => {
                write_multi::WriteMulti::new(channels, encoder, writes)
                    .run()
                    .await?;
            }
            ReadHold(register, count) => {
                read_hold::ReadHold::new(channels, encoder, register, count)
                    .run()
                    .await?;
            }
            Poll(segments) => {
                let segments =
                    segments.unwrap_or_else(|| self.config.scheduler().poll_segments().to_vec());
                poll::Poll::new(channels, encoder, segments).run().await?;
            }
            ReloadDefinition => {
                reload_definition::ReloadDefinition::new(self.config.clone(), self.catalog.clone())
                    .run()
                    .await?;
                return Ok(());
            }
        }

        self.with_stats(|s| s.frames_sent += 1);
        Ok(())
    }

    async fn cloud_receiver(&self) -> Result<()> {
        let mut receiver = self.channels.from_cloud.subscribe();

        loop {
            match receiver.recv().await? {
                link::ChannelData::Shutdown => {
                    info!("Received shutdown signal, printing final statistics:");
                    if let Ok(stats) = self.stats.lock() {
                        stats.print_summary();
                    }
                    break;
                }
                data => {
                    if let Err(err) = self.process_cloud(data).await {
                        warn!("Failed to process cloud message: {}", err);
                    }
                }
            }
        }

        Ok(())
    }

    /// Routes one item from the cloud link to the local broker.
    pub async fn process_cloud(&self, data: link::ChannelData) -> Result<()> {
        use link::ChannelData::*;

        let serial = self.config.device().serial().to_owned();

        match data {
            Telemetry(snapshot) => {
                self.with_stats(|s| s.telemetry_frames += 1);
                self.process_telemetry(&serial, &snapshot)?;
            }
            Alarm(alarm) => {
                self.with_stats(|s| s.alarms += 1);
                if self.config.mqtt().enabled() {
                    let m = mqtt::Message::for_alarm(&serial, &alarm);
                    self.publish_message(m.topic, m.payload, m.retain)?;
                }
            }
            News(news) => {
                self.with_stats(|s| s.news += 1);
                if self.config.mqtt().enabled() {
                    let m = mqtt::Message::for_news(&serial, &news);
                    self.publish_message(m.topic, m.payload, m.retain)?;
                }
            }
            Connected => {
                self.with_stats(|s| s.cloud_connects += 1);
                self.cloud_connected().await?;
            }
            Disconnected => {
                info!("Cloud link disconnected, printing statistics:");
                if let Ok(mut stats) = self.stats.lock() {
                    stats.cloud_disconnects += 1;
                    stats.print_summary();
                }
            }
            Frame(_) | Shutdown => {}
        }

        Ok(())
    }

    fn process_telemetry(&self, serial: &str, snapshot: &TelemetrySnapshot) -> Result<()> {
        let mqtt = self.config.mqtt();
        if !mqtt.enabled() {
            return Ok(());
        }

        for message in mqtt::Message::for_telemetry(serial, snapshot, mqtt.publish_individual())? {
            self.publish_message(message.topic, message.payload, message.retain)?;
        }

        Ok(())
    }

    async fn cloud_connected(&self) -> Result<()> {
        let segments = self.config.scheduler().poll_segments().to_vec();

        info!("Cloud link connected, polling segments {:?}", segments);

        commands::poll::Poll::new(self.channels.clone(), self.encoder.clone(), segments)
            .run()
            .await?;
        self.with_stats(|s| s.frames_sent += 1);

        Ok(())
    }

    fn publish_message(&self, topic: String, payload: String, retain: bool) -> Result<()> {
        let m = mqtt::Message {
            topic,
            payload,
            retain,
        };
        let channel_data = mqtt::ChannelData::Message(m);
        if self.channels.to_mqtt.send(channel_data).is_err() {
            self.with_stats(|s| s.mqtt_errors += 1);
            bail!("send(to_mqtt) failed - channel closed?");
        }
        self.with_stats(|s| s.mqtt_messages_sent += 1);
        Ok(())
    }
}
