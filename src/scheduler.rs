use crate::prelude::*;

use crate::coordinator::commands::poll::Poll;
use esy::CommandEncoder;
use std::sync::Arc;
use std::time::Duration;

/// Periodically asks the device for its configured segments.
#[derive(Clone)]
pub struct Scheduler {
    config: ConfigWrapper,
    channels: Channels,
    encoder: Arc<CommandEncoder>,
}

impl Scheduler {
    pub fn new(config: ConfigWrapper, channels: Channels, encoder: Arc<CommandEncoder>) -> Self {
        Self {
            config,
            channels,
            encoder,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let scheduler = self.config.scheduler();

        if !scheduler.enabled() {
            info!("scheduler disabled, skipping");
            return Ok(());
        }

        let mut interval = tokio::time::interval(Duration::from_secs(scheduler.poll_interval()));
        // the first tick completes immediately; connect already polled
        interval.tick().await;

        let mut shutdown = self.channels.to_cloud.subscribe();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let segments = self.config.scheduler().poll_segments().to_vec();
                    if let Err(err) = Poll::new(self.channels.clone(), self.encoder.clone(), segments)
                        .run()
                        .await
                    {
                        warn!("scheduled poll failed: {}", err);
                    }
                }
                message = shutdown.recv() => match message {
                    Ok(esy::link::ChannelData::Shutdown)
                    | Err(broadcast::error::RecvError::Closed) => break,
                    _ => {}
                },
            }
        }

        info!("scheduler exiting");
        Ok(())
    }
}
