pub mod channels;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod esy;
pub mod mqtt;
pub mod options;
pub mod prelude;
pub mod scheduler;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;

use crate::coordinator::Coordinator;
use crate::esy::link::Link;
use crate::esy::{CommandEncoder, FrameDecoder, ProtocolDefinition, RegisterCatalog, VariantProfile};
use crate::mqtt::Mqtt;
use crate::options::Options;
use crate::scheduler::Scheduler;

use std::sync::Arc;
use std::time::Duration;

/// Everything that runs for the lifetime of the bridge.
#[derive(Clone)]
pub struct Components {
    pub coordinator: Coordinator,
    pub scheduler: Scheduler,
    pub link: Link,
    pub mqtt: Mqtt,
    pub channels: Channels,
}

impl Components {
    /// Coordinator goes first so nothing new is routed while the
    /// connections wind down.
    pub fn stop(&self) {
        info!("Stopping all components...");

        self.coordinator.stop();
        self.link.stop();
        self.mqtt.stop();
    }
}

// Returns true when RUST_LOG is in charge of the level.
fn init_logging() -> bool {
    let from_env = std::env::var_os("RUST_LOG").is_some();

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if !from_env {
        // let the config's loglevel pick the effective level later
        builder.filter_level(log::LevelFilter::Trace);
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();

    if !from_env {
        log::set_max_level(log::LevelFilter::Info);
    }

    from_env
}

fn apply_loglevel(level: &str) {
    match level.parse::<log::LevelFilter>() {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => warn!("unknown loglevel {}, staying at info", level),
    }
}

/// The register catalog for the configured variant, replaced by the
/// definition file when one is set.
pub fn build_catalog(config: &ConfigWrapper) -> Result<RegisterCatalog> {
    let protocol = config.protocol();
    let catalog = RegisterCatalog::for_variant(protocol.variant());

    if let Some(file) = protocol.definition_file() {
        let definition = ProtocolDefinition::from_file(file)?;
        catalog.replace(&definition)?;
    }

    Ok(catalog)
}

pub fn build_encoder(config: &ConfigWrapper, profile: &VariantProfile) -> CommandEncoder {
    let device = config.device();

    CommandEncoder::new(device.user_id())
        .with_config_id(device.config_id())
        .with_width(profile.data_length_width)
}

async fn runtime_limit(runtime: Option<u64>) {
    match runtime {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => futures::future::pending().await,
    }
}

pub async fn app(mut shutdown_rx: broadcast::Receiver<()>, options: Options) -> Result<()> {
    let from_env = init_logging();

    info!(
        "sunhome-bridge {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );

    let config = ConfigWrapper::new(options.config_file.clone())?;
    if !from_env {
        apply_loglevel(&config.loglevel());
    }

    info!("Initializing channels...");
    let channels = Channels::new();

    info!("Initializing codec...");
    let profile = config.protocol().profile();
    let catalog = Arc::new(build_catalog(&config)?);
    info!(
        "  {} variant, {} registers mapped",
        profile.variant,
        catalog.snapshot().len()
    );
    let decoder = Arc::new(FrameDecoder::new(catalog.clone(), profile.clone()));
    let encoder = Arc::new(build_encoder(&config, &profile));

    info!("Initializing components...");
    let components = Components {
        coordinator: Coordinator::new(
            config.clone(),
            channels.clone(),
            catalog.clone(),
            encoder.clone(),
        ),
        scheduler: Scheduler::new(config.clone(), channels.clone(), encoder.clone()),
        link: Link::new(config.clone(), channels.clone(), decoder),
        mqtt: Mqtt::new(config.clone(), channels.clone()),
        channels: channels.clone(),
    };

    let coordinator = components.coordinator.clone();
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator.start().await {
            error!("Coordinator task failed: {}", e);
        }
    });

    let mqtt = components.mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt.start().await {
            error!("MQTT task failed: {}", e);
        }
    });

    let scheduler = components.scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            error!("Scheduler task failed: {}", e);
        }
    });

    // give the coordinator a chance to subscribe before the link connects
    tokio::task::yield_now().await;

    let link = components.link.clone();
    let link_handle = tokio::spawn(async move {
        if let Err(e) = link.start().await {
            error!("Cloud link task failed: {}", e);
        }
    });

    tokio::select! {
        _ = shutdown_rx.recv() => info!("Shutdown signal received, stopping components..."),
        _ = runtime_limit(options.runtime) => info!("Runtime limit reached, stopping components..."),
    }

    components.stop();

    for (name, handle) in [
        ("coordinator", coordinator_handle),
        ("mqtt", mqtt_handle),
        ("scheduler", scheduler_handle),
        ("cloud link", link_handle),
    ] {
        if let Err(e) = handle.await {
            error!("Error waiting for {} task: {}", name, e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}
