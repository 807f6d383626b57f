use crate::prelude::*;

use crate::esy::profile::{CandidateRule, RescaleRule};
use crate::esy::{DataLengthWidth, Variant, VariantProfile};

use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub device: Device,
    #[serde(default = "Config::default_cloud")]
    pub cloud: Cloud,
    pub mqtt: Mqtt,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub scheduler: Scheduler,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    #[serde(default)]
    pub read_only: bool,
}

// Device {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    pub serial: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub config_id: u32,
}
impl Device {
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config_id(&self) -> u32 {
        self.config_id
    }
} // }}}

// Cloud {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Cloud {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_cloud_host")]
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
}
impl Cloud {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| "sunhome-bridge".to_string())
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,

    pub publish_individual: Option<bool>,
}
impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn publish_individual(&self) -> bool {
        self.publish_individual != Some(false)
    }
} // }}}

// Protocol {{{
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Protocol {
    #[serde(default)]
    pub variant: Variant,
    pub definition_file: Option<String>,
    pub data_length_width: Option<DataLengthWidth>,
    pub power_candidates: Option<CandidateRule>,
    pub rescale: Option<Vec<RescaleRule>>,
}
impl Protocol {
    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn definition_file(&self) -> &Option<String> {
        &self.definition_file
    }

    /// The variant's preset with any configured overrides applied.
    pub fn profile(&self) -> VariantProfile {
        let mut profile = VariantProfile::for_variant(self.variant);
        if let Some(width) = self.data_length_width {
            profile = profile.with_data_length_width(width);
        }
        if let Some(rule) = self.power_candidates {
            profile = profile.with_power_candidates(rule);
        }
        if let Some(rescale) = &self.rescale {
            profile = profile.with_rescale(rescale.clone());
        }
        profile
    }
} // }}}

// Scheduler {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Scheduler {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "Config::default_poll_segments")]
    pub poll_segments: Vec<u16>,
}
impl Default for Scheduler {
    fn default() -> Self {
        Self {
            enabled: Config::default_enabled(),
            poll_interval: Config::default_poll_interval(),
            poll_segments: Config::default_poll_segments(),
        }
    }
}
impl Scheduler {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_interval
    }

    pub fn poll_segments(&self) -> &[u16] {
        &self.poll_segments
    }
} // }}}

#[derive(Clone)]
pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        Ok(Self::from_config(Config::new(file)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    fn config(&self) -> MutexGuard<'_, Config> {
        self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn device(&self) -> Device {
        self.config().device.clone()
    }

    pub fn cloud(&self) -> Cloud {
        self.config().cloud.clone()
    }

    pub fn mqtt(&self) -> Mqtt {
        self.config().mqtt.clone()
    }

    pub fn protocol(&self) -> Protocol {
        self.config().protocol.clone()
    }

    pub fn scheduler(&self) -> Scheduler {
        self.config().scheduler.clone()
    }

    pub fn loglevel(&self) -> String {
        self.config().loglevel.clone()
    }

    pub fn read_only(&self) -> bool {
        self.config().read_only
    }

    pub fn set_definition_file(&self, file: Option<String>) {
        self.config().protocol.definition_file = file;
    }

    /// Does a command topic's target (`all` or a serial) mean this device?
    pub fn is_target(&self, target: &mqtt::Target) -> bool {
        match target {
            mqtt::Target::All => true,
            mqtt::Target::Serial(serial) => serial == self.config().device.serial(),
        }
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| file_error!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;

        info!("Configuration loaded successfully:");
        info!("  Device: {}", config.device.serial);
        info!("    User ID: {}", config.device.user_id);
        info!("    Config ID: {}", config.device.config_id);

        info!("  Cloud: {}", if config.cloud.enabled { "enabled" } else { "disabled" });
        if config.cloud.enabled {
            info!("    Host: {}", config.cloud.host);
            info!("    Port: {}", config.cloud.port);
        }

        info!("  MQTT: {}", if config.mqtt.enabled { "enabled" } else { "disabled" });
        if config.mqtt.enabled {
            info!("    Host: {}", config.mqtt.host);
            info!("    Port: {}", config.mqtt.port);
            info!("    Namespace: {}", config.mqtt.namespace);
        }

        info!("  Protocol variant: {}", config.protocol.variant);
        if let Some(file) = &config.protocol.definition_file {
            info!("    Definition file: {}", file);
        }
        if let Some(width) = &config.protocol.data_length_width {
            info!("    Data length width: {:?}", width);
        }
        if let Some(rule) = &config.protocol.power_candidates {
            info!("    Power candidates: {:?}", rule);
        }

        info!("  Scheduler: {}", if config.scheduler.enabled { "enabled" } else { "disabled" });
        if config.scheduler.enabled {
            info!("    Poll interval: {}s", config.scheduler.poll_interval);
            info!("    Poll segments: {:?}", config.scheduler.poll_segments);
        }

        info!("  Global Read Only: {}", config.read_only);
        info!("  Log Level: {}", config.loglevel);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.device.serial.is_empty() {
            bail!("device.serial cannot be empty");
        }
        if !self.device.user_id.is_empty() && !self.device.user_id.bytes().all(|b| b.is_ascii_digit()) {
            warn!(
                "device.user_id {} is not numeric, frames will carry a zero identifier",
                self.device.user_id
            );
        }

        if self.cloud.enabled {
            if self.cloud.port == 0 {
                bail!("cloud.port must be between 1 and 65535");
            }
            if self.cloud.host.is_empty() {
                return Err(file_error!("cloud host cannot be empty"));
            }
        }

        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                return Err(file_error!("MQTT host cannot be empty"));
            }
        }

        if self.scheduler.enabled && self.scheduler.poll_interval == 0 {
            bail!("scheduler.poll_interval must be at least 1");
        }

        if let Some(rescale) = &self.protocol.rescale {
            for rule in rescale {
                if rule.factor == 0.0 {
                    bail!("protocol.rescale factor for {} cannot be 0", rule.key);
                }
            }
        }

        Ok(())
    }

    fn default_cloud() -> Cloud {
        Cloud {
            enabled: Self::default_enabled(),
            host: Self::default_cloud_host(),
            port: Self::default_mqtt_port(),
            username: None,
            password: None,
            client_id: None,
        }
    }

    fn default_cloud_host() -> String {
        "abroadtcp.esysunhome.com".to_string()
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "sunhome".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_poll_interval() -> u64 {
        15
    }

    fn default_poll_segments() -> Vec<u16> {
        vec![0, 1, 3, 6]
    }
}
