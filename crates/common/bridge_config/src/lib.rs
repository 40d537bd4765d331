//! Configuration of the thingspeak-bridge daemon.
//!
//! The configuration is read once on start from a TOML file.
//! The raw file content is first deserialized into private DTOs,
//! which are then checked and completed with default values.
mod dto;
mod error;

pub use crate::error::ConfigError;

use crate::dto::BridgeConfigDto;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/thingspeak-bridge/thingspeak-bridge.toml";

pub const DEFAULT_MQTT_HOST: &str = "localhost";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_CLIENT_ID: &str = "thingspeak-bridge";

pub const DEFAULT_THINGSPEAK_URL: &str = "https://api.thingspeak.com";

/// ThingSpeak accepts at most one bulk update every 15 seconds on a free channel
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(15);

/// Send incomplete batches once they are 10 minutes old
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(600);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_LOG_LEVEL: tracing::Level = tracing::Level::INFO;

/// The complete, checked, configuration of the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt: MqttSettings,
    pub thingspeak: ThingSpeakSettings,
    pub log_level: tracing::Level,
    pub bindings: Vec<Binding>,
}

#[derive(Clone, Eq, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,

    /// Connect over TLS, trusting the certificates of this file
    pub ca_file: Option<PathBuf>,

    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("ca_file", &self.ca_file)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

#[derive(Clone)]
pub struct ThingSpeakSettings {
    pub channel_id: String,
    pub write_api_key: String,

    /// `<url>/channels/<channel_id>/bulk_update.json`
    pub bulk_update_url: Url,

    pub min_interval: Duration,
    pub max_interval: Duration,
    pub flush_check_interval: Option<Duration>,
    pub request_timeout: Duration,
}

// The write api key is a credential and must not end up in the logs
impl fmt::Debug for ThingSpeakSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThingSpeakSettings")
            .field("channel_id", &self.channel_id)
            .field("write_api_key", &"****")
            .field("bulk_update_url", &self.bulk_update_url.as_str())
            .field("min_interval", &self.min_interval)
            .field("max_interval", &self.max_interval)
            .field("flush_check_interval", &self.flush_check_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// A topic to subscribe to and the channel field its values are sent as
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Binding {
    pub topic: String,
    pub field: String,
}

impl Binding {
    pub fn new(topic: impl Into<String>, field: impl Into<String>) -> Self {
        Binding {
            topic: topic.into(),
            field: field.into(),
        }
    }
}

impl BridgeConfig {
    /// Read and check the configuration file at the given `path`
    pub fn load(path: impl AsRef<Path>) -> Result<BridgeConfig, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => BridgeConfig::from_str(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::ConfigFileNotFound(path.to_path_buf()))
            }
            Err(source) => Err(ConfigError::IOError {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn from_dto(dto: BridgeConfigDto) -> Result<BridgeConfig, ConfigError> {
        if dto.mqtt.password.is_some() && dto.mqtt.username.is_none() {
            return Err(ConfigError::InvalidSetting {
                key: "mqtt.password",
                reason: "a password is only sent along a mqtt.username".to_string(),
            });
        }

        let mqtt = MqttSettings {
            host: dto
                .mqtt
                .host
                .unwrap_or_else(|| DEFAULT_MQTT_HOST.to_string()),
            port: dto.mqtt.port.unwrap_or(DEFAULT_MQTT_PORT),
            client_id: dto
                .mqtt
                .client_id
                .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
            ca_file: dto.mqtt.ca_file,
            username: dto.mqtt.username,
            password: dto.mqtt.password,
        };

        let thingspeak = dto.thingspeak;
        let channel_id = thingspeak.channel_id.ok_or(ConfigError::MissingSetting {
            key: "thingspeak.channel_id",
        })?;
        if channel_id.is_empty() || !channel_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidSetting {
                key: "thingspeak.channel_id",
                reason: format!("{channel_id:?} is not a numeric channel id"),
            });
        }

        let write_api_key = thingspeak
            .write_api_key
            .ok_or(ConfigError::MissingSetting {
                key: "thingspeak.write_api_key",
            })?;
        if write_api_key.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                key: "thingspeak.write_api_key",
                reason: "the key is empty".to_string(),
            });
        }

        let base_url = thingspeak
            .url
            .unwrap_or_else(|| DEFAULT_THINGSPEAK_URL.to_string());
        let bulk_update_url = Url::parse(&format!(
            "{}/channels/{}/bulk_update.json",
            base_url.trim_end_matches('/'),
            channel_id
        ))?;

        let flush_check_interval = match thingspeak.flush_check_interval {
            Some(0) => {
                return Err(ConfigError::InvalidSetting {
                    key: "thingspeak.flush_check_interval",
                    reason: "the interval must be at least 1 second".to_string(),
                })
            }
            other => other.map(Duration::from_secs),
        };

        let thingspeak = ThingSpeakSettings {
            channel_id,
            write_api_key,
            bulk_update_url,
            min_interval: thingspeak
                .min_interval
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_MIN_INTERVAL),
            max_interval: thingspeak
                .max_interval
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_MAX_INTERVAL),
            flush_check_interval,
            request_timeout: thingspeak
                .request_timeout
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };

        let log_level = match dto.log.level {
            None => DEFAULT_LOG_LEVEL,
            Some(name) => tracing::Level::from_str(&name.to_uppercase())
                .map_err(|_| ConfigError::InvalidLogLevel { name })?,
        };

        let bindings = dto
            .bindings
            .into_iter()
            .map(|binding| Binding::new(binding.topic, binding.field))
            .collect();

        Ok(BridgeConfig {
            mqtt,
            thingspeak,
            log_level,
            bindings,
        })
    }
}

impl FromStr for BridgeConfig {
    type Err = ConfigError;

    fn from_str(toml_content: &str) -> Result<Self, Self::Err> {
        let dto: BridgeConfigDto = toml::from_str(toml_content)?;
        BridgeConfig::from_dto(dto)
    }
}
