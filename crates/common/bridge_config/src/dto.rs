//! Crate-private plain-old data-type used for deserialization.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BridgeConfigDto {
    /// Connection to the local MQTT broker, the [mqtt] section
    #[serde(default)]
    pub(crate) mqtt: MqttConfigDto,

    /// Destination channel, the [thingspeak] section
    #[serde(default)]
    pub(crate) thingspeak: ThingSpeakConfigDto,

    #[serde(default)]
    pub(crate) log: LogConfigDto,

    /// The [[bindings]] array, one entry per subscribed topic
    #[serde(default)]
    pub(crate) bindings: Vec<BindingDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MqttConfigDto {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) client_id: Option<String>,

    /// PEM file of the certificates trusted to authenticate the broker over TLS
    pub(crate) ca_file: Option<PathBuf>,

    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ThingSpeakConfigDto {
    pub(crate) channel_id: Option<String>,
    pub(crate) write_api_key: Option<String>,
    pub(crate) url: Option<String>,

    /// Seconds
    pub(crate) min_interval: Option<u64>,

    /// Seconds
    pub(crate) max_interval: Option<u64>,

    /// Seconds, no periodic check when absent
    pub(crate) flush_check_interval: Option<u64>,

    /// Seconds
    pub(crate) request_timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LogConfigDto {
    pub(crate) level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BindingDto {
    pub(crate) topic: String,
    pub(crate) field: String,
}
