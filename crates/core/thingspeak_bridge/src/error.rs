use mqtt_channel::MqttError;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("The topic {topic:?} is bound to more than one field")]
    DuplicateTopicBinding { topic: String },

    #[error("Cannot bind {topic:?} to {field:?}: a channel field is one of field1..field8, latitude, longitude, elevation or status")]
    InvalidField { topic: String, field: String },

    #[error("No topic is bound to a channel field: nothing to subscribe to")]
    NoTopicBinding,

    #[error("Cannot subscribe to {topic:?}: {source}")]
    InvalidTopic {
        topic: String,
        #[source]
        source: MqttError,
    },

    #[error(
        "Invalid flush thresholds: min_interval ({}s) must not exceed max_interval ({}s), and max_interval must be positive",
        .min_interval.as_secs(), .max_interval.as_secs()
    )]
    InvalidFlushThresholds {
        min_interval: Duration,
        max_interval: Duration,
    },

    #[error("Invalid payload on {topic}: expected a number, got {payload:?}")]
    InvalidReadingPayload { topic: String, payload: String },

    #[error(transparent)]
    FromMqttClient(#[from] MqttError),

    #[error(transparent)]
    FromConfig(#[from] bridge_config::ConfigError),

    #[error("Failed to create the HTTP client")]
    FromHttpClient(#[from] reqwest::Error),
}

/// Failure to submit a batch to the destination.
///
/// The batch is lost: it is neither retried nor re-queued.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Failed to send the bulk update: {0}")]
    FromTransport(#[from] reqwest::Error),

    #[error("The bulk update was rejected with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}
