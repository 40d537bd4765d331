use crate::bridge::Bridge;
use crate::dispatch::DispatchGateway;
use crate::error::BridgeError;
use crate::flush::FlushPolicy;
use crate::http::ThingSpeakClient;
use crate::topic_map::TopicMap;
use bridge_config::BridgeConfig;
use clock::WallClock;
use futures::StreamExt;
use mqtt_channel::QoS;
use mqtt_channel::TopicFilter;
use std::sync::Arc;
use tracing::error;
use tracing::info;
use tracing::instrument;

/// The bridge service: MQTT in, ThingSpeak out
#[derive(Debug)]
pub struct BridgeService {
    config: BridgeConfig,
}

impl BridgeService {
    pub fn new(config: BridgeConfig) -> Self {
        BridgeService { config }
    }

    /// Build the bridge and the topics it subscribes to.
    ///
    /// Fails on an invalid binding or flush thresholds.
    pub fn build(&self) -> Result<(Bridge, TopicFilter), BridgeError> {
        let settings = &self.config.thingspeak;

        let topic_map = TopicMap::try_new(self.config.bindings.iter().cloned())?;
        let policy = FlushPolicy::try_new(
            topic_map.expected_field_count(),
            settings.min_interval,
            settings.max_interval,
        )?;
        let subscriptions = topic_map.subscriptions().with_qos(QoS::AtMostOnce);

        let client =
            ThingSpeakClient::try_new(settings.bulk_update_url.clone(), settings.request_timeout)?;
        let gateway = DispatchGateway::new(settings.write_api_key.clone(), Box::new(client));

        let bridge = Bridge::new(topic_map, policy, gateway, Arc::new(WallClock))
            .with_flush_check_interval(settings.flush_check_interval);

        Ok((bridge, subscriptions))
    }

    /// A named clean session, subscribed to the bound topics
    pub fn mqtt_config(
        &self,
        subscriptions: TopicFilter,
    ) -> Result<mqtt_channel::Config, BridgeError> {
        let mqtt = &self.config.mqtt;
        let mut mqtt_config = mqtt_channel::Config::new(mqtt.host.clone(), mqtt.port)
            .with_session_name(mqtt.client_id.clone())
            .with_clean_session(true)
            .with_subscriptions(subscriptions);

        if let Some(username) = &mqtt.username {
            let password = mqtt.password.clone().unwrap_or_default();
            mqtt_config = mqtt_config.with_credentials(username.clone(), password);
        }
        if let Some(ca_file) = &mqtt.ca_file {
            mqtt_config = mqtt_config.with_cafile(ca_file)?;
        }

        Ok(mqtt_config)
    }

    #[instrument(name = "bridge", skip(self))]
    pub async fn run(&self) -> Result<(), BridgeError> {
        let (mut bridge, subscriptions) = self.build()?;

        info!(
            "Forwarding {} topic(s) to ThingSpeak channel {}",
            self.config.bindings.len(),
            self.config.thingspeak.channel_id
        );
        for binding in self.config.bindings.iter() {
            info!("{} -> {}", binding.topic, binding.field);
        }

        let mqtt_config = self.mqtt_config(subscriptions)?;
        let connection = mqtt_channel::Connection::new(&mqtt_config).await?;

        let mut errors = connection.errors;
        tokio::spawn(async move {
            while let Some(error) = errors.next().await {
                error!("MQTT error: {}", error);
            }
        });

        bridge.run(connection.received).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mqtt_channel::MqttError;
    use std::str::FromStr;

    fn config(toml: &str) -> BridgeConfig {
        BridgeConfig::from_str(toml).unwrap()
    }

    #[test]
    fn the_bridge_subscribes_to_the_bound_topics() {
        let service = BridgeService::new(config(
            r#"
[thingspeak]
channel_id = "42"
write_api_key = "KEY"

[[bindings]]
topic = "sensors/temp"
field = "field1"
"#,
        ));

        let (bridge, subscriptions) = service.build().unwrap();

        assert_eq!(subscriptions.patterns, vec!["sensors/temp".to_string()]);
        assert!(bridge.batch().is_empty());
    }

    #[test]
    fn inverted_thresholds_prevent_the_start() {
        let service = BridgeService::new(config(
            r#"
[thingspeak]
channel_id = "42"
write_api_key = "KEY"
min_interval = 60
max_interval = 30

[[bindings]]
topic = "sensors/temp"
field = "field1"
"#,
        ));

        assert_matches!(
            service.build().map(|_| ()),
            Err(BridgeError::InvalidFlushThresholds { .. })
        );
    }

    #[test]
    fn duplicate_bindings_prevent_the_start() {
        let service = BridgeService::new(config(
            r#"
[thingspeak]
channel_id = "42"
write_api_key = "KEY"

[[bindings]]
topic = "sensors/temp"
field = "field1"

[[bindings]]
topic = "sensors/temp"
field = "field2"
"#,
        ));

        assert_matches!(
            service.build().map(|_| ()),
            Err(BridgeError::DuplicateTopicBinding { .. })
        );
    }

    #[test]
    fn a_binding_to_an_unknown_field_prevents_the_start() {
        let service = BridgeService::new(config(
            r#"
[thingspeak]
channel_id = "42"
write_api_key = "KEY"

[[bindings]]
topic = "sensors/temp"
field = "delta_t"
"#,
        ));

        assert_matches!(
            service.build().map(|_| ()),
            Err(BridgeError::InvalidField { field, .. }) if field == "delta_t"
        );
    }

    #[test]
    fn the_mqtt_session_is_authenticated_with_the_configured_credentials() {
        let service = BridgeService::new(config(
            r#"
[mqtt]
host = "broker.local"
port = 1884
username = "greenhouse"

[thingspeak]
channel_id = "42"
write_api_key = "KEY"

[[bindings]]
topic = "sensors/temp"
field = "field1"
"#,
        ));

        let (_, subscriptions) = service.build().unwrap();
        let mqtt_config = service.mqtt_config(subscriptions).unwrap();

        assert_eq!(mqtt_config.host, "broker.local");
        assert_eq!(mqtt_config.port, 1884);
        assert_eq!(
            mqtt_config.session_name.as_deref(),
            Some("thingspeak-bridge")
        );
        assert!(mqtt_config.clean_session);
        assert_eq!(
            mqtt_config.subscriptions.patterns,
            vec!["sensors/temp".to_string()]
        );
        let credentials = mqtt_config.credentials.unwrap();
        assert_eq!(credentials.username, "greenhouse");
        assert_eq!(credentials.password, "");
        assert!(mqtt_config.cert_store.is_none());
    }

    #[test]
    fn an_unreadable_ca_file_prevents_the_start() {
        let service = BridgeService::new(config(
            r#"
[mqtt]
ca_file = "/non/existent/ca.pem"

[thingspeak]
channel_id = "42"
write_api_key = "KEY"

[[bindings]]
topic = "sensors/temp"
field = "field1"
"#,
        ));

        let (_, subscriptions) = service.build().unwrap();

        assert_matches!(
            service.mqtt_config(subscriptions),
            Err(BridgeError::FromMqttClient(MqttError::InvalidCaFile { .. }))
        );
    }
}
