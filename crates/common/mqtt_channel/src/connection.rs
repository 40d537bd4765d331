use crate::Config;
use crate::Message;
use crate::MqttError;
use crate::TopicFilter;
use futures::channel::mpsc;
use rumqttc::AsyncClient;
use rumqttc::ConnectionError;
use rumqttc::Event;
use rumqttc::EventLoop;
use rumqttc::Incoming;
use rumqttc::Outgoing;
use rumqttc::Packet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use tracing::info;

/// A connection to some MQTT server
pub struct Connection {
    /// The channel of the input messages received by this connection.
    pub received: mpsc::UnboundedReceiver<Message>,

    /// The channel of the errors received by this connection.
    pub errors: mpsc::UnboundedReceiver<MqttError>,
}

impl Connection {
    /// Connect the broker and subscribe the `config.subscriptions` topics.
    ///
    /// Returns once the subscriptions have been acknowledged.
    /// Until then, the connection errors are logged and the connection retried.
    /// The subscriptions are renewed on each re-connection.
    pub async fn new(config: &Config) -> Result<Connection, MqttError> {
        let (received_sender, received_receiver) = mpsc::unbounded();
        let (error_sender, error_receiver) = mpsc::unbounded();

        let (mqtt_client, event_loop) =
            Connection::open(config, received_sender.clone(), error_sender.clone()).await?;
        tokio::spawn(Connection::receiver_loop(
            mqtt_client,
            config.subscriptions.clone(),
            event_loop,
            received_sender,
            error_sender,
        ));

        Ok(Connection {
            received: received_receiver,
            errors: error_receiver,
        })
    }

    async fn open(
        config: &Config,
        message_sender: mpsc::UnboundedSender<Message>,
        error_sender: mpsc::UnboundedSender<MqttError>,
    ) -> Result<(AsyncClient, EventLoop), MqttError> {
        let mqtt_options = config.mqtt_options()?;
        let (mqtt_client, mut event_loop) = AsyncClient::new(mqtt_options, config.queue_capacity);

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(
                        target: "MQTT",
                        "Connected to {}:{}", config.host, config.port
                    );
                    if config.subscriptions.is_empty() {
                        break;
                    }
                    Connection::subscribe(&mqtt_client, &config.subscriptions).await?;
                }

                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    break;
                }

                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    // Messages can be received before a sub ack
                    let _ = message_sender.unbounded_send(msg.into());
                }

                Err(err) => {
                    // No one listens to the error channel before the connection is returned
                    error!(
                        target: "MQTT",
                        "Failed to connect to {}:{}: {}", config.host, config.port, err
                    );
                    let delay = Connection::pause_on_error(&err);
                    let _ = error_sender.unbounded_send(err.into());
                    if delay {
                        Connection::do_pause().await;
                    }
                }
                _ => (),
            }
        }

        Ok((mqtt_client, event_loop))
    }

    async fn receiver_loop(
        mqtt_client: AsyncClient,
        subscriptions: TopicFilter,
        mut event_loop: EventLoop,
        message_sender: mpsc::UnboundedSender<Message>,
        error_sender: mpsc::UnboundedSender<MqttError>,
    ) {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    if message_sender.unbounded_send(msg.into()).is_err() {
                        // The receiving end has been dropped
                        break;
                    }
                }

                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    // The broker forgets the subscriptions of a clean session on re-connect
                    if !ack.session_present && !subscriptions.is_empty() {
                        info!(target: "MQTT", "Re-connected, renewing the subscriptions");
                        if let Err(err) = Connection::subscribe(&mqtt_client, &subscriptions).await
                        {
                            let _ = error_sender.unbounded_send(err);
                        }
                    }
                }

                Ok(Event::Incoming(Incoming::Disconnect))
                | Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    // The connection has been closed
                    break;
                }

                Err(err) => {
                    let delay = Connection::pause_on_error(&err);
                    let _ = error_sender.unbounded_send(err.into());
                    if delay {
                        Connection::do_pause().await;
                    }
                }
                _ => (),
            }
        }

        // No more messages will be forwarded to the client
        message_sender.close_channel();
        error_sender.close_channel();
    }

    async fn subscribe(
        mqtt_client: &AsyncClient,
        subscriptions: &TopicFilter,
    ) -> Result<(), MqttError> {
        for filter in subscriptions.filters() {
            debug!(target: "MQTT", "Subscribing to {}", filter.path);
        }
        mqtt_client.subscribe_many(subscriptions.filters()).await?;
        Ok(())
    }

    pub(crate) fn pause_on_error(err: &ConnectionError) -> bool {
        matches!(
            err,
            ConnectionError::Io(_)
                | ConnectionError::MqttState(_)
                | ConnectionError::ConnectionRefused(_)
                | ConnectionError::NetworkTimeout
        )
    }

    pub(crate) async fn do_pause() {
        sleep(Duration::from_secs(1)).await;
    }
}
