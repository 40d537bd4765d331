use crate::batch::BatchAccumulator;
use crate::dispatch::BulkUpdate;
use crate::dispatch::DispatchGateway;
use crate::error::BridgeError;
use crate::flush::FlushClock;
use crate::flush::FlushPolicy;
use crate::topic_map::TopicMap;
use clock::Clock;
use clock::Timestamp;
use futures::Stream;
use futures::StreamExt;
use mqtt_channel::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// A sensor value received on a topic
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub topic: String,
    pub value: f64,
    pub arrival_time: Timestamp,
}

impl Reading {
    pub fn new(topic: impl Into<String>, value: f64, arrival_time: Timestamp) -> Self {
        Reading {
            topic: topic.into(),
            value,
            arrival_time,
        }
    }

    /// Decode an MQTT message which payload is a number, as `21.5`.
    ///
    /// Surrounding whitespace is ignored.
    pub fn parse(message: &Message, arrival_time: Timestamp) -> Result<Reading, BridgeError> {
        let topic = &message.topic.name;
        let invalid_payload = || BridgeError::InvalidReadingPayload {
            topic: topic.clone(),
            payload: payload_excerpt(message.payload_bytes()),
        };

        let payload = message.payload_str().map_err(|_| invalid_payload())?;
        let value = payload
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid_payload())?;

        Ok(Reading::new(topic, value, arrival_time))
    }
}

/// An invalid payload is reported with at most that many chars
const PAYLOAD_EXCERPT_LEN: usize = 80;

fn payload_excerpt(bytes: &[u8]) -> String {
    // A char is at most 4 bytes long
    let max_len = PAYLOAD_EXCERPT_LEN * 4;
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(max_len)]);
    let mut excerpt: String = head.chars().take(PAYLOAD_EXCERPT_LEN).collect();
    if bytes.len() > max_len || head.chars().count() > PAYLOAD_EXCERPT_LEN {
        excerpt.push_str("...");
    }
    excerpt
}

/// Aggregate the readings received on MQTT into batches sent to ThingSpeak.
///
/// The bridge owns the pending batch and the flush clock:
/// all the updates go through `&mut self` from a single task.
pub struct Bridge {
    topic_map: TopicMap,
    batch: BatchAccumulator,
    policy: FlushPolicy,
    flush_clock: FlushClock,
    gateway: DispatchGateway,
    clock: Arc<dyn Clock>,
    flush_check_interval: Option<Duration>,
}

impl Bridge {
    /// The flush clock starts now
    pub fn new(
        topic_map: TopicMap,
        policy: FlushPolicy,
        gateway: DispatchGateway,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let flush_clock = FlushClock::new(clock.now());
        Bridge {
            topic_map,
            batch: BatchAccumulator::new(),
            policy,
            flush_clock,
            gateway,
            clock,
            flush_check_interval: None,
        }
    }

    /// Also check the flush conditions periodically and not only when a reading is received.
    ///
    /// Without this check, a batch is never sent while no reading is received.
    pub fn with_flush_check_interval(self, interval: Option<Duration>) -> Self {
        Self {
            flush_check_interval: interval,
            ..self
        }
    }

    pub fn batch(&self) -> &BatchAccumulator {
        &self.batch
    }

    pub fn flush_clock(&self) -> &FlushClock {
        &self.flush_clock
    }

    /// Process a reading, returning the batch to send if this reading triggers a flush.
    ///
    /// A reading received on an unbound topic is ignored.
    /// Otherwise its value is added to the batch and the flush policy is evaluated
    /// at the reading arrival time. On flush, the returned batch is no more pending:
    /// the next reading starts a new batch.
    pub fn process(&mut self, reading: Reading) -> Option<BulkUpdate> {
        let Some(field) = self.topic_map.lookup(&reading.topic) else {
            debug!("Ignoring a reading on an unbound topic: {}", reading.topic);
            return None;
        };

        self.batch.append(field, reading.value);
        self.check_flush(reading.arrival_time)
    }

    /// Evaluate the flush policy without a new reading.
    ///
    /// An empty batch is never flushed, as a bulk update requires at least one value.
    pub fn tick(&mut self, now: Timestamp) -> Option<BulkUpdate> {
        if self.batch.is_empty() {
            return None;
        }
        self.check_flush(now)
    }

    fn check_flush(&mut self, now: Timestamp) -> Option<BulkUpdate> {
        let elapsed = self.flush_clock.elapsed(now);
        if self.policy.should_flush(self.batch.field_count(), elapsed) {
            Some(self.gateway.seal(&mut self.batch, &mut self.flush_clock, now))
        } else {
            None
        }
    }

    /// Process an MQTT message, submitting the pending batch when due.
    pub async fn on_message(&mut self, message: Message) {
        let arrival_time = self.clock.now();
        match Reading::parse(&message, arrival_time) {
            Ok(reading) => {
                if let Some(update) = self.process(reading) {
                    self.dispatch(update).await;
                }
            }
            Err(err) => warn!("Dropping reading: {}", err),
        }
    }

    pub async fn on_tick(&mut self) {
        let now = self.clock.now();
        if let Some(update) = self.tick(now) {
            self.dispatch(update).await;
        }
    }

    async fn dispatch(&self, update: BulkUpdate) {
        if let Err(err) = self.gateway.submit(&update).await {
            error!("Batch discarded: {}", err);
        }
    }

    /// Process the messages until the stream is closed.
    pub async fn run(
        &mut self,
        mut messages: impl Stream<Item = Message> + Unpin,
    ) -> Result<(), BridgeError> {
        let mut ticker = self.flush_check_interval.map(|period| {
            info!("Checking the flush conditions every {:?}", period);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                message = messages.next() => match message {
                    Some(message) => self.on_message(message).await,
                    None => break,
                },
                _ = next_tick(&mut ticker) => self.on_tick().await,
            }
        }

        warn!("MQTT message channel closed. Can not proceed");
        Err(mqtt_channel::MqttError::ReadOnClosedConnection.into())
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => futures::future::pending().await,
    }
}
