//! A library to connect the local MQTT bus and receive the messages published on subscribed topics.
//!
//! ```no_run
//! use mqtt_channel::{Config, Connection, MqttError, StreamExt, TopicFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MqttError> {
//!     // A client subscribes to its topics on connect
//!     let mut topics = TopicFilter::empty();
//!     topics.add("sensors/temp")?;
//!     let config = Config::default().with_subscriptions(topics);
//!     let mut con = Connection::new(&config).await?;
//!
//!     // Messages are received from the subscriptions on the received channel
//!     let message = con.received.next().await.ok_or(MqttError::ReadOnClosedConnection)?;
//!     println!("{}", message.payload_str()?);
//!
//!     // The connection is closed on drop
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]

mod config;
mod connection;
mod errors;
mod messages;
mod topics;

pub use config::*;
pub use connection::*;
pub use errors::*;
pub use messages::*;
pub use topics::*;

pub use futures::channel::mpsc::UnboundedReceiver;
pub use futures::Stream;
pub use futures::StreamExt;

pub use rumqttc::QoS;
