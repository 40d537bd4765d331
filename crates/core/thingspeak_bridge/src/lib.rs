//! Forward sensor values published on the local MQTT bus to a ThingSpeak channel.
//!
//! Each subscribed topic is bound to a channel field. The latest value of each field
//! is accumulated into a batch, which is sent to the ThingSpeak bulk-update endpoint:
//! - as soon as all the fields have a value and the minimum interval between two
//!   updates has elapsed,
//! - or, complete or not, once the maximum interval has elapsed.
//!
//! A batch that fails to be sent is discarded.
mod batch;
mod bridge;
mod dispatch;
mod error;
mod flush;
mod http;
mod service;
mod topic_map;

pub use crate::batch::BatchAccumulator;
pub use crate::batch::BatchFields;
pub use crate::bridge::Bridge;
pub use crate::bridge::Reading;
pub use crate::dispatch::BatchSubmitter;
pub use crate::dispatch::BulkUpdate;
pub use crate::dispatch::ChannelUpdate;
pub use crate::dispatch::DispatchGateway;
pub use crate::dispatch::MockBatchSubmitter;
pub use crate::error::BridgeError;
pub use crate::error::DispatchError;
pub use crate::flush::delta_t;
pub use crate::flush::should_flush;
pub use crate::flush::FlushClock;
pub use crate::flush::FlushPolicy;
pub use crate::http::ThingSpeakClient;
pub use crate::service::BridgeService;
pub use crate::topic_map::TopicMap;
