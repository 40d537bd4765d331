use crate::batch::BatchAccumulator;
use crate::batch::BatchFields;
use crate::error::DispatchError;
use crate::flush::delta_t;
use crate::flush::FlushClock;
use async_trait::async_trait;
use clock::Timestamp;
use mockall::automock;
use serde::Serialize;
use tracing::debug;
use tracing::info;

/// A bulk update of a ThingSpeak channel
///
/// ```json
/// {"write_api_key": "XXXX", "updates": [{"field1": 22.0, "field2": 55.0, "delta_t": 16}]}
/// ```
#[derive(Clone, Serialize, PartialEq)]
pub struct BulkUpdate {
    pub write_api_key: String,
    pub updates: Vec<ChannelUpdate>,
}

impl std::fmt::Debug for BulkUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkUpdate")
            .field("write_api_key", &"****")
            .field("updates", &self.updates)
            .finish()
    }
}

/// One entry of a bulk update: field values and seconds elapsed since the previous entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelUpdate {
    #[serde(flatten)]
    pub fields: BatchFields,
    pub delta_t: u64,
}

/// Submit bulk updates to the destination.
#[automock]
#[async_trait]
pub trait BatchSubmitter: Send + Sync {
    /// A single attempt, no retry
    async fn submit(&self, update: &BulkUpdate) -> Result<(), DispatchError>;
}

/// Send batches and start new ones.
pub struct DispatchGateway {
    write_api_key: String,
    submitter: Box<dyn BatchSubmitter>,
}

impl DispatchGateway {
    pub fn new(write_api_key: impl Into<String>, submitter: Box<dyn BatchSubmitter>) -> Self {
        DispatchGateway {
            write_api_key: write_api_key.into(),
            submitter,
        }
    }

    /// Close the pending batch at `now`.
    ///
    /// Returns the bulk update to submit, while the batch is reset and the flush clock
    /// advanced to `now`. Whatever the outcome of the submission, these values are never
    /// sent again.
    pub fn seal(
        &self,
        batch: &mut BatchAccumulator,
        flush_clock: &mut FlushClock,
        now: Timestamp,
    ) -> BulkUpdate {
        let update = ChannelUpdate {
            fields: batch.snapshot(),
            delta_t: delta_t(flush_clock.elapsed(now)),
        };
        batch.reset();
        flush_clock.advance(now);

        BulkUpdate {
            write_api_key: self.write_api_key.clone(),
            updates: vec![update],
        }
    }

    pub async fn submit(&self, update: &BulkUpdate) -> Result<(), DispatchError> {
        for entry in update.updates.iter() {
            info!(
                "Sending {} field(s) with delta_t = {}",
                entry.fields.len(),
                entry.delta_t
            );
        }
        self.submitter.submit(update).await?;
        debug!("Bulk update accepted");
        Ok(())
    }

    /// Seal the pending batch and submit it
    pub async fn flush(
        &self,
        batch: &mut BatchAccumulator,
        flush_clock: &mut FlushClock,
        now: Timestamp,
    ) -> Result<(), DispatchError> {
        let update = self.seal(batch, flush_clock, now);
        self.submit(&update).await
    }
}
