use crate::dispatch::BatchSubmitter;
use crate::dispatch::BulkUpdate;
use crate::error::BridgeError;
use crate::error::DispatchError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// POST bulk updates to the `bulk_update.json` endpoint of a ThingSpeak channel
pub struct ThingSpeakClient {
    client: reqwest::Client,
    bulk_update_url: Url,
}

impl ThingSpeakClient {
    pub fn try_new(bulk_update_url: Url, request_timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        Ok(ThingSpeakClient {
            client,
            bulk_update_url,
        })
    }
}

#[async_trait]
impl BatchSubmitter for ThingSpeakClient {
    async fn submit(&self, update: &BulkUpdate) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.bulk_update_url.clone())
            .json(update)
            .send()
            .await?;

        // ThingSpeak answers 202 Accepted
        let status = response.status();
        if status.is_success() {
            debug!("ThingSpeak response: {}", status);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DispatchError::Rejected { status, body })
        }
    }
}
