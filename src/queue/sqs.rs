//! SQS-compatible queue gateway over HTTP (JSON protocol)

use super::traits::{QueueError, QueueGateway, QueuedMessage, ReceiptHandle};
use async_trait::async_trait;
use ev3_relay_shared::queue_wire::{
    self, DeleteMessageRequest, ReceiveMessageRequest, ReceiveMessageResponse, CONTENT_TYPE,
    DELETE_MESSAGE, RECEIVE_ATTRIBUTES, RECEIVE_MESSAGE, TARGET_HEADER,
};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep_until, timeout, timeout_at, Instant};
use tracing::debug;

/// Default bound on a single DeleteMessage exchange
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for the HTTP queue gateway
#[derive(Debug, Clone)]
pub struct SqsConfig {
    /// Full queue URL; requests are POSTed to it
    pub queue_url: String,
    /// Upper bound on any single HTTP exchange
    pub request_timeout: Duration,
    /// Upper bound on acknowledging (deleting) a message
    pub ack_timeout: Duration,
}

impl Default for SqsConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            request_timeout: Duration::from_secs(30),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

/// Gateway speaking the SQS JSON protocol
pub struct SqsQueue {
    client: Client,
    config: SqsConfig,
}

impl SqsQueue {
    pub fn new(config: SqsConfig) -> Result<Self, QueueError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QueueError::Receive(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn queue_url(&self) -> &str {
        &self.config.queue_url
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        target: &str,
        body: &T,
    ) -> Result<reqwest::Response, String> {
        let response = self
            .client
            .post(&self.config.queue_url)
            .header(TARGET_HEADER, target)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("{} {}", status, detail));
        }

        Ok(response)
    }

    async fn receive_once(&self, budget: Duration) -> Result<Option<QueuedMessage>, QueueError> {
        let request = ReceiveMessageRequest {
            queue_url: &self.config.queue_url,
            max_number_of_messages: 1,
            wait_time_seconds: queue_wire::wait_time_seconds(budget),
            attribute_names: RECEIVE_ATTRIBUTES,
        };

        let response = self
            .post(RECEIVE_MESSAGE, &request)
            .await
            .map_err(QueueError::Receive)?;
        let parsed: ReceiveMessageResponse = response
            .json()
            .await
            .map_err(|e| QueueError::Receive(format!("Bad receive response: {}", e)))?;

        Ok(parsed.messages.into_iter().next().map(|m| QueuedMessage {
            receive_count: m.receive_count(),
            message_id: m.message_id,
            receipt: ReceiptHandle::new(m.receipt_handle),
            body: m.body,
        }))
    }
}

#[async_trait]
impl QueueGateway for SqsQueue {
    async fn receive_next(&self, budget: Duration) -> Result<Option<QueuedMessage>, QueueError> {
        let deadline = Instant::now() + budget;

        // Sub-second budgets are short polls; an empty answer still waits out the budget
        let poll = async {
            let result = self.receive_once(budget).await;
            if matches!(result, Ok(None)) {
                sleep_until(deadline).await;
            }
            result
        };

        match timeout_at(deadline, poll).await {
            Ok(result) => result,
            Err(_) => {
                debug!("[QUEUE] Receive abandoned after {:?}", budget);
                Ok(None)
            }
        }
    }

    async fn acknowledge(&self, message: &QueuedMessage) -> Result<(), QueueError> {
        let request = DeleteMessageRequest {
            queue_url: &self.config.queue_url,
            receipt_handle: message.receipt.as_str(),
        };

        let limit = self.config.ack_timeout;
        match timeout(limit, self.post(DELETE_MESSAGE, &request)).await {
            Ok(result) => result.map(|_| ()).map_err(QueueError::Ack),
            Err(_) => Err(QueueError::Ack(format!(
                "DeleteMessage for {} timed out after {:?}",
                message.message_id, limit
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "SQS"
    }
}
