//! Queue gateway abstraction for pluggable queue backends

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a queue backend
///
/// Both kinds are transient from the dispatch loop's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Acknowledge failed: {0}")]
    Ack(String),
}

/// Opaque token the queue needs to remove a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One message handed out by the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub message_id: String,
    pub receipt: ReceiptHandle,
    /// Encoded canonical command
    pub body: String,
    /// How many times the queue has delivered this message
    pub receive_count: u32,
}

/// A durable FIFO queue the agent drains one message at a time
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// Fetch at most one message, waiting no longer than `budget`
    ///
    /// Returns `Ok(None)` when nothing arrived in time. An abandoned receive is
    /// not cancelled upstream; the queue's own redelivery policy applies.
    async fn receive_next(&self, budget: Duration) -> Result<Option<QueuedMessage>, QueueError>;

    /// Remove a received message so it is not redelivered
    async fn acknowledge(&self, message: &QueuedMessage) -> Result<(), QueueError>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}
