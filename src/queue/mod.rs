//! Queue gateways the agent drains commands from
//!
//! This module handles:
//! - Receiving one message at a time under a bounded wait
//! - Acknowledging (deleting) a message so it is not redelivered
//! - An HTTP backend for hosted queues and an in-memory backend

mod memory;
mod sqs;
mod traits;

pub use memory::{MemoryQueue, DEFAULT_VISIBILITY_TIMEOUT};
pub use sqs::{SqsConfig, SqsQueue, DEFAULT_ACK_TIMEOUT};
pub use traits::{QueueError, QueueGateway, QueuedMessage, ReceiptHandle};
