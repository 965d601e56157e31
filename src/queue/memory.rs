//! In-process queue with visibility-timeout redelivery
//!
//! Behaves like a hosted queue: a received message becomes invisible until it
//! is acknowledged or its visibility timeout lapses, after which it is handed
//! out again under a new receipt handle.

use super::traits::{QueueError, QueueGateway, QueuedMessage, ReceiptHandle};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::debug;
use uuid::Uuid;

/// Default time a received message stays hidden before redelivery
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct StoredMessage {
    seq: u64,
    message_id: String,
    body: String,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: StoredMessage,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    visible: VecDeque<StoredMessage>,
    in_flight: HashMap<ReceiptHandle, InFlight>,
}

impl QueueState {
    /// Move lapsed in-flight messages back to the head of the queue, oldest first
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<ReceiptHandle> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(r, _)| r.clone())
            .collect();

        let mut returning: Vec<StoredMessage> = expired
            .iter()
            .filter_map(|r| self.in_flight.remove(r))
            .map(|f| f.message)
            .collect();

        returning.sort_by(|a, b| b.seq.cmp(&a.seq));
        for message in returning {
            debug!("[QUEUE] Message {} visible again", message.message_id);
            self.visible.push_front(message);
        }
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.visible_at).min()
    }
}

/// Queue held in memory, shared by a producer and the dispatch loop
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    /// Append a message and return its id
    pub async fn send(&self, body: impl Into<String>) -> String {
        let mut state = self.state.lock().await;
        let message_id = Uuid::new_v4().to_string();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.visible.push_back(StoredMessage {
            seq,
            message_id: message_id.clone(),
            body: body.into(),
            receive_count: 0,
        });
        drop(state);

        self.notify.notify_one();
        message_id
    }

    /// Messages waiting to be received
    pub async fn visible_count(&self) -> usize {
        self.state.lock().await.visible.len()
    }

    /// Messages received but not yet acknowledged
    pub async fn in_flight_count(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueGateway for MemoryQueue {
    async fn receive_next(&self, budget: Duration) -> Result<Option<QueuedMessage>, QueueError> {
        let deadline = Instant::now() + budget;

        loop {
            // Register interest before checking so a concurrent send is not missed
            let notified = self.notify.notified();

            let next_redelivery = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.requeue_expired(now);

                if let Some(mut message) = state.visible.pop_front() {
                    message.receive_count += 1;
                    let receipt = ReceiptHandle::new(Uuid::new_v4().to_string());
                    let queued = QueuedMessage {
                        message_id: message.message_id.clone(),
                        receipt: receipt.clone(),
                        body: message.body.clone(),
                        receive_count: message.receive_count,
                    };
                    state.in_flight.insert(
                        receipt,
                        InFlight {
                            message,
                            visible_at: now + self.visibility_timeout,
                        },
                    );
                    return Ok(Some(queued));
                }

                state.next_visible_at()
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake_at = next_redelivery.map_or(deadline, |at| at.min(deadline));
            let _ = timeout_at(wake_at, notified).await;
        }
    }

    async fn acknowledge(&self, message: &QueuedMessage) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        match state.in_flight.remove(&message.receipt) {
            Some(_) => Ok(()),
            None => Err(QueueError::Ack(format!(
                "Unknown or expired receipt handle for message {}",
                message.message_id
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryQueue::new();
        queue.send("first").await;
        queue.send("second").await;

        let budget = Duration::from_millis(10);
        let a = queue.receive_next(budget).await.unwrap().unwrap();
        let b = queue.receive_next(budget).await.unwrap().unwrap();
        assert_eq!(a.body, "first");
        assert_eq!(b.body, "second");
        assert_eq!(queue.in_flight_count().await, 2);
    }

    #[tokio::test]
    async fn test_empty_queue_waits_for_budget() {
        let queue = MemoryQueue::new();
        let start = std::time::Instant::now();

        let result = queue.receive_next(Duration::from_millis(125)).await.unwrap();

        let elapsed = start.elapsed();
        assert!(result.is_none());
        assert!(elapsed >= Duration::from_millis(120), "returned too early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1000), "waited too long: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_receive_wakes_on_send() {
        let queue = std::sync::Arc::new(MemoryQueue::new());
        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.send("late").await;
        });

        let msg = queue.receive_next(Duration::from_secs(2)).await.unwrap();
        assert_eq!(msg.map(|m| m.body).as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_acknowledge_removes_message() {
        let queue = MemoryQueue::new();
        queue.send("payload").await;

        let msg = queue
            .receive_next(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        queue.acknowledge(&msg).await.unwrap();

        assert_eq!(queue.in_flight_count().await, 0);
        assert_eq!(queue.visible_count().await, 0);

        // Second acknowledge of the same receipt fails
        assert!(matches!(queue.acknowledge(&msg).await, Err(QueueError::Ack(_))));
    }

    #[tokio::test]
    async fn test_unacknowledged_message_redelivered() {
        let queue = MemoryQueue::with_visibility_timeout(Duration::from_millis(30));
        queue.send("retry-me").await;

        let first = queue
            .receive_next(Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.receive_count, 1);

        let second = queue
            .receive_next(Duration::from_millis(500))
            .await
            .unwrap()
            .expect("message should be redelivered");
        assert_eq!(second.body, "retry-me");
        assert_eq!(second.receive_count, 2);
        assert_ne!(second.receipt, first.receipt);

        // The stale receipt can no longer remove the message
        assert!(queue.acknowledge(&first).await.is_err());
        assert!(queue.acknowledge(&second).await.is_ok());
    }
}
