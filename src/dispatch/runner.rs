//! Dispatch loop - drains the queue one command at a time

use crate::motion::{DispatchOutcome, MotionDispatcher};
use crate::queue::{QueueGateway, QueuedMessage};
use crate::robot::RobotLink;
use ev3_relay_shared::{decode, CanonicalCommand};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Loop timing
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Longest wait for a single receive
    pub receive_budget: Duration,
    /// Pause after an empty or failed poll
    pub idle_backoff: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            receive_budget: Duration::from_millis(125),
            idle_backoff: Duration::from_millis(25),
        }
    }
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Executing,
    Stopped,
}

/// What a single polling cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing arrived within the budget
    Idle,
    /// The queue could not be read
    ReceiveFailed,
    /// The message could not be removed and was not executed
    AckFailed,
    /// The message body was not a valid command
    Discarded,
    /// The command ran to completion
    Dispatched(DispatchOutcome),
    /// The robot rejected the command; it is lost
    DispatchFailed,
    /// Shutdown was requested
    Stopped,
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub received: u64,
    pub dispatched: u64,
    pub no_ops: u64,
    pub discarded: u64,
    pub receive_failures: u64,
    pub ack_failures: u64,
    pub dispatch_failures: u64,
}

/// Single worker connecting a queue to the robot
///
/// The loop owns the robot link exclusively. A new receive is never issued
/// while a dispatch is still running.
pub struct DispatchLoop<Q: QueueGateway, L: RobotLink> {
    queue: Q,
    link: L,
    dispatcher: MotionDispatcher,
    config: LoopConfig,
    state: LoopState,
    stats: LoopStats,
    shutdown: CancellationToken,
}

impl<Q: QueueGateway, L: RobotLink> DispatchLoop<Q, L> {
    pub fn new(
        queue: Q,
        link: L,
        dispatcher: MotionDispatcher,
        config: LoopConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            link,
            dispatcher,
            config,
            state: LoopState::Polling,
            stats: LoopStats::default(),
            shutdown,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Give back the queue and the link
    pub fn into_parts(self) -> (Q, L) {
        (self.queue, self.link)
    }

    /// Run one Polling -> Executing -> Polling cycle
    pub async fn step(&mut self) -> StepOutcome {
        if self.state == LoopState::Stopped || self.shutdown.is_cancelled() {
            self.state = LoopState::Stopped;
            return StepOutcome::Stopped;
        }

        let message = match self.queue.receive_next(self.config.receive_budget).await {
            Ok(Some(message)) => message,
            Ok(None) => return StepOutcome::Idle,
            Err(e) => {
                self.stats.receive_failures += 1;
                warn!("[DISPATCH] {} receive failed: {}", self.queue.name(), e);
                return StepOutcome::ReceiveFailed;
            }
        };
        self.stats.received += 1;

        if message.receive_count > 1 {
            debug!(
                "[DISPATCH] Message {} delivered {} times",
                message.message_id, message.receive_count
            );
        }

        if let Err(e) = self.queue.acknowledge(&message).await {
            self.stats.ack_failures += 1;
            warn!(
                "[DISPATCH] Not executing {}, acknowledge failed: {}",
                message.message_id, e
            );
            return StepOutcome::AckFailed;
        }

        let command = match Self::decode_message(&message) {
            Some(command) => command,
            None => {
                self.stats.discarded += 1;
                return StepOutcome::Discarded;
            }
        };

        self.state = LoopState::Executing;
        let outcome = self.execute(&command).await;
        self.state = LoopState::Polling;
        outcome
    }

    /// Poll until the shutdown token is cancelled
    pub async fn run(&mut self) -> LoopStats {
        info!(
            "[DISPATCH] Draining {} (budget {:?})",
            self.queue.name(),
            self.config.receive_budget
        );

        loop {
            match self.step().await {
                StepOutcome::Stopped => break,
                StepOutcome::Idle | StepOutcome::ReceiveFailed | StepOutcome::AckFailed => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {}
                        _ = tokio::time::sleep(self.config.idle_backoff) => {}
                    }
                }
                _ => {}
            }
        }

        let stats = self.stats;
        info!(
            "[DISPATCH] Stopped: received={} dispatched={} no_ops={} discarded={} failures={}",
            stats.received,
            stats.dispatched,
            stats.no_ops,
            stats.discarded,
            stats.receive_failures + stats.ack_failures + stats.dispatch_failures
        );
        stats
    }

    fn decode_message(message: &QueuedMessage) -> Option<CanonicalCommand> {
        match decode(&message.body) {
            Ok(command) => Some(command),
            Err(e) => {
                warn!(
                    "[DISPATCH] Discarding message {}: {}",
                    message.message_id, e
                );
                None
            }
        }
    }

    async fn execute(&mut self, command: &CanonicalCommand) -> StepOutcome {
        match self.dispatcher.dispatch(&mut self.link, command).await {
            Ok(outcome) => {
                match outcome {
                    DispatchOutcome::Executed { .. } => self.stats.dispatched += 1,
                    DispatchOutcome::NoOp => self.stats.no_ops += 1,
                }
                StepOutcome::Dispatched(outcome)
            }
            Err(e) => {
                self.stats.dispatch_failures += 1;
                error!("[DISPATCH] '{}' failed: {}", command, e);
                StepOutcome::DispatchFailed
            }
        }
    }
}
