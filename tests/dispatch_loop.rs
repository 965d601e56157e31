//! Dispatch loop behaviour against instrumented queue and robot stubs

use async_trait::async_trait;
use ev3_agent::config::AgentConfig;
use ev3_agent::dispatch::{DispatchLoop, LoopConfig, StepOutcome};
use ev3_agent::motion::{DispatchOutcome, MotionDispatcher, MotorBatch};
use ev3_agent::queue::{MemoryQueue, QueueError, QueueGateway, QueuedMessage, ReceiptHandle};
use ev3_agent::robot::{LinkError, RobotConnector, RobotLink, RobotStream, Tone};
use ev3_agent::run_agent;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, DuplexStream};
use tokio_util::sync::CancellationToken;

/// Shared counters flagging a receive issued while a dispatch is running
#[derive(Default)]
struct Activity {
    executing: AtomicBool,
    overlaps: AtomicUsize,
    receives: AtomicUsize,
}

struct ScriptedQueue {
    activity: Arc<Activity>,
    bodies: Mutex<VecDeque<String>>,
    acked: Mutex<Vec<String>>,
    failing_acks: AtomicUsize,
    failing_receives: AtomicUsize,
}

impl ScriptedQueue {
    fn new(activity: Arc<Activity>, bodies: &[&str]) -> Self {
        Self {
            activity,
            bodies: Mutex::new(bodies.iter().map(|b| b.to_string()).collect()),
            acked: Mutex::new(Vec::new()),
            failing_acks: AtomicUsize::new(0),
            failing_receives: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueueGateway for ScriptedQueue {
    async fn receive_next(&self, _budget: Duration) -> Result<Option<QueuedMessage>, QueueError> {
        self.activity.receives.fetch_add(1, Ordering::SeqCst);
        if self.activity.executing.load(Ordering::SeqCst) {
            self.activity.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        let remaining = self.failing_receives.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_receives.store(remaining - 1, Ordering::SeqCst);
            return Err(QueueError::Receive("connection reset".into()));
        }

        let body = self.bodies.lock().unwrap().front().cloned();
        Ok(body.map(|body| QueuedMessage {
            message_id: format!("m-{}", body),
            receipt: ReceiptHandle::new(format!("r-{}", body)),
            body,
            receive_count: 1,
        }))
    }

    async fn acknowledge(&self, message: &QueuedMessage) -> Result<(), QueueError> {
        let remaining = self.failing_acks.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_acks.store(remaining - 1, Ordering::SeqCst);
            return Err(QueueError::Ack("throttled".into()));
        }
        self.bodies.lock().unwrap().pop_front();
        self.acked.lock().unwrap().push(message.body.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}

struct SlowLink {
    activity: Arc<Activity>,
    batches: Vec<MotorBatch>,
    failing_submits: usize,
}

impl SlowLink {
    fn new(activity: Arc<Activity>) -> Self {
        Self {
            activity,
            batches: Vec::new(),
            failing_submits: 0,
        }
    }
}

#[async_trait]
impl RobotLink for SlowLink {
    async fn submit(&mut self, batch: &MotorBatch) -> Result<(), LinkError> {
        self.activity.executing.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.activity.executing.store(false, Ordering::SeqCst);

        if self.failing_submits > 0 {
            self.failing_submits -= 1;
            return Err(LinkError::Timeout(Duration::from_millis(5)));
        }
        self.batches.push(batch.clone());
        Ok(())
    }

    async fn play_tone(&mut self, _tone: Tone) -> Result<(), LinkError> {
        Ok(())
    }
}

fn fast_config() -> LoopConfig {
    LoopConfig {
        receive_budget: Duration::from_millis(10),
        idle_backoff: Duration::from_millis(1),
    }
}

fn new_loop<Q: QueueGateway, L: RobotLink>(queue: Q, link: L) -> DispatchLoop<Q, L> {
    DispatchLoop::new(
        queue,
        link,
        MotionDispatcher::default(),
        fast_config(),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_no_receive_while_dispatching() {
    let activity = Arc::new(Activity::default());
    let bodies = [
        r#"{"action":"forward","value":"1"}"#,
        r#"{"action":"left","value":null}"#,
        r#"{"action":"backward","value":"2"}"#,
        r#"{"action":"right","value":null}"#,
    ];
    let queue = ScriptedQueue::new(activity.clone(), &bodies);
    let mut dispatch = new_loop(queue, SlowLink::new(activity.clone()));

    for _ in 0..bodies.len() {
        assert!(matches!(
            dispatch.step().await,
            StepOutcome::Dispatched(DispatchOutcome::Executed { .. })
        ));
    }
    assert_eq!(dispatch.step().await, StepOutcome::Idle);

    assert_eq!(activity.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(activity.receives.load(Ordering::SeqCst), bodies.len() + 1);
    assert_eq!(dispatch.link().batches.len(), bodies.len());
}

#[tokio::test]
async fn test_failed_ack_skips_dispatch_until_redelivered() {
    let activity = Arc::new(Activity::default());
    let queue = ScriptedQueue::new(activity.clone(), &[r#"{"action":"forward","value":"3"}"#]);
    queue.failing_acks.store(1, Ordering::SeqCst);
    let mut dispatch = new_loop(queue, SlowLink::new(activity));

    assert_eq!(dispatch.step().await, StepOutcome::AckFailed);
    assert!(dispatch.link().batches.is_empty());

    // Same message comes back and runs once acknowledged
    assert!(matches!(dispatch.step().await, StepOutcome::Dispatched(_)));
    assert_eq!(dispatch.link().batches.len(), 1);
    assert_eq!(dispatch.link().batches[0].primitives()[0].magnitude, 300);
    assert_eq!(dispatch.stats().ack_failures, 1);
}

#[tokio::test]
async fn test_invalid_bodies_are_discarded() {
    let activity = Arc::new(Activity::default());
    let queue = ScriptedQueue::new(
        activity.clone(),
        &["forward 10", r#"{"value":"10"}"#, r#"{"action":"left","value":null}"#],
    );
    let mut dispatch = new_loop(queue, SlowLink::new(activity));

    assert_eq!(dispatch.step().await, StepOutcome::Discarded);
    assert_eq!(dispatch.step().await, StepOutcome::Discarded);
    assert!(matches!(dispatch.step().await, StepOutcome::Dispatched(_)));

    let stats = dispatch.stats();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.discarded, 2);
    assert_eq!(stats.dispatched, 1);
    // Discarded messages are still removed from the queue
    assert_eq!(dispatch.queue().acked.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_dispatch_failure_does_not_stop_the_loop() {
    let activity = Arc::new(Activity::default());
    let queue = ScriptedQueue::new(
        activity.clone(),
        &[r#"{"action":"forward","value":null}"#, r#"{"action":"right","value":null}"#],
    );
    let mut link = SlowLink::new(activity);
    link.failing_submits = 1;
    let mut dispatch = new_loop(queue, link);

    assert_eq!(dispatch.step().await, StepOutcome::DispatchFailed);
    assert!(matches!(dispatch.step().await, StepOutcome::Dispatched(_)));
    assert_eq!(dispatch.stats().dispatch_failures, 1);
    assert_eq!(dispatch.link().batches.len(), 1);
}

#[tokio::test]
async fn test_stop_and_unknown_actions_do_not_touch_the_robot() {
    let activity = Arc::new(Activity::default());
    let queue = ScriptedQueue::new(
        activity.clone(),
        &[r#"{"action":"stop","value":null}"#, r#"{"action":"dance","value":"2"}"#],
    );
    let mut dispatch = new_loop(queue, SlowLink::new(activity));

    assert_eq!(
        dispatch.step().await,
        StepOutcome::Dispatched(DispatchOutcome::NoOp)
    );
    assert_eq!(
        dispatch.step().await,
        StepOutcome::Dispatched(DispatchOutcome::NoOp)
    );
    assert!(dispatch.link().batches.is_empty());
    assert_eq!(dispatch.stats().no_ops, 2);
}

/// Link that cancels the loop once it has seen enough batches
struct StoppingLink {
    seen: usize,
    stop_after: usize,
    shutdown: CancellationToken,
}

#[async_trait]
impl RobotLink for StoppingLink {
    async fn submit(&mut self, _batch: &MotorBatch) -> Result<(), LinkError> {
        self.seen += 1;
        if self.seen == self.stop_after {
            self.shutdown.cancel();
        }
        Ok(())
    }

    async fn play_tone(&mut self, _tone: Tone) -> Result<(), LinkError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_run_drains_memory_queue_in_order() {
    let queue = MemoryQueue::new();
    queue.send(r#"{"action":"forward","value":"1"}"#).await;
    queue.send(r#"{"action":"dance","value":null}"#).await;
    queue.send(r#"{"action":"left","value":null}"#).await;

    let shutdown = CancellationToken::new();
    let link = StoppingLink {
        seen: 0,
        stop_after: 2,
        shutdown: shutdown.clone(),
    };
    let mut dispatch = DispatchLoop::new(
        queue,
        link,
        MotionDispatcher::default(),
        fast_config(),
        shutdown,
    );

    let stats = tokio::time::timeout(Duration::from_secs(5), dispatch.run())
        .await
        .expect("loop should stop once cancelled");

    assert_eq!(stats.received, 3);
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.no_ops, 1);
    assert_eq!(dispatch.queue().visible_count().await, 0);
    assert_eq!(dispatch.queue().in_flight_count().await, 0);
}

#[tokio::test]
async fn test_run_survives_receive_failures() {
    let activity = Arc::new(Activity::default());
    let queue = ScriptedQueue::new(activity.clone(), &[r#"{"action":"forward","value":"2"}"#]);
    queue.failing_receives.store(3, Ordering::SeqCst);

    let shutdown = CancellationToken::new();
    let link = StoppingLink {
        seen: 0,
        stop_after: 1,
        shutdown: shutdown.clone(),
    };
    let mut dispatch = DispatchLoop::new(
        queue,
        link,
        MotionDispatcher::default(),
        fast_config(),
        shutdown,
    );

    let stats = tokio::time::timeout(Duration::from_secs(5), dispatch.run())
        .await
        .expect("loop should stop once cancelled");

    assert_eq!(stats.receive_failures, 3);
    assert_eq!(stats.received, 1);
    assert_eq!(stats.dispatched, 1);
    assert_eq!(activity.receives.load(Ordering::SeqCst), 4);
    assert_eq!(
        dispatch.queue().acked.lock().unwrap().as_slice(),
        &[r#"{"action":"forward","value":"2"}"#.to_string()]
    );
}

/// In-process brick: the test reads what the agent writes
struct PipeStream(DuplexStream);

impl AsyncWrite for PipeStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

#[async_trait]
impl RobotStream for PipeStream {
    async fn shutdown(&mut self) -> anyhow::Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.0).await?;
        Ok(())
    }
}

struct PipeConnector {
    stream: Mutex<Option<DuplexStream>>,
}

#[async_trait]
impl RobotConnector for PipeConnector {
    type Stream = PipeStream;

    async fn connect(&self) -> anyhow::Result<Self::Stream> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .map(PipeStream)
            .ok_or_else(|| anyhow::anyhow!("already connected"))
    }

    fn name(&self) -> &'static str {
        "Pipe"
    }
}

async fn read_frame(brick: &mut DuplexStream) -> Vec<u8> {
    let mut prefix = [0u8; 2];
    brick.read_exact(&mut prefix).await.unwrap();
    let mut body = vec![0u8; u16::from_le_bytes(prefix) as usize];
    brick.read_exact(&mut body).await.unwrap();
    body
}

#[tokio::test]
async fn test_agent_sends_tone_then_commands() {
    let (client, mut brick) = tokio::io::duplex(4096);
    let connector = PipeConnector {
        stream: Mutex::new(Some(client)),
    };

    let queue = MemoryQueue::new();
    queue.send(r#"{"action":"forward","value":"5"}"#).await;

    let mut config = AgentConfig::default();
    config.dispatch = fast_config();

    let shutdown = CancellationToken::new();
    let agent = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { run_agent(&connector, queue, &config, shutdown).await }
    });

    let tone = read_frame(&mut brick).await;
    assert_eq!(&tone[..2], &[0x01, 0x00]);
    assert_eq!(tone[2], 0x80);
    assert_eq!(&tone[5..7], &[0x94, 0x01]);

    let motion = read_frame(&mut brick).await;
    assert_eq!(&motion[..2], &[0x02, 0x00]);
    // Polarity for B, polarity for C, then both speed steps of 500
    assert_eq!(&motion[5..9], &[0xA7, 0x00, 0x02, 0x01]);
    assert_eq!(&motion[9..13], &[0xA7, 0x00, 0x04, 0x01]);
    assert_eq!(
        &motion[13..24],
        &[0xAE, 0x00, 0x02, 0x81, 0x64, 0x00, 0x82, 0xF4, 0x01, 0x00, 0x00]
    );
    assert_eq!(motion.len(), 5 + 8 + 22);

    shutdown.cancel();
    let stats = agent.await.unwrap().unwrap();
    assert_eq!(stats.dispatched, 1);
}
