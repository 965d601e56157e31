//! Queue-driven motion agent for a LEGO EV3 brick
//!
//! Commands published by the voice skill are drained from a queue one at a
//! time and executed on the robot as EV3 direct commands.

pub mod config;
pub mod dispatch;
pub mod motion;
pub mod queue;
pub mod robot;

use anyhow::Result;
use config::AgentConfig;
use dispatch::{DispatchLoop, LoopStats};
use motion::MotionDispatcher;
use queue::QueueGateway;
use robot::{connect_with_retry, Ev3Link, RobotConnector, RobotLink, Tone};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Connect to the brick and drain `queue` until `shutdown` is cancelled
pub async fn run_agent<C, Q>(
    connector: &C,
    queue: Q,
    config: &AgentConfig,
    shutdown: CancellationToken,
) -> Result<LoopStats>
where
    C: RobotConnector,
    Q: QueueGateway,
{
    let stream = tokio::select! {
        _ = shutdown.cancelled() => {
            info!("[EV3] Shutdown before the brick connected");
            return Ok(LoopStats::default());
        }
        stream = connect_with_retry(connector, &config.robot.connect) => stream?,
    };
    info!("[EV3] Connected via {}", connector.name());

    let mut link = Ev3Link::new(stream, config.robot.link_timeout);
    if let Err(e) = link.play_tone(Tone::READY).await {
        warn!("[EV3] Ready tone failed: {}", e);
    }

    let mut dispatch = DispatchLoop::new(
        queue,
        link,
        MotionDispatcher::new(config.drive.clone()),
        config.dispatch.clone(),
        shutdown,
    );
    let stats = dispatch.run().await;

    let (_, link) = dispatch.into_parts();
    if let Err(e) = link.close().await {
        warn!("[EV3] Close failed: {}", e);
    }
    Ok(stats)
}
