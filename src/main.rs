use anyhow::Result;
use clap::Parser;
use ev3_agent::config::{AgentArgs, AgentConfig};
use ev3_agent::queue::SqsQueue;
use ev3_agent::robot::SerialConnector;
use ev3_agent::run_agent;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AgentConfig::from(AgentArgs::parse());

    info!("EV3 agent starting");
    info!("  Queue: {}", config.queue.queue_url);
    info!("  Brick: {}", config.robot.serial.port);

    let queue = SqsQueue::new(config.queue.clone())?;

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("Shutdown requested");
        token.cancel();
    });

    let connector = SerialConnector::new(config.robot.serial.clone());
    let stats = run_agent(&connector, queue, &config, shutdown).await?;

    info!("EV3 agent stopped after {} commands", stats.dispatched);
    Ok(())
}
