use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use voice_skill::config::SkillArgs;
use voice_skill::{session, SkillHandler, SqsPublisher};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = SkillArgs::parse();
    let publisher = SqsPublisher::new(args.queue_url.clone(), args.publish_timeout())?;
    let handler = Arc::new(SkillHandler::new(publisher));

    let listener = TcpListener::bind(args.listen).await?;
    info!("[SKILL] Listening on {}", args.listen);
    info!("[SKILL] Publishing to {}", args.queue_url);

    session::serve(listener, handler).await
}
