//! Skill configuration from flags and environment

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Voice skill endpoint publishing EV3 commands
#[derive(Parser, Debug, Clone)]
#[command(name = "voice-skill", version)]
#[command(about = "Translate voice requests into EV3 commands and queue them")]
pub struct SkillArgs {
    /// Address to accept platform requests on
    #[arg(long, env = "EV3_SKILL_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Queue URL commands are published to
    #[arg(long, env = "EV3_QUEUE_URL")]
    pub queue_url: String,

    /// Bound on one publish request, in seconds
    #[arg(long, default_value_t = 10)]
    pub publish_timeout_secs: u64,
}

impl SkillArgs {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}
