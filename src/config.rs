//! Agent configuration assembled from command-line flags and environment

use crate::dispatch::LoopConfig;
use crate::motion::{DriveConfig, OutputPort};
use crate::queue::{SqsConfig, DEFAULT_ACK_TIMEOUT};
use crate::robot::{ConnectPolicy, SerialConfig, DEFAULT_LINK_TIMEOUT, DEFAULT_SERIAL_PORT};
use clap::Parser;
use std::time::Duration;

/// Queue-driven motion agent for a LEGO EV3 brick
#[derive(Parser, Debug, Clone)]
#[command(name = "ev3-agent", version)]
#[command(about = "Drain motion commands from a queue and drive an EV3 brick")]
pub struct AgentArgs {
    /// Queue URL to receive commands from
    #[arg(long, env = "EV3_QUEUE_URL")]
    pub queue_url: String,

    /// Serial device of the paired brick (Bluetooth serial port or USB)
    #[arg(long, env = "EV3_PORT", default_value = DEFAULT_SERIAL_PORT)]
    pub port: String,

    #[arg(long, default_value_t = 115_200)]
    pub baud_rate: u32,

    /// Longest wait for one queue receive, in milliseconds
    #[arg(long, default_value_t = 125)]
    pub receive_budget_ms: u64,

    /// Pause after an empty poll, in milliseconds
    #[arg(long, default_value_t = 25)]
    pub idle_backoff_ms: u64,

    /// Bound on deleting a received message, in milliseconds
    #[arg(long, default_value_t = DEFAULT_ACK_TIMEOUT.as_millis() as u64)]
    pub ack_timeout_ms: u64,

    /// Bound on a single frame write to the brick, in milliseconds
    #[arg(long, default_value_t = DEFAULT_LINK_TIMEOUT.as_millis() as u64)]
    pub link_timeout_ms: u64,

    /// Give up connecting to the brick after this many attempts
    #[arg(long)]
    pub connect_attempts: Option<u32>,

    /// Output port of the left drive motor
    #[arg(long, default_value = "B")]
    pub left_port: OutputPort,

    /// Output port of the right drive motor
    #[arg(long, default_value = "C")]
    pub right_port: OutputPort,
}

/// Robot link settings
#[derive(Debug, Clone)]
pub struct RobotConfig {
    pub serial: SerialConfig,
    pub link_timeout: Duration,
    pub connect: ConnectPolicy,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            link_timeout: DEFAULT_LINK_TIMEOUT,
            connect: ConnectPolicy::default(),
        }
    }
}

/// Everything the agent needs to start
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub queue: SqsConfig,
    pub robot: RobotConfig,
    pub dispatch: LoopConfig,
    pub drive: DriveConfig,
}

impl From<AgentArgs> for AgentConfig {
    fn from(args: AgentArgs) -> Self {
        Self {
            queue: SqsConfig {
                queue_url: args.queue_url,
                ack_timeout: Duration::from_millis(args.ack_timeout_ms),
                ..Default::default()
            },
            robot: RobotConfig {
                serial: SerialConfig {
                    port: args.port,
                    baud_rate: args.baud_rate,
                    ..Default::default()
                },
                link_timeout: Duration::from_millis(args.link_timeout_ms),
                connect: ConnectPolicy {
                    max_attempts: args.connect_attempts,
                    ..Default::default()
                },
            },
            dispatch: LoopConfig {
                receive_budget: Duration::from_millis(args.receive_budget_ms),
                idle_backoff: Duration::from_millis(args.idle_backoff_ms),
            },
            drive: DriveConfig {
                left_port: args.left_port,
                right_port: args.right_port,
                ..Default::default()
            },
        }
    }
}
