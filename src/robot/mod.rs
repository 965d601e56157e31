//! Robot link to the EV3 brick
//!
//! This module handles:
//! - Encoding motor batches as EV3 direct commands
//! - Serial connections to the brick's Bluetooth or USB serial port
//! - Connecting with exponential backoff at startup

mod ev3;
mod link;
mod serial;
mod traits;

pub use ev3::{opcode, CommandType, DirectCommand, MAX_FRAME_SIZE};
pub use link::{Ev3Link, DEFAULT_LINK_TIMEOUT};
pub use serial::{SerialConfig, SerialConnector, SerialRobotStream, DEFAULT_SERIAL_PORT};
pub use traits::{LinkError, RobotConnector, RobotLink, RobotStream, Tone};

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Reconnection policy used while bringing up the link
#[derive(Debug, Clone)]
pub struct ConnectPolicy {
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for the doubling delay
    pub max_delay: Duration,
    /// Bound on a single connection attempt
    pub attempt_timeout: Duration,
    /// Give up after this many attempts (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(15),
            max_attempts: None,
        }
    }
}

/// Connect through `connector`, backing off exponentially between failures
pub async fn connect_with_retry<C: RobotConnector>(
    connector: &C,
    policy: &ConnectPolicy,
) -> Result<C::Stream> {
    let mut delay = policy.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        info!("[EV3] Connecting via {} (attempt {})", connector.name(), attempt);

        let reason = match timeout(policy.attempt_timeout, connector.connect()).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", policy.attempt_timeout),
        };

        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(anyhow!(
                "{} connection failed after {} attempts: {}",
                connector.name(),
                attempt,
                reason
            ));
        }

        warn!("[EV3] Connection failed: {} (retrying in {:?})", reason, delay);
        tokio::time::sleep(delay).await;
        delay = std::cmp::min(delay * 2, policy.max_delay);
    }
}
