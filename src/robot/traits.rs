//! Robot link abstractions for pluggable brick connections

use crate::motion::MotorBatch;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWrite;

/// Errors raised while talking to the robot
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Link I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Link did not accept the command within {0:?}")]
    Timeout(Duration),

    #[error("Command frame too large: {0} bytes (max: {max})", max = super::ev3::MAX_FRAME_SIZE)]
    FrameTooLarge(usize),
}

/// A tone played on the brick's speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    /// Volume percentage (0-100)
    pub volume: u8,
    pub frequency_hz: u16,
    pub duration_ms: u16,
}

impl Tone {
    /// Short beep played once the agent is ready for commands
    pub const READY: Tone = Tone {
        volume: 0x50,
        frequency_hz: 5000,
        duration_ms: 500,
    };
}

/// A byte stream to the brick
#[async_trait]
pub trait RobotStream: AsyncWrite + Send + Unpin + 'static {
    /// Close the stream gracefully
    async fn shutdown(&mut self) -> Result<()>;
}

/// Factory for brick connections
#[async_trait]
pub trait RobotConnector: Send + Sync {
    /// The stream type this connector produces
    type Stream: RobotStream;

    /// Attempt to connect, returning a stream on success
    async fn connect(&self) -> Result<Self::Stream>;

    /// Human-readable name for this connection kind
    fn name(&self) -> &'static str;
}

/// Exclusive handle used to drive the robot
///
/// A batch is submitted as one unit: either all of it reaches the brick or
/// the submission fails as a whole.
#[async_trait]
pub trait RobotLink: Send {
    async fn submit(&mut self, batch: &MotorBatch) -> Result<(), LinkError>;

    async fn play_tone(&mut self, tone: Tone) -> Result<(), LinkError>;
}
