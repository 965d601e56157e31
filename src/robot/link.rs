//! Robot link writing EV3 direct commands to a stream

use super::ev3::DirectCommand;
use super::traits::{LinkError, RobotLink, RobotStream, Tone};
use crate::motion::MotorBatch;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::debug;

/// Default bound on a single frame write
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(2);

/// EV3 brick reached over a byte stream
pub struct Ev3Link<S: RobotStream> {
    stream: S,
    counter: u16,
    write_timeout: Duration,
}

impl<S: RobotStream> Ev3Link<S> {
    pub fn new(stream: S, write_timeout: Duration) -> Self {
        Self {
            stream,
            counter: 0,
            write_timeout,
        }
    }

    /// Number of frames sent so far (wraps)
    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Close the underlying stream
    pub async fn close(mut self) -> anyhow::Result<()> {
        RobotStream::shutdown(&mut self.stream).await
    }

    async fn send(&mut self, command: &DirectCommand) -> Result<(), LinkError> {
        let counter = self.counter.wrapping_add(1);
        let frame = command.encode(counter)?;
        self.counter = counter;

        let limit = self.write_timeout;
        let stream = &mut self.stream;
        timeout(limit, async {
            stream.write_all(&frame).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| LinkError::Timeout(limit))??;

        debug!("[EV3] Sent frame #{} ({} bytes)", counter, frame.len());
        Ok(())
    }
}

#[async_trait]
impl<S: RobotStream> RobotLink for Ev3Link<S> {
    async fn submit(&mut self, batch: &MotorBatch) -> Result<(), LinkError> {
        self.send(&DirectCommand::from_batch(batch)).await
    }

    async fn play_tone(&mut self, tone: Tone) -> Result<(), LinkError> {
        self.send(&DirectCommand::tone(tone)).await
    }
}
