//! Serial port connection to the brick
//!
//! The brick's Bluetooth serial profile shows up as a serial device once
//! paired (`/dev/rfcomm0` on Linux, a COM port on Windows).

use super::traits::{RobotConnector, RobotStream};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

/// Default device for a paired brick on Linux
pub const DEFAULT_SERIAL_PORT: &str = "/dev/rfcomm0";

/// Configuration for the serial connector
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub io_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.into(),
            baud_rate: 115_200,
            io_timeout: Duration::from_secs(2),
        }
    }
}

/// Serial stream wrapper implementing RobotStream
pub struct SerialRobotStream {
    inner: SerialStream,
}

impl SerialRobotStream {
    pub fn new(stream: SerialStream) -> Self {
        Self { inner: stream }
    }
}

impl AsyncWrite for SerialRobotStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[async_trait]
impl RobotStream for SerialRobotStream {
    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.inner).await?;
        Ok(())
    }
}

/// Connector opening the brick's serial device
pub struct SerialConnector {
    config: SerialConfig,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RobotConnector for SerialConnector {
    type Stream = SerialRobotStream;

    async fn connect(&self) -> Result<Self::Stream> {
        info!(
            "[EV3] Opening {} at {} baud",
            self.config.port, self.config.baud_rate
        );

        let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.io_timeout)
            .open_native_async()
            .with_context(|| format!("Failed to open serial port {}", self.config.port))?;

        Ok(SerialRobotStream::new(stream))
    }

    fn name(&self) -> &'static str {
        "Serial"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SerialConfig::default();
        assert_eq!(config.port, DEFAULT_SERIAL_PORT);
        assert_eq!(config.baud_rate, 115_200);
    }

    #[tokio::test]
    async fn test_missing_port_fails() {
        let connector = SerialConnector::new(SerialConfig {
            port: "/dev/does-not-exist-ev3".into(),
            ..Default::default()
        });
        assert!(connector.connect().await.is_err());
        assert_eq!(connector.name(), "Serial");
    }
}
