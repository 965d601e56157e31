//! Line-delimited JSON sessions over TCP

use crate::handler::SkillHandler;
use crate::publisher::CommandPublisher;
use anyhow::{bail, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Longest request line accepted, excluding the newline
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Serve one connection until the peer closes it
///
/// Each request line gets exactly one response line, in order. A line
/// longer than [`MAX_REQUEST_BYTES`] closes the connection unanswered.
pub async fn serve_connection<P: CommandPublisher>(
    stream: TcpStream,
    addr: SocketAddr,
    handler: Arc<SkillHandler<P>>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_REQUEST_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            break;
        }

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if buf.len() > MAX_REQUEST_BYTES {
            bail!("request from {} exceeds {} bytes", addr, MAX_REQUEST_BYTES);
        }

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        debug!("[SKILL] Request from {}: {}", addr, line);

        let reply = handler.handle_line(&line).await;
        let mut out = reply.to_json().to_string();
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Accept connections forever, one task per connection
pub async fn serve<P: CommandPublisher + 'static>(
    listener: TcpListener,
    handler: Arc<SkillHandler<P>>,
) -> Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        info!("[SKILL] Connection from {}", addr);

        let handler = handler.clone();
        tokio::spawn(async move {
            match serve_connection(socket, addr, handler).await {
                Ok(()) => info!("[SKILL] Client disconnected: {}", addr),
                Err(e) => warn!("[SKILL] Connection {} failed: {}", addr, e),
            }
        });
    }
}
