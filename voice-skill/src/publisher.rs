//! Command publishers for the robot queue

use async_trait::async_trait;
use ev3_relay_shared::queue_wire::{
    SendMessageRequest, SendMessageResponse, CONTENT_TYPE, SEND_MESSAGE, TARGET_HEADER,
};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while publishing a command
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Queue request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Queue rejected the message: {0}")]
    Rejected(String),
}

/// Sink for encoded commands
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publish one encoded command, returning the queue's message id
    async fn publish(&self, payload: &str) -> Result<String, PublishError>;
}

/// Publisher speaking the SQS JSON protocol
pub struct SqsPublisher {
    client: Client,
    queue_url: String,
}

impl SqsPublisher {
    pub fn new(queue_url: impl Into<String>, request_timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            queue_url: queue_url.into(),
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl CommandPublisher for SqsPublisher {
    async fn publish(&self, payload: &str) -> Result<String, PublishError> {
        let request = SendMessageRequest {
            queue_url: &self.queue_url,
            message_body: payload,
        };

        let response = self
            .client
            .post(&self.queue_url)
            .header(TARGET_HEADER, SEND_MESSAGE)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected(format!("{} {}", status, detail)));
        }

        let sent: SendMessageResponse = response.json().await?;
        debug!("[SKILL] Published message {}", sent.message_id);
        Ok(sent.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one HTTP request and answer with `status` and `body`
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/queue/commands", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/x-amz-json-1.0\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_publish_sends_message() {
        let (url, server) = one_shot_server("200 OK", r#"{"MessageId":"abc-123"}"#).await;
        let publisher = SqsPublisher::new(&url, Duration::from_secs(5)).unwrap();

        let id = publisher
            .publish(r#"{"action":"left","value":null}"#)
            .await
            .unwrap();
        assert_eq!(id, "abc-123");

        let request = server.await.unwrap();
        assert!(request.contains("AmazonSQS.SendMessage"));
        assert!(request.contains(r#""MessageBody":"{\"action\":\"left\",\"value\":null}""#));
    }

    #[tokio::test]
    async fn test_rejected_publish() {
        let (url, _server) = one_shot_server("400 Bad Request", r#"{"__type":"QueueDoesNotExist"}"#).await;
        let publisher = SqsPublisher::new(url, Duration::from_secs(5)).unwrap();

        let result = publisher.publish("{}").await;
        assert!(matches!(result, Err(PublishError::Rejected(_))));
    }
}
