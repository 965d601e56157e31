//! Queue wire types (SQS JSON protocol)
//!
//! Requests are POSTed with `Content-Type: application/x-amz-json-1.0` and an
//! `X-Amz-Target` header naming the action.

use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
pub const TARGET_HEADER: &str = "X-Amz-Target";

pub const RECEIVE_MESSAGE: &str = "AmazonSQS.ReceiveMessage";
pub const DELETE_MESSAGE: &str = "AmazonSQS.DeleteMessage";
pub const SEND_MESSAGE: &str = "AmazonSQS.SendMessage";

/// Message attributes requested with every receive
pub const RECEIVE_ATTRIBUTES: &[&str] = &["ApproximateReceiveCount"];

/// Longest long-poll the queue service accepts
pub const MAX_WAIT_TIME_SECONDS: u64 = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiveMessageRequest<'a> {
    pub queue_url: &'a str,
    pub max_number_of_messages: u32,
    pub wait_time_seconds: u64,
    pub attribute_names: &'a [&'a str],
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiveMessageResponse {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    #[serde(default)]
    pub attributes: Option<WireAttributes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAttributes {
    #[serde(rename = "ApproximateReceiveCount", default)]
    pub approximate_receive_count: Option<String>,
}

impl WireMessage {
    /// How many times the queue has handed this message out (1 if unknown)
    pub fn receive_count(&self) -> u32 {
        self.attributes
            .as_ref()
            .and_then(|a| a.approximate_receive_count.as_deref())
            .and_then(|c| c.parse().ok())
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteMessageRequest<'a> {
    pub queue_url: &'a str,
    pub receipt_handle: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageRequest<'a> {
    pub queue_url: &'a str,
    pub message_body: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageResponse {
    pub message_id: String,
}

/// Long-poll seconds for a receive budget, capped at the service maximum
pub fn wait_time_seconds(budget: std::time::Duration) -> u64 {
    budget.as_secs().min(MAX_WAIT_TIME_SECONDS)
}
