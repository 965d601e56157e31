//! Request envelope posted by the voice platform

use ev3_relay_shared::intent::Slot;
use ev3_relay_shared::{SessionState, VoiceIntent};
use serde::Deserialize;
use std::collections::HashMap;

/// Session block of a request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub session_id: String,
    /// Attributes returned by the previous turn
    #[serde(default)]
    pub attributes: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Intent block of an `IntentRequest`
#[derive(Debug, Clone, Deserialize)]
pub struct IntentInfo {
    pub name: String,
    #[serde(default)]
    pub slots: HashMap<String, Slot>,
}

/// Request block
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub intent: Option<IntentInfo>,
}

/// One platform request as received on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub session: SessionInfo,
    pub request: PlatformRequest,
}

/// What the handler should do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Translate this intent
    Intent(VoiceIntent),
    /// The platform closed the session; nothing to say
    SessionEnded,
    /// Request type the skill does not handle
    Unknown(String),
}

impl RequestEnvelope {
    /// Parse one line of JSON
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Map the request onto a voice intent
    pub fn turn(&self) -> Turn {
        match self.request.kind.as_str() {
            "LaunchRequest" => Turn::Intent(VoiceIntent {
                name: "LaunchRequest".into(),
                slots: HashMap::new(),
                session_is_new: self.session.new,
            }),
            "IntentRequest" => match &self.request.intent {
                Some(intent) => Turn::Intent(VoiceIntent {
                    name: intent.name.clone(),
                    slots: intent.slots.clone(),
                    session_is_new: self.session.new,
                }),
                None => Turn::Unknown("IntentRequest without intent".into()),
            },
            "SessionEndedRequest" => Turn::SessionEnded,
            other => Turn::Unknown(other.to_string()),
        }
    }

    /// State carried over from the previous turn
    pub fn prior_state(&self) -> SessionState {
        self.session
            .attributes
            .as_ref()
            .map(SessionState::from_attributes)
            .unwrap_or_default()
    }
}
