//! Turn handler: translate, publish, respond

use crate::envelope::{RequestEnvelope, Turn};
use crate::publisher::CommandPublisher;
use ev3_relay_shared::{translate, SessionState, SpeechletResponse, VoiceResponse};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Reply written back for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillReply {
    Speak(VoiceResponse),
    /// Answer to a session-ended notice
    Empty,
}

impl SkillReply {
    pub fn to_json(&self) -> Value {
        match self {
            SkillReply::Speak(response) => serde_json::to_value(response).unwrap_or_else(|_| json!({})),
            SkillReply::Empty => json!({}),
        }
    }
}

/// Handles platform requests, publishing commands as a side effect
pub struct SkillHandler<P: CommandPublisher> {
    publisher: P,
}

impl<P: CommandPublisher> SkillHandler<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Handle one request; never fails
    pub async fn handle(&self, envelope: &RequestEnvelope) -> SkillReply {
        let intent = match envelope.turn() {
            Turn::Intent(intent) => intent,
            Turn::SessionEnded => {
                info!("[SKILL] Session {} ended", envelope.session.session_id);
                return SkillReply::Empty;
            }
            Turn::Unknown(kind) => {
                warn!("[SKILL] Unhandled request type: {}", kind);
                return Self::apology();
            }
        };

        let outcome = match translate(&intent, &envelope.prior_state()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[SKILL] {}", e);
                return Self::apology();
            }
        };

        if let Some(payload) = outcome.session.payload() {
            match self.publisher.publish(&payload).await {
                Ok(message_id) => info!("[SKILL] Queued {} as {}", payload, message_id),
                Err(e) => {
                    error!("[SKILL] Failed to queue {}: {}", payload, e);
                    return Self::apology();
                }
            }
        }

        SkillReply::Speak(VoiceResponse::new(outcome.session, outcome.response))
    }

    /// Handle one raw line, answering malformed input with an apology
    pub async fn handle_line(&self, line: &str) -> SkillReply {
        match RequestEnvelope::parse(line) {
            Ok(envelope) => self.handle(&envelope).await,
            Err(e) => {
                warn!("[SKILL] Malformed request: {}", e);
                Self::apology()
            }
        }
    }

    fn apology() -> SkillReply {
        SkillReply::Speak(VoiceResponse::new(
            SessionState::empty(),
            SpeechletResponse::apology(),
        ))
    }
}
