//! Voice intent translation
//!
//! Turns one recognized intent into the next session state and the response
//! spoken back to the user. A non-empty session state is the command that
//! gets published to the robot queue.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::codec;
use crate::voice::{SpeechletResponse, INSTRUCTIONS};
use crate::CanonicalCommand;

/// Slot carrying the action word of a move
pub const ACTION_SLOT: &str = "Action";
/// Slot carrying the optional numeric argument of a move
pub const VALUE_SLOT: &str = "Value";

/// Errors raised by the translator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("Unsupported intent: {0}")]
    Unsupported(String),
}

/// A slot filled by the speech front end
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub value: Option<String>,
}

/// A recognized voice intent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceIntent {
    pub name: String,
    pub slots: HashMap<String, Slot>,
    pub session_is_new: bool,
}

impl VoiceIntent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder helper used by callers assembling intents by hand
    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(
            name.into(),
            Slot {
                value: Some(value.into()),
            },
        );
        self
    }

    /// Value of a slot, treating a blank value as absent
    pub fn slot_value(&self, name: &str) -> Option<&str> {
        self.slots
            .get(name)
            .and_then(|slot| slot.value.as_deref())
            .filter(|value| !value.trim().is_empty())
    }
}

/// The intents this skill recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentKind {
    Launch,
    Help,
    Move,
    Stop,
}

impl IntentKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "Launch" | "LaunchRequest" => Some(IntentKind::Launch),
            "Help" | "AMAZON.HelpIntent" => Some(IntentKind::Help),
            "Move" | "MoveIntent" => Some(IntentKind::Move),
            "Stop" | "StopIntent" => Some(IntentKind::Stop),
            _ => None,
        }
    }
}

/// Key-value state carried between turns
///
/// Either empty or exactly `{action, value}` after a move was set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    command: Option<CanonicalCommand>,
}

impl SessionState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_command(command: CanonicalCommand) -> Self {
        Self {
            command: Some(command),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_none()
    }

    pub fn command(&self) -> Option<&CanonicalCommand> {
        self.command.as_ref()
    }

    /// Rebuild state from the attribute map echoed back by the platform
    ///
    /// Anything that is not a usable `{action, value}` pair reads as empty.
    pub fn from_attributes(attributes: &serde_json::Map<String, serde_json::Value>) -> Self {
        let action = attributes.get("action").and_then(|v| v.as_str());
        let value = attributes.get("value").and_then(|v| v.as_str());
        let command = action.and_then(|a| CanonicalCommand::new(a, value).ok());
        Self { command }
    }

    /// The payload to publish downstream, if this turn produced a command
    pub fn payload(&self) -> Option<String> {
        self.command.as_ref().map(codec::encode)
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.command {
            Some(cmd) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("action", cmd.action())?;
                map.serialize_entry("value", &cmd.value())?;
                map.end()
            }
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

/// Result of translating one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub session: SessionState,
    pub response: SpeechletResponse,
}

/// Translate a voice intent into the next session state and response
///
/// Every turn starts from a clean state; the prior state is never merged.
pub fn translate(intent: &VoiceIntent, prior: &SessionState) -> Result<TurnOutcome, IntentError> {
    let kind = IntentKind::parse(&intent.name)
        .ok_or_else(|| IntentError::Unsupported(intent.name.clone()))?;

    debug!(
        "Translating {:?} (new session: {}, prior command: {:?})",
        kind,
        intent.session_is_new,
        prior.command()
    );

    let outcome = match kind {
        IntentKind::Launch | IntentKind::Help => welcome(),
        IntentKind::Move => set_move(intent),
        IntentKind::Stop => end_move(intent),
    };

    Ok(outcome)
}

fn welcome() -> TurnOutcome {
    let speech = format!("Welcome to the Alexa E. V. Three Command Tool. {}", INSTRUCTIONS);
    TurnOutcome {
        session: SessionState::empty(),
        response: SpeechletResponse::new(
            "Welcome",
            speech,
            Some(INSTRUCTIONS.to_string()),
            false,
        ),
    }
}

fn set_move(intent: &VoiceIntent) -> TurnOutcome {
    let command = intent
        .slot_value(ACTION_SLOT)
        .and_then(|action| CanonicalCommand::new(action, intent.slot_value(VALUE_SLOT)).ok());

    match command {
        Some(command) => {
            let speech = command.action().to_string();
            TurnOutcome {
                session: SessionState::with_command(command),
                response: SpeechletResponse::new("Move", speech, None, false),
            }
        }
        None => {
            let speech = "I'm not sure what action you want me to have your E. V. Three perform.";
            TurnOutcome {
                session: SessionState::empty(),
                response: SpeechletResponse::new(
                    "Move",
                    speech,
                    Some(format!("{} {}", speech, INSTRUCTIONS)),
                    false,
                ),
            }
        }
    }
}

fn end_move(intent: &VoiceIntent) -> TurnOutcome {
    TurnOutcome {
        session: SessionState::empty(),
        response: SpeechletResponse::new(
            intent.name.as_str(),
            "Done controlling E. V. Three.",
            None,
            true,
        ),
    }
}
