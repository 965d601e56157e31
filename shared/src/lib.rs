//! EV3 Relay Shared Types
//!
//! This crate provides the canonical command record, its text codec and the
//! voice intent translation shared by the voice skill and the robot agent.

pub mod codec;
pub mod intent;
pub mod queue_wire;
pub mod voice;

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use codec::{decode, encode, DecodeError};
pub use intent::{translate, IntentError, SessionState, TurnOutcome, VoiceIntent};
pub use voice::{SpeechletResponse, VoiceResponse};

/// Errors raised when building a canonical command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command action is empty")]
    EmptyAction,
}

/// Well-known actions understood by the motion dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    Go,
    Turn,
    /// Anything outside the vocabulary, kept verbatim on the command
    Other,
}

impl Action {
    /// Classify an action word
    ///
    /// Matching is exact: `"Forward"` is not `forward` and falls through to
    /// `Other`.
    pub fn classify(action: &str) -> Self {
        match action {
            "forward" => Action::Forward,
            "backward" => Action::Backward,
            "left" => Action::Left,
            "right" => Action::Right,
            "stop" => Action::Stop,
            "go" => Action::Go,
            "turn" => Action::Turn,
            _ => Action::Other,
        }
    }
}

/// One robot instruction, independent of where it came from
///
/// The action is never empty. Unknown actions are preserved as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalCommand {
    action: String,
    value: Option<String>,
}

impl CanonicalCommand {
    /// Create a command, rejecting a blank action
    pub fn new(
        action: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Result<Self, CommandError> {
        let action = action.into();
        if action.trim().is_empty() {
            return Err(CommandError::EmptyAction);
        }
        Ok(Self {
            action,
            value: value.map(Into::into),
        })
    }

    /// The action word as received
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The optional numeric argument (distance, degrees)
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The action classified against the known vocabulary
    pub fn kind(&self) -> Action {
        Action::classify(&self.action)
    }
}

impl fmt::Display for CanonicalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.action, value),
            None => write!(f, "{}", self.action),
        }
    }
}
