//! Text codec for the canonical command
//!
//! Commands travel through the queue as a small JSON object:
//! ```text
//! {"action":"forward","value":"10"}
//! {"action":"left","value":null}
//! ```
//!
//! An absent value is written as `null` and accepted either as `null` or as a
//! missing field.

use serde::Deserialize;
use thiserror::Error;

use crate::{CanonicalCommand, CommandError};

/// Errors that can occur while decoding a queued payload
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed command payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Command payload has no action")]
    MissingAction,

    #[error("Invalid command: {0}")]
    Invalid(#[from] CommandError),
}

#[derive(Deserialize)]
struct RawCommand {
    action: Option<String>,
    value: Option<String>,
}

/// Encode a command into its queue payload
pub fn encode(command: &CanonicalCommand) -> String {
    // A struct of two strings always serializes
    serde_json::to_string(command).unwrap_or_default()
}

/// Decode a queue payload into a command
pub fn decode(payload: &str) -> Result<CanonicalCommand, DecodeError> {
    let raw: RawCommand = serde_json::from_str(payload)?;
    let action = raw.action.ok_or(DecodeError::MissingAction)?;
    Ok(CanonicalCommand::new(action, raw.value)?)
}
