//! Voice platform response types
//!
//! A [`SpeechletResponse`] is rendered on the wire as:
//! ```text
//! { "outputSpeech": { "type": "PlainText", "text": ... },
//!   "card":         { "type": "Simple", "title": "EV3 - ...", "content": ... },
//!   "reprompt":     { "outputSpeech": { "type": "PlainText", "text": ... } },
//!   "shouldEndSession": bool }
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::intent::SessionState;

/// Prefix applied to every card title shown in the companion app
pub const CARD_TITLE_PREFIX: &str = "EV3 - ";

/// Response version expected by the voice platform
pub const RESPONSE_VERSION: &str = "1.0";

pub(crate) const INSTRUCTIONS: &str = "Please tell me how you want me to control your E. V. Three, \
     by saying things like, forward 10, backward 5, left, right, turn -45, go, stop, or reverse.";

/// What the voice front end says and shows for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechletResponse {
    pub spoken_text: String,
    pub card_title: String,
    pub card_text: String,
    /// `None` means the user is not prompted again
    pub reprompt_text: Option<String>,
    pub end_session: bool,
}

impl SpeechletResponse {
    /// A response whose card mirrors the spoken text
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        reprompt_text: Option<String>,
        end_session: bool,
    ) -> Self {
        let text = text.into();
        Self {
            card_text: text.clone(),
            spoken_text: text,
            card_title: title.into(),
            reprompt_text,
            end_session,
        }
    }

    /// Generic apology used when a turn cannot be handled
    pub fn apology() -> Self {
        Self::new(
            "Error",
            "Sorry, I couldn't handle that request for your E. V. Three.",
            Some(INSTRUCTIONS.to_string()),
            false,
        )
    }
}

#[derive(Serialize)]
struct PlainText<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl<'a> PlainText<'a> {
    fn new(text: &'a str) -> Self {
        Self { kind: "PlainText", text }
    }
}

#[derive(Serialize)]
struct SimpleCard {
    #[serde(rename = "type")]
    kind: &'static str,
    title: String,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Reprompt<'a> {
    output_speech: PlainText<'a>,
}

impl Serialize for SpeechletResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("outputSpeech", &PlainText::new(&self.spoken_text))?;
        map.serialize_entry(
            "card",
            &SimpleCard {
                kind: "Simple",
                title: format!("{}{}", CARD_TITLE_PREFIX, self.card_title),
                content: self.card_text.clone(),
            },
        )?;
        if let Some(ref reprompt) = self.reprompt_text {
            map.serialize_entry(
                "reprompt",
                &Reprompt {
                    output_speech: PlainText::new(reprompt),
                },
            )?;
        }
        map.serialize_entry("shouldEndSession", &self.end_session)?;
        map.end()
    }
}

/// Full response envelope returned to the voice platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceResponse {
    pub version: &'static str,
    pub session_attributes: SessionState,
    pub response: SpeechletResponse,
}

impl VoiceResponse {
    pub fn new(session_attributes: SessionState, response: SpeechletResponse) -> Self {
        Self {
            version: RESPONSE_VERSION,
            session_attributes,
            response,
        }
    }
}
