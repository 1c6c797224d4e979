//! Data types flowing through the synthesis → extraction pipeline.

use crate::defaults::LOG_PREVIEW_CHARS;
use crate::visemes::track::VisemeTrack;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two external stages every utterance passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Text → audio artifact.
    Synthesis,
    /// Audio artifact → timed viseme track.
    Extraction,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Synthesis => write!(f, "synthesis"),
            StageKind::Extraction => write!(f, "extraction"),
        }
    }
}

/// Facial expression tag chosen by the upstream language model.
///
/// Tags outside the known set are kept verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacialExpression {
    Smile,
    Sad,
    Angry,
    Surprised,
    FunnyFace,
    #[default]
    Default,
    #[serde(untagged)]
    Other(String),
}

/// Body animation tag chosen by the upstream language model.
///
/// Tags outside the known set are kept verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Animation {
    #[default]
    Idle,
    TalkingOne,
    TalkingThree,
    SadIdle,
    Defeated,
    Angry,
    Surprised,
    DismissingGesture,
    ThoughtfulHeadShake,
    #[serde(untagged)]
    Other(String),
}

/// One utterance's result, enriched in place as stages complete.
///
/// Starts with `text`, `facial_expression` and `animation`; `audio` and
/// `lipsync` are filled by extraction. Serializes to the camelCase wire form
/// with `audio` as base64.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    #[serde(default)]
    pub facial_expression: FacialExpression,
    #[serde(default)]
    pub animation: Animation,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_audio")]
    pub audio: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lipsync: Option<VisemeTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    /// Creates a message with default expression and animation.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_expression(mut self, expression: FacialExpression) -> Self {
        self.facial_expression = expression;
        self
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animation = animation;
        self
    }

    /// True once both audio and viseme track are attached.
    pub fn is_performance_ready(&self) -> bool {
        self.audio.is_some() && self.lipsync.is_some()
    }
}

/// Immutable view of one message used by the synthesis stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// 0-based position in the turn.
    pub index: usize,
    pub text: String,
}

impl Utterance {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Builds the dense, ordered utterance list for a turn.
    pub fn from_turn(messages: &[Message]) -> Vec<Utterance> {
        messages
            .iter()
            .enumerate()
            .map(|(index, message)| Utterance::new(index, message.text.clone()))
            .collect()
    }

    /// Leading characters of the text, for log lines.
    pub fn preview(&self) -> String {
        self.text.chars().take(LOG_PREVIEW_CHARS).collect()
    }
}

/// One per-index result delivered to a consumer, in index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedEvent {
    pub index: usize,
    pub message: Message,
    /// Set on the last index, or on a terminal bootstrap failure.
    pub done: bool,
    /// Failure attached to this index; serialized as `null` when absent.
    pub error: Option<String>,
}

/// Wire frame for streaming consumers.
///
/// Per-index events are followed by one aggregate frame carrying every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFrame {
    Complete {
        messages: Vec<Message>,
        complete: bool,
    },
    Event(OrderedEvent),
}

impl StreamFrame {
    /// Builds the aggregate frame sent after the last event.
    pub fn complete(messages: Vec<Message>) -> Self {
        StreamFrame::Complete {
            messages,
            complete: true,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Renders the frame as one Server-Sent Events `data:` record.
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", self.to_json()?))
    }
}

/// A conversational turn as exchanged with callers: `{ "messages": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub messages: Vec<Message>,
}

impl Turn {
    /// Parses `{ "messages": [...] }` or a bare message array.
    pub fn parse(input: &str) -> crate::error::Result<Vec<Message>> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| invalid_turn(format!("not valid JSON: {e}")))?;

        let messages = match value {
            serde_json::Value::Object(mut object) => object
                .remove("messages")
                .ok_or_else(|| invalid_turn("expected {\"messages\": [...]} or a message array"))?,
            array @ serde_json::Value::Array(_) => array,
            _ => return Err(invalid_turn("expected {\"messages\": [...]} or a message array")),
        };

        serde_json::from_value(messages).map_err(|e| invalid_turn(format!("bad message: {e}")))
    }
}

fn invalid_turn(message: impl Into<String>) -> crate::error::LipsynthError {
    crate::error::LipsynthError::InvalidInput {
        message: message.into(),
    }
}

/// Serde adapter encoding raw audio bytes as standard base64.
mod base64_audio {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(audio: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match audio {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
