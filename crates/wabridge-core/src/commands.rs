use serde::{Deserialize, Serialize};

use crate::ids::ChatId;

/// Commands read from the controlling process, one JSON object per line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum InboundCommand {
    #[serde(rename = "send")]
    Send {
        #[serde(rename = "chatId")]
        chat_id: ChatId,
        message: String,
    },
}

impl InboundCommand {
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::Send { .. } => "send",
        }
    }
}

/// Why an inbound line did not yield a command.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a json object")]
    NotAnObject,

    #[error("missing field `type`")]
    MissingType,

    #[error("unknown command type: {0}")]
    UnknownType(String),

    #[error("`{command}` command missing required field `{field}`")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

impl DecodeError {
    /// Short classification string for log fields.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
            Self::UnknownType(_) => "unknown_type",
            Self::MissingField { .. } => "missing_field",
            Self::LineTooLong { .. } => "line_too_long",
        }
    }
}

/// Decode one inbound line.
///
/// The line is parsed loosely first so unknown types and missing fields can
/// be told apart from broken JSON.
pub fn decode_command(line: &str) -> Result<InboundCommand, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(line.trim())?;
    let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let kind = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(DecodeError::MissingType)?;

    match kind {
        "send" => {
            let chat_id = require_str(&value, "send", "chatId")?;
            let message = require_str(&value, "send", "message")?;
            Ok(InboundCommand::Send {
                chat_id: ChatId::from(chat_id),
                message: message.to_owned(),
            })
        }
        other => Err(DecodeError::UnknownType(other.to_owned())),
    }
}

fn require_str<'a>(
    value: &'a serde_json::Value,
    command: &'static str,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or(DecodeError::MissingField { command, field })
}
