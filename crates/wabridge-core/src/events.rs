use serde::{Deserialize, Serialize};

use crate::ids::ChatId;

/// Events written to the controlling process, one JSON object per line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    /// A login code the controller may render for scanning.
    #[serde(rename = "qr")]
    Qr {
        #[serde(rename = "qr")]
        code: String,
    },

    /// MUST precede every `Message`. Emitted once per process.
    #[serde(rename = "ready")]
    Ready { message: String },

    #[serde(rename = "message")]
    Message {
        #[serde(rename = "message")]
        body: String,
        sender: ChatId,
        #[serde(rename = "chatId")]
        chat_id: ChatId,
        timestamp: i64,
    },
}

impl OutboundEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Qr { .. } => "qr",
            Self::Ready { .. } => "ready",
            Self::Message { .. } => "message",
        }
    }

    /// Build the forwarded form of an inbound chat message.
    pub fn from_incoming(msg: &IncomingMessage) -> Self {
        Self::Message {
            body: msg.body.clone(),
            sender: msg.from.clone(),
            chat_id: msg.from.clone(),
            timestamp: msg.timestamp,
        }
    }
}

/// A chat message as delivered by the messaging client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub body: String,
    pub from: ChatId,
    /// Set when the message was sent by the bridge's own account.
    pub from_me: bool,
    /// Seconds since the Unix epoch, as reported by the client.
    pub timestamp: i64,
}

impl IncomingMessage {
    pub fn new(from: impl Into<ChatId>, body: impl Into<String>, timestamp: i64) -> Self {
        Self {
            body: body.into(),
            from: from.into(),
            from_me: false,
            timestamp,
        }
    }

    pub fn sent_by_me(mut self) -> Self {
        self.from_me = true;
        self
    }
}

/// Everything a messaging client can push to the bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// A fresh login code is required. May repeat when codes expire.
    Qr(String),
    Ready,
    Message(IncomingMessage),
    /// Transport or session fault. Diagnostic only.
    Error(String),
}

impl ClientEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Qr(_) => "qr",
            Self::Ready => "ready",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_event_wire_shape() {
        let evt = OutboundEvent::Qr { code: "2@abc,def".into() };
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(json, serde_json::json!({"type": "qr", "qr": "2@abc,def"}));
    }

    #[test]
    fn ready_event_wire_shape() {
        let evt = OutboundEvent::Ready { message: "WhatsApp Bot is ready!".into() };
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "ready", "message": "WhatsApp Bot is ready!"})
        );
    }

    #[test]
    fn message_event_wire_shape() {
        let msg = IncomingMessage::new("48123@c.us", "hello", 1_700_000_000);
        let json = serde_json::to_value(OutboundEvent::from_incoming(&msg)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "message",
                "message": "hello",
                "sender": "48123@c.us",
                "chatId": "48123@c.us",
                "timestamp": 1_700_000_000i64,
            })
        );
    }

    #[test]
    fn escaped_strings_survive_decode() {
        let evt = OutboundEvent::Message {
            body: "line one\nline \"two\"\t\\ zażółć 🚀".into(),
            sender: ChatId::from("1@c.us"),
            chat_id: ChatId::from("1@c.us"),
            timestamp: -5,
        };
        let json = serde_json::to_string(&evt).unwrap();
        assert!(!json.contains('\n'));
        let parsed: OutboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, evt);
    }

    #[test]
    fn event_type_matches_tag() {
        let events = [
            OutboundEvent::Qr { code: "x".into() },
            OutboundEvent::Ready { message: "y".into() },
            OutboundEvent::from_incoming(&IncomingMessage::new("1@c.us", "z", 0)),
        ];
        for evt in &events {
            let json = serde_json::to_value(evt).unwrap();
            assert_eq!(json["type"], evt.event_type());
        }
    }

    #[test]
    fn sent_by_me_sets_flag() {
        let msg = IncomingMessage::new("1@c.us", "hi", 0).sent_by_me();
        assert!(msg.from_me);
    }
}
