use crate::ids::ChatId;

/// Failures raised by the messaging client.
/// None of these are fatal to the bridge; they are reported as diagnostics.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    #[error("client is not ready")]
    NotReady,

    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("send to {chat_id} failed: {reason}")]
    Send { chat_id: ChatId, reason: String },

    #[error("destroy failed: {0}")]
    Destroy(String),
}

impl ClientError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Initialization(_) => "initialization",
            Self::Send { .. } => "send",
            Self::Destroy(_) => "destroy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_error_names_the_chat() {
        let err = ClientError::Send {
            chat_id: ChatId::from("123@c.us"),
            reason: "timeout".into(),
        };
        assert_eq!(err.to_string(), "send to 123@c.us failed: timeout");
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(ClientError::NotReady.error_kind(), "not_ready");
        assert_eq!(ClientError::Destroy("x".into()).error_kind(), "destroy");
        assert_eq!(
            ClientError::Initialization("x".into()).error_kind(),
            "initialization"
        );
    }
}
