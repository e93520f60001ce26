use wabridge_core::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("invalid config: {0}")]
    Config(String),
}
