use std::time::Duration;

use crate::error::BridgeError;

/// Text of the `ready` event unless overridden.
pub const DEFAULT_READY_MESSAGE: &str = "WhatsApp Bot is ready!";

/// Runtime knobs for the bridge.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Payload of the single `ready` event.
    pub ready_message: String,
    /// Client events buffered before the client is made to wait.
    pub event_buffer: usize,
    /// Upper bound on a single send. Expiry is reported like a send failure.
    pub send_timeout: Duration,
    /// Upper bound on client teardown once shutdown starts.
    pub shutdown_timeout: Duration,
    /// How long shutdown lets in-flight sends finish before destroying the client.
    pub drain_timeout: Duration,
    /// Inbound lines longer than this are discarded.
    pub max_line_bytes: usize,
    /// Treat a failed `initialize` as fatal instead of waiting for a signal.
    pub exit_on_init_failure: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ready_message: DEFAULT_READY_MESSAGE.to_string(),
            event_buffer: 256,
            send_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(2),
            max_line_bytes: 1024 * 1024,
            exit_on_init_failure: false,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.event_buffer == 0 {
            return Err(BridgeError::Config("event_buffer must be at least 1".into()));
        }
        if self.max_line_bytes == 0 {
            return Err(BridgeError::Config("max_line_bytes must be at least 1".into()));
        }
        if self.send_timeout.is_zero() {
            return Err(BridgeError::Config("send_timeout must be non-zero".into()));
        }
        if self.shutdown_timeout.is_zero() {
            return Err(BridgeError::Config("shutdown_timeout must be non-zero".into()));
        }
        Ok(())
    }
}
