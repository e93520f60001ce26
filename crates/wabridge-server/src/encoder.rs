use tokio::io::{AsyncWrite, AsyncWriteExt};
use wabridge_core::OutboundEvent;

use crate::error::BridgeError;

/// Serialize an event to its wire line, newline included.
pub fn encode_line(event: &OutboundEvent) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

/// Writes outbound events as JSON lines, flushing after each one so an
/// incremental reader sees them immediately.
pub struct EventWriter<W> {
    writer: W,
    written: u64,
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub async fn write_event(&mut self, event: &OutboundEvent) -> Result<(), BridgeError> {
        let line = encode_line(event)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        self.written += 1;
        tracing::trace!(event_type = event.event_type(), "event written");
        Ok(())
    }

    /// Number of events written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}
