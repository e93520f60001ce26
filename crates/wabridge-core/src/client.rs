use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::ClientError;
use crate::events::ClientEvent;
use crate::ids::ChatId;

/// Channel a client pushes its events into. Bounded: a client blocks only
/// when the bridge has fallen a full buffer behind.
pub type EventSink = mpsc::Sender<ClientEvent>;

/// Capability surface of the messaging-platform client the bridge drives.
///
/// Implementations own connection, authentication and transport. The bridge
/// only subscribes to events, initializes, sends text and tears down.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    fn name(&self) -> &str;

    /// Register the sink for `qr`, `ready`, `message` and `error` events.
    /// Called once, before `initialize`.
    fn subscribe(&self, sink: EventSink);

    /// Start connecting. May run for an unbounded time (network, login).
    async fn initialize(&self) -> Result<(), ClientError>;

    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), ClientError>;

    /// Orderly teardown of the session.
    async fn destroy(&self) -> Result<(), ClientError>;
}
