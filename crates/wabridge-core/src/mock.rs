use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{EventSink, MessagingClient};
use crate::errors::ClientError;
use crate::events::ClientEvent;
use crate::ids::ChatId;

/// How `MockClient::destroy` behaves.
#[derive(Clone, Debug, Default)]
pub enum DestroyBehavior {
    #[default]
    Succeed,
    Fail(String),
    /// Never settles. Exercises the shutdown bound.
    Hang,
}

/// Scriptable in-process client for tests and dry runs without a real
/// messaging account.
pub struct MockClient {
    sink: Mutex<Option<EventSink>>,
    init_events: Vec<ClientEvent>,
    init_error: Option<ClientError>,
    send_delay: Duration,
    failing_chats: Vec<ChatId>,
    require_ready: bool,
    destroy_behavior: DestroyBehavior,
    ready: AtomicBool,
    sent: Mutex<Vec<(ChatId, String)>>,
    init_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// A client that becomes ready as soon as it is initialized.
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
            init_events: vec![ClientEvent::Ready],
            init_error: None,
            send_delay: Duration::ZERO,
            failing_chats: Vec::new(),
            require_ready: false,
            destroy_behavior: DestroyBehavior::Succeed,
            ready: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
            destroy_calls: AtomicUsize::new(0),
        }
    }

    /// Replace the events emitted from `initialize`, in order.
    pub fn with_init_events(mut self, events: Vec<ClientEvent>) -> Self {
        self.init_events = events;
        self
    }

    pub fn with_init_error(mut self, error: ClientError) -> Self {
        self.init_error = Some(error);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Sends to this chat are recorded and then fail.
    pub fn failing_for(mut self, chat_id: impl Into<ChatId>) -> Self {
        self.failing_chats.push(chat_id.into());
        self
    }

    /// Reject sends with `NotReady` until a `Ready` event went out.
    pub fn requiring_ready(mut self) -> Self {
        self.require_ready = true;
        self
    }

    pub fn with_destroy(mut self, behavior: DestroyBehavior) -> Self {
        self.destroy_behavior = behavior;
        self
    }

    /// Push an event as if the platform raised it.
    /// Returns false when nobody subscribed or the bridge stopped listening.
    pub async fn emit(&self, event: ClientEvent) -> bool {
        if matches!(event, ClientEvent::Ready) {
            self.ready.store(true, Ordering::SeqCst);
        }
        let sink = self.sink.lock().clone();
        match sink {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Every send call seen so far, failed ones included.
    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().clone()
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().is_some()
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn subscribe(&self, sink: EventSink) {
        *self.sink.lock() = Some(sink);
    }

    async fn initialize(&self) -> Result<(), ClientError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        for event in self.init_events.clone() {
            if !self.emit(event).await {
                tracing::debug!("mock client: no subscriber for init event");
            }
        }
        match &self.init_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), ClientError> {
        self.sent.lock().push((chat_id.clone(), text.to_owned()));
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        if self.require_ready && !self.ready.load(Ordering::SeqCst) {
            return Err(ClientError::NotReady);
        }
        if self.failing_chats.contains(chat_id) {
            return Err(ClientError::Send {
                chat_id: chat_id.clone(),
                reason: "mock failure".into(),
            });
        }
        tracing::info!(chat_id = %chat_id, chars = text.chars().count(), "mock client: message sent");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ClientError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        match &self.destroy_behavior {
            DestroyBehavior::Succeed => Ok(()),
            DestroyBehavior::Fail(reason) => Err(ClientError::Destroy(reason.clone())),
            DestroyBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IncomingMessage;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn initialize_emits_script_in_order() {
        let client = MockClient::new().with_init_events(vec![
            ClientEvent::Qr("code-1".into()),
            ClientEvent::Qr("code-2".into()),
            ClientEvent::Ready,
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        client.subscribe(tx);
        client.initialize().await.unwrap();

        assert_eq!(rx.recv().await, Some(ClientEvent::Qr("code-1".into())));
        assert_eq!(rx.recv().await, Some(ClientEvent::Qr("code-2".into())));
        assert_eq!(rx.recv().await, Some(ClientEvent::Ready));
        assert_eq!(client.init_calls(), 1);
    }

    #[tokio::test]
    async fn emit_without_subscriber_is_false() {
        let client = MockClient::new();
        assert!(!client.emit(ClientEvent::Ready).await);
    }

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let client = MockClient::new();
        let (tx, mut rx) = mpsc::channel(1);
        client.subscribe(tx);
        let msg = IncomingMessage::new("1@c.us", "hi", 10);
        assert!(client.emit(ClientEvent::Message(msg.clone())).await);
        assert_eq!(rx.recv().await, Some(ClientEvent::Message(msg)));
    }

    #[tokio::test]
    async fn send_records_and_fails_for_configured_chat() {
        let client = MockClient::new().failing_for("bad@c.us");
        client.send_message(&ChatId::from("ok@c.us"), "a").await.unwrap();
        let err = client.send_message(&ChatId::from("bad@c.us"), "b").await.unwrap_err();
        assert_eq!(err.error_kind(), "send");
        assert_eq!(client.sent().len(), 2);
    }

    #[tokio::test]
    async fn requiring_ready_rejects_early_sends() {
        let client = MockClient::new().requiring_ready();
        let err = client.send_message(&ChatId::from("1@c.us"), "x").await.unwrap_err();
        assert!(matches!(err, ClientError::NotReady));

        let (tx, _rx) = mpsc::channel(8);
        client.subscribe(tx);
        client.initialize().await.unwrap();
        client.send_message(&ChatId::from("1@c.us"), "y").await.unwrap();
    }

    #[tokio::test]
    async fn init_error_is_returned_after_script() {
        let client = MockClient::new()
            .with_init_events(vec![ClientEvent::Qr("q".into())])
            .with_init_error(ClientError::Initialization("browser crashed".into()));
        let (tx, mut rx) = mpsc::channel(8);
        client.subscribe(tx);
        assert!(client.initialize().await.is_err());
        assert_eq!(rx.recv().await, Some(ClientEvent::Qr("q".into())));
    }

    #[tokio::test]
    async fn destroy_behaviors() {
        let ok = MockClient::new();
        ok.destroy().await.unwrap();
        assert_eq!(ok.destroy_calls(), 1);

        let failing = MockClient::new().with_destroy(DestroyBehavior::Fail("gone".into()));
        assert!(failing.destroy().await.is_err());

        let hanging = MockClient::new().with_destroy(DestroyBehavior::Hang);
        let res = tokio::time::timeout(Duration::from_millis(20), hanging.destroy()).await;
        assert!(res.is_err());
    }
}
