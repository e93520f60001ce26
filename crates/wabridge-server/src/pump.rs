use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wabridge_core::{ClientEvent, OutboundEvent};

use crate::encoder::EventWriter;
use crate::error::BridgeError;
use crate::filter;
use crate::lifecycle::LifecycleController;

/// Turn one client event into the outbound event it produces, if any.
///
/// Client errors and filtered messages produce nothing on the event stream;
/// they surface on the diagnostic channel only.
pub fn route_event(lifecycle: &LifecycleController, event: ClientEvent) -> Option<OutboundEvent> {
    match event {
        ClientEvent::Qr(code) => {
            lifecycle.note_qr();
            tracing::info!("login code received, waiting for scan");
            Some(OutboundEvent::Qr { code })
        }
        ClientEvent::Ready => {
            if !lifecycle.mark_ready() {
                tracing::debug!("duplicate ready signal suppressed");
                return None;
            }
            tracing::info!("messaging client ready");
            Some(OutboundEvent::Ready {
                message: lifecycle.context().config.ready_message.clone(),
            })
        }
        ClientEvent::Message(msg) => {
            if let Err(reason) = filter::check_message(&msg) {
                tracing::debug!(from = %msg.from, %reason, "message dropped");
                return None;
            }
            if !lifecycle.is_ready() {
                tracing::warn!(from = %msg.from, "message before ready dropped");
                return None;
            }
            lifecycle.note_message_forwarded();
            Some(OutboundEvent::from_incoming(&msg))
        }
        ClientEvent::Error(err) => {
            tracing::error!(error = %err, "messaging client error");
            None
        }
    }
}

/// Single consumer of client events: preserves their order on the outbound
/// stream.
pub struct EventPump<W> {
    events: mpsc::Receiver<ClientEvent>,
    writer: EventWriter<W>,
    lifecycle: Arc<LifecycleController>,
}

impl<W: AsyncWrite + Unpin> EventPump<W> {
    pub fn new(
        events: mpsc::Receiver<ClientEvent>,
        writer: EventWriter<W>,
        lifecycle: Arc<LifecycleController>,
    ) -> Self {
        Self {
            events,
            writer,
            lifecycle,
        }
    }

    /// Forward events until cancelled or the client drops its sink.
    /// An outbound write failure ends the pump with an error.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<u64, BridgeError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => {
                        tracing::info!("client event channel closed");
                        break;
                    }
                },
            };

            tracing::trace!(kind = event.kind(), "client event");
            if let Some(outbound) = route_event(&self.lifecycle, event) {
                if let Err(e) = self.writer.write_event(&outbound).await {
                    tracing::error!(error = %e, "outbound stream failed");
                    return Err(e);
                }
            }
        }
        Ok(self.writer.written())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use wabridge_core::{IncomingMessage, MockClient};

    use crate::config::BridgeConfig;
    use crate::lifecycle::{BridgeContext, BridgeState};

    fn lifecycle() -> Arc<LifecycleController> {
        let ctx = BridgeContext::new(Arc::new(MockClient::new()), BridgeConfig::default());
        Arc::new(LifecycleController::new(ctx))
    }

    fn message(from: &str, body: &str) -> ClientEvent {
        ClientEvent::Message(IncomingMessage::new(from, body, 1_700_000_000))
    }

    #[test]
    fn qr_is_forwarded_every_time() {
        let lc = lifecycle();
        for code in ["one", "two", "three"] {
            let out = route_event(&lc, ClientEvent::Qr(code.into()));
            assert_eq!(out, Some(OutboundEvent::Qr { code: code.into() }));
        }
        assert_eq!(lc.state(), BridgeState::AwaitingAuth);
    }

    #[test]
    fn ready_forwarded_once_with_configured_text() {
        let lc = lifecycle();
        assert_eq!(
            route_event(&lc, ClientEvent::Ready),
            Some(OutboundEvent::Ready {
                message: "WhatsApp Bot is ready!".into()
            })
        );
        assert_eq!(route_event(&lc, ClientEvent::Ready), None);
    }

    #[test]
    fn messages_need_ready() {
        let lc = lifecycle();
        assert_eq!(route_event(&lc, message("1@c.us", "early")), None);
        route_event(&lc, ClientEvent::Ready);
        assert!(route_event(&lc, message("1@c.us", "late")).is_some());
        assert_eq!(lc.state(), BridgeState::Running);
    }

    #[test]
    fn filtered_messages_produce_nothing() {
        let lc = lifecycle();
        route_event(&lc, ClientEvent::Ready);
        assert_eq!(route_event(&lc, message("555@g.us", "group")), None);
        assert_eq!(route_event(&lc, message("status@broadcast", "story")), None);
        let own = ClientEvent::Message(IncomingMessage::new("1@c.us", "mine", 0).sent_by_me());
        assert_eq!(route_event(&lc, own), None);
    }

    #[test]
    fn client_errors_produce_nothing() {
        let lc = lifecycle();
        assert_eq!(route_event(&lc, ClientEvent::Error("net down".into())), None);
    }

    #[tokio::test]
    async fn pump_preserves_order_across_event_types() {
        let lc = lifecycle();
        let (tx, rx) = mpsc::channel(16);
        let (out, read) = tokio::io::duplex(8192);
        let pump = EventPump::new(rx, EventWriter::new(out), lc);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pump.run(cancel.clone()));

        tx.send(ClientEvent::Qr("q1".into())).await.unwrap();
        tx.send(ClientEvent::Error("blip".into())).await.unwrap();
        tx.send(ClientEvent::Qr("q2".into())).await.unwrap();
        tx.send(ClientEvent::Ready).await.unwrap();
        tx.send(message("555@g.us", "skip")).await.unwrap();
        tx.send(message("1@c.us", "first")).await.unwrap();
        tx.send(message("1@c.us", "first")).await.unwrap();
        tx.send(message("2@c.us", "second")).await.unwrap();
        drop(tx);

        let written = handle.await.unwrap().unwrap();
        assert_eq!(written, 6);

        let mut lines = BufReader::new(read).lines();
        let mut types = Vec::new();
        let mut bodies = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            let json: serde_json::Value = serde_json::from_str(&line).unwrap();
            types.push(json["type"].as_str().unwrap().to_string());
            if let Some(body) = json.get("message").and_then(|m| m.as_str()) {
                bodies.push(body.to_string());
            }
        }
        assert_eq!(types, ["qr", "qr", "ready", "message", "message", "message"]);
        assert_eq!(
            bodies,
            ["WhatsApp Bot is ready!", "first", "first", "second"]
        );
    }

    #[tokio::test]
    async fn pump_stops_on_cancel() {
        let (_tx, rx) = mpsc::channel(1);
        let (out, _read) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let pump = EventPump::new(rx, EventWriter::new(out), lifecycle());
        cancel.cancel();
        assert_eq!(pump.run(cancel).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pump_fails_when_output_closes() {
        let (tx, rx) = mpsc::channel(4);
        let (out, read) = tokio::io::duplex(64);
        drop(read);
        let pump = EventPump::new(rx, EventWriter::new(out), lifecycle());
        tx.send(ClientEvent::Ready).await.unwrap();
        let err = pump.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
