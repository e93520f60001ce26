use std::future::Future;
use std::io;
use std::pin::pin;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use wabridge_core::{decode_command, ChatId, DecodeError, InboundCommand, MessagingClient};

use crate::lifecycle::BridgeContext;

/// What happened to one inbound line.
#[derive(Debug)]
pub enum LineOutcome {
    Blank,
    Dispatched(InboundCommand),
    Rejected(DecodeError),
}

/// Counters reported when the inbound stream ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub lines: u64,
    pub dispatched: u64,
    pub rejected: u64,
}

/// Reads commands line by line and hands them to the client.
///
/// Sends reach the client in read order but are never awaited here, so a
/// slow send does not hold up the next line.
pub struct CommandDispatcher {
    client: Arc<dyn MessagingClient>,
    sends: TaskTracker,
    send_timeout: Duration,
    max_line_bytes: usize,
    /// Fires once the most recently dispatched send has called into the client.
    last_started: Mutex<Option<oneshot::Receiver<()>>>,
}

impl CommandDispatcher {
    pub fn new(ctx: &BridgeContext) -> Self {
        Self {
            client: Arc::clone(&ctx.client),
            sends: ctx.sends.clone(),
            send_timeout: ctx.config.send_timeout,
            max_line_bytes: ctx.config.max_line_bytes,
            last_started: Mutex::new(None),
        }
    }

    /// Decode one line and dispatch it. Never fails: bad input is logged.
    pub fn handle_line(&self, line: &str) -> LineOutcome {
        if line.trim().is_empty() {
            return LineOutcome::Blank;
        }
        match decode_command(line) {
            Ok(cmd) => {
                self.dispatch(cmd.clone());
                LineOutcome::Dispatched(cmd)
            }
            Err(e) => {
                log_rejected(&e);
                LineOutcome::Rejected(e)
            }
        }
    }

    fn dispatch(&self, cmd: InboundCommand) {
        match cmd {
            InboundCommand::Send { chat_id, message } => {
                tracing::debug!(chat_id = %chat_id, "dispatching send");
                let (started_tx, started_rx) = oneshot::channel();
                let previous = self.last_started.lock().replace(started_rx);
                self.sends.spawn(send_in_turn(
                    Arc::clone(&self.client),
                    chat_id,
                    message,
                    self.send_timeout,
                    previous,
                    started_tx,
                ));
            }
        }
    }

    /// Consume the inbound stream until EOF, a read error or cancellation.
    pub async fn run<R>(&self, reader: R, cancel: CancellationToken) -> DispatchStats
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = DispatchStats::default();
        let mut lines = CappedLines::new(reader, self.max_line_bytes);

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                frame = lines.next_chunk() => frame,
            };

            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "inbound stream read failed");
                    break;
                }
            };

            let line = match frame {
                Frame::Eof => {
                    tracing::info!("inbound stream closed");
                    break;
                }
                Frame::TooLong => {
                    stats.lines += 1;
                    stats.rejected += 1;
                    log_rejected(&DecodeError::LineTooLong {
                        limit: self.max_line_bytes,
                    });
                    continue;
                }
                Frame::Line(line) => line,
            };

            stats.lines += 1;
            let outcome = match std::str::from_utf8(&line) {
                Ok(line) => self.handle_line(line),
                Err(e) => {
                    tracing::warn!(error = %e, "inbound line is not utf-8, discarded");
                    stats.rejected += 1;
                    continue;
                }
            };

            match outcome {
                LineOutcome::Dispatched(_) => stats.dispatched += 1,
                LineOutcome::Rejected(_) => stats.rejected += 1,
                LineOutcome::Blank => {}
            }
        }

        tracing::debug!(
            lines = stats.lines,
            dispatched = stats.dispatched,
            rejected = stats.rejected,
            "command reader stopped"
        );
        stats
    }
}

/// Wait for the previous send to reach the client, make this send's first
/// call, then let the next one go.
async fn send_in_turn(
    client: Arc<dyn MessagingClient>,
    chat_id: ChatId,
    message: String,
    limit: Duration,
    previous: Option<oneshot::Receiver<()>>,
    started: oneshot::Sender<()>,
) {
    if let Some(previous) = previous {
        // A dropped sender means the previous send already finished or died.
        let _ = previous.await;
    }

    let mut send = pin!(tokio::time::timeout(limit, client.send_message(&chat_id, &message)));
    let first = std::future::poll_fn(|cx| Poll::Ready(send.as_mut().poll(cx))).await;
    let _ = started.send(());
    let result = match first {
        Poll::Ready(result) => result,
        Poll::Pending => send.await,
    };

    match result {
        Ok(Ok(())) => tracing::debug!(chat_id = %chat_id, "send completed"),
        Ok(Err(e)) => {
            tracing::error!(chat_id = %chat_id, error = %e, kind = e.error_kind(), "send failed")
        }
        Err(_) => tracing::error!(chat_id = %chat_id, timeout = ?limit, "send timed out"),
    }
}

/// One step of line framing.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line(Vec<u8>),
    /// The line passed the cap. Its remaining bytes are skipped unbuffered.
    TooLong,
    Eof,
}

/// Newline framing that never holds more than `max` bytes of one line.
struct CappedLines<R> {
    reader: R,
    buf: Vec<u8>,
    max: usize,
    discarding: bool,
}

impl<R: AsyncBufRead + Unpin> CappedLines<R> {
    fn new(reader: R, max: usize) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            max,
            discarding: false,
        }
    }

    /// Consume one buffered chunk. `None` means the line is still incomplete;
    /// returning lets the caller check for cancellation between chunks.
    async fn next_chunk(&mut self) -> io::Result<Option<Frame>> {
        let available = self.reader.fill_buf().await?;
        if available.is_empty() {
            self.discarding = false;
            if self.buf.is_empty() {
                return Ok(Some(Frame::Eof));
            }
            return Ok(Some(Frame::Line(std::mem::take(&mut self.buf))));
        }

        let (used, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };

        let mut frame = None;
        if self.discarding {
            self.discarding = !complete;
        } else if self.buf.len() + used > self.max {
            self.buf.clear();
            self.discarding = !complete;
            frame = Some(Frame::TooLong);
        } else {
            self.buf.extend_from_slice(&available[..used]);
            if complete {
                frame = Some(Frame::Line(std::mem::take(&mut self.buf)));
            }
        }

        self.reader.consume(used);
        Ok(frame)
    }
}

fn log_rejected(e: &DecodeError) {
    match e {
        DecodeError::UnknownType(_) => tracing::info!(error = %e, "command ignored"),
        _ => tracing::warn!(error = %e, kind = e.error_kind(), "command rejected"),
    }
}
