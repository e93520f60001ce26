use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use wabridge_core::{ClientEvent, MessagingClient, MockClient};
use wabridge_server::{BridgeConfig, DEFAULT_READY_MESSAGE};
use wabridge_telemetry::{LogFormat, TelemetryConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClientKind {
    /// In-process client that is ready at once and logs sends.
    Mock,
}

#[derive(Parser, Debug)]
#[command(name = "wabridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bridge a messaging client to JSON lines on stdin/stdout")]
struct Args {
    /// Messaging client to drive
    #[arg(long, value_enum, default_value = "mock", env = "WABRIDGE_CLIENT")]
    client: ClientKind,

    /// Login code the mock client announces before becoming ready
    #[arg(long, env = "WABRIDGE_MOCK_QR")]
    mock_qr: Option<String>,

    /// Text of the `ready` event
    #[arg(long, default_value = DEFAULT_READY_MESSAGE, env = "WABRIDGE_READY_MESSAGE")]
    ready_message: String,

    /// Client events buffered before the client has to wait
    #[arg(long, default_value_t = 256, env = "WABRIDGE_EVENT_BUFFER")]
    event_buffer: usize,

    /// Per-send timeout in seconds
    #[arg(long, default_value_t = 60, env = "WABRIDGE_SEND_TIMEOUT_SECS")]
    send_timeout_secs: u64,

    /// Bound on client teardown in seconds
    #[arg(long, default_value_t = 10, env = "WABRIDGE_SHUTDOWN_TIMEOUT_SECS")]
    shutdown_timeout_secs: u64,

    /// Time given to in-flight sends at shutdown, in milliseconds
    #[arg(long, default_value_t = 2000, env = "WABRIDGE_DRAIN_TIMEOUT_MS")]
    drain_timeout_ms: u64,

    /// Longest accepted command line in bytes
    #[arg(long, default_value_t = 1024 * 1024, env = "WABRIDGE_MAX_LINE_BYTES")]
    max_line_bytes: usize,

    /// Exit with status 1 if client initialization fails
    #[arg(long, env = "WABRIDGE_EXIT_ON_INIT_FAILURE")]
    exit_on_init_failure: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info", env = "WABRIDGE_LOG_LEVEL")]
    log_level: tracing::Level,

    /// Log format on stderr: pretty, compact or json
    #[arg(long, default_value = "pretty", env = "WABRIDGE_LOG_FORMAT")]
    log_format: LogFormat,
}

impl Args {
    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            ready_message: self.ready_message.clone(),
            event_buffer: self.event_buffer,
            send_timeout: Duration::from_secs(self.send_timeout_secs),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            max_line_bytes: self.max_line_bytes,
            exit_on_init_failure: self.exit_on_init_failure,
        }
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level,
            format: self.log_format,
            ..Default::default()
        }
    }

    fn build_client(&self) -> Arc<dyn MessagingClient> {
        match self.client {
            ClientKind::Mock => {
                let mut events = Vec::new();
                if let Some(code) = &self.mock_qr {
                    events.push(ClientEvent::Qr(code.clone()));
                }
                events.push(ClientEvent::Ready);
                Arc::new(MockClient::new().with_init_events(events))
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let telemetry = wabridge_telemetry::init_telemetry(args.telemetry_config());
    tracing::debug!(filter = telemetry.directive(), "telemetry initialized");

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "bridge failed");
            1
        }
    };

    // The stdin reader sits on a blocking thread that runtime teardown would
    // wait for, so leave explicitly.
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let config = args.bridge_config();
    let client = args.build_client();

    let shutdown = CancellationToken::new();
    let _signals =
        spawn_signal_listener(shutdown.clone()).context("failed to install signal handlers")?;

    tracing::info!(client = client.name(), "starting bridge");
    let exit = wabridge_server::run_bridge(
        config,
        client,
        tokio::io::stdin(),
        tokio::io::stdout(),
        shutdown,
    )
    .await
    .context("bridge could not start")?;

    tracing::info!(
        reason = ?exit.reason,
        destroy = ?exit.shutdown.destroy,
        abandoned_sends = exit.shutdown.abandoned_sends,
        "bridge stopped"
    );
    Ok(exit.reason.exit_code())
}

/// Cancel `token` on the first SIGINT/SIGTERM. Later signals are only logged.
#[cfg(unix)]
fn spawn_signal_listener(token: CancellationToken) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = sigint.recv() => "SIGINT",
                Some(()) = sigterm.recv() => "SIGTERM",
                else => break,
            };
            request_shutdown(&token, name);
        }
    }))
}

#[cfg(not(unix))]
fn spawn_signal_listener(token: CancellationToken) -> std::io::Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            request_shutdown(&token, "ctrl-c");
        }
    }))
}

fn request_shutdown(token: &CancellationToken, signal: &str) {
    if token.is_cancelled() {
        tracing::info!(signal, "shutdown already in progress");
    } else {
        tracing::info!(signal, "termination requested");
        token.cancel();
    }
}
