use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;
use wabridge_core::MessagingClient;

use crate::config::BridgeConfig;
use crate::dispatcher::{CommandDispatcher, DispatchStats};
use crate::encoder::EventWriter;
use crate::error::BridgeError;
use crate::lifecycle::{BridgeContext, LifecycleController, ShutdownReport};
use crate::pump::EventPump;

/// Why the bridge stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// External termination request.
    Shutdown,
    /// The controller stopped reading our events.
    OutputClosed(String),
    /// The client dropped its event sink.
    ClientClosed,
    /// `initialize` failed and the config makes that fatal.
    InitFailed(String),
}

impl ExitReason {
    /// Process exit status for this reason.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Shutdown => 0,
            Self::OutputClosed(_) | Self::ClientClosed | Self::InitFailed(_) => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BridgeExit {
    pub reason: ExitReason,
    pub shutdown: ShutdownReport,
    /// Present when the command reader finished before shutdown.
    pub commands: Option<DispatchStats>,
}

/// Run the bridge until `shutdown` is cancelled or a fatal condition occurs.
///
/// Events from `client` go to `output` as JSON lines; commands are read from
/// `input`. The client is always torn down before this returns.
pub async fn run_bridge<R, W>(
    config: BridgeConfig,
    client: Arc<dyn MessagingClient>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> Result<BridgeExit, BridgeError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    config.validate()?;
    let ctx = BridgeContext::new(client, config);
    let exit_on_init_failure = ctx.config.exit_on_init_failure;
    let lifecycle = Arc::new(LifecycleController::new(ctx.clone()));
    let stop = shutdown.child_token();

    let (events, mut init) = lifecycle.start();

    let pump = EventPump::new(events, EventWriter::new(output), Arc::clone(&lifecycle));
    let mut pump_task = tokio::spawn(pump.run(stop.clone()));

    let dispatcher = CommandDispatcher::new(&ctx);
    let mut reader_task = tokio::spawn({
        let stop = stop.clone();
        async move { dispatcher.run(BufReader::new(input), stop).await }
    });

    let mut init_pending = true;
    let mut reader_done = None;
    let reason = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break ExitReason::Shutdown,

            res = &mut pump_task => {
                break match res {
                    Ok(Err(e)) => ExitReason::OutputClosed(e.to_string()),
                    Ok(Ok(_)) => ExitReason::ClientClosed,
                    Err(e) => ExitReason::OutputClosed(format!("event pump panicked: {e}")),
                };
            }

            res = &mut init, if init_pending => {
                init_pending = false;
                let failure = match res {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(e) => Some(format!("initialize task panicked: {e}")),
                };
                if let Some(failure) = failure {
                    if exit_on_init_failure {
                        break ExitReason::InitFailed(failure);
                    }
                    tracing::warn!("continuing without a ready client; waiting for termination");
                }
            }

            res = &mut reader_task, if reader_done.is_none() => {
                // Controller closed stdin: keep forwarding events until told to stop.
                reader_done = Some(match res {
                    Ok(stats) => stats,
                    Err(e) => {
                        tracing::error!(error = %e, "command reader panicked");
                        DispatchStats::default()
                    }
                });
            }
        }
    };

    tracing::info!(?reason, "bridge stopping");
    stop.cancel();
    if init_pending {
        init.abort();
    }

    let report = lifecycle.shutdown().await;

    if reader_done.is_none() {
        match reader_task.await {
            Ok(stats) => reader_done = Some(stats),
            Err(e) => tracing::error!(error = %e, "command reader panicked"),
        }
    }
    if !pump_task.is_finished() {
        pump_task.abort();
    }

    Ok(BridgeExit {
        reason,
        shutdown: report,
        commands: reader_done,
    })
}
