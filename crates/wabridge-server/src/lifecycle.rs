use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use wabridge_core::{ClientError, ClientEvent, MessagingClient};

use crate::config::BridgeConfig;

/// Shared handles every component needs. Built once at startup.
#[derive(Clone)]
pub struct BridgeContext {
    pub client: Arc<dyn MessagingClient>,
    pub config: Arc<BridgeConfig>,
    /// In-flight send tasks.
    pub sends: TaskTracker,
}

impl BridgeContext {
    pub fn new(client: Arc<dyn MessagingClient>, config: BridgeConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            sends: TaskTracker::new(),
        }
    }
}

/// Process-level bridge state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BridgeState {
    Starting,
    AwaitingAuth,
    Ready,
    Running,
    ShuttingDown,
    Terminated,
}

/// How client teardown ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DestroyOutcome {
    Completed,
    Failed(String),
    TimedOut(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    pub destroy: DestroyOutcome,
    /// Sends still running when the drain window closed.
    pub abandoned_sends: usize,
}

/// Owns client creation-to-destruction and the once-only transitions.
pub struct LifecycleController {
    ctx: BridgeContext,
    state: watch::Sender<BridgeState>,
    ready_emitted: AtomicBool,
    shutdown: OnceCell<ShutdownReport>,
}

impl LifecycleController {
    pub fn new(ctx: BridgeContext) -> Self {
        let (state, _) = watch::channel(BridgeState::Starting);
        Self {
            ctx,
            state,
            ready_emitted: AtomicBool::new(false),
            shutdown: OnceCell::new(),
        }
    }

    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Subscribe to the client and kick off initialization in the background.
    ///
    /// Returns the client event stream and the initialization task. The task
    /// resolves to the client's verdict; failures are already logged.
    pub fn start(&self) -> (mpsc::Receiver<ClientEvent>, JoinHandle<Result<(), ClientError>>) {
        let (tx, rx) = mpsc::channel(self.ctx.config.event_buffer);
        let client = Arc::clone(&self.ctx.client);
        client.subscribe(tx);
        tracing::info!(client = client.name(), "initializing messaging client");

        let handle = tokio::spawn(async move {
            let result = client.initialize().await;
            match &result {
                Ok(()) => tracing::debug!("client initialize returned"),
                Err(e) => {
                    tracing::error!(error = %e, kind = e.error_kind(), "client initialization failed")
                }
            }
            result
        });
        (rx, handle)
    }

    /// Record a login-code request. Only moves the state before readiness.
    pub fn note_qr(&self) {
        self.state.send_if_modified(|s| {
            if *s == BridgeState::Starting {
                *s = BridgeState::AwaitingAuth;
                true
            } else {
                false
            }
        });
    }

    /// Returns true exactly once: the caller that gets true emits `ready`.
    pub fn mark_ready(&self) -> bool {
        if self.ready_emitted.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.state.send_if_modified(|s| {
            if *s < BridgeState::Ready {
                *s = BridgeState::Ready;
                true
            } else {
                false
            }
        });
        true
    }

    pub fn is_ready(&self) -> bool {
        self.ready_emitted.load(Ordering::SeqCst)
    }

    /// First forwarded message moves READY to RUNNING.
    pub fn note_message_forwarded(&self) {
        self.state.send_if_modified(|s| {
            if *s == BridgeState::Ready {
                *s = BridgeState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Tear the client down. Runs once; concurrent and later callers get the
    /// same report.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutdown.get_or_init(|| self.run_shutdown()).await.clone()
    }

    async fn run_shutdown(&self) -> ShutdownReport {
        self.state.send_replace(BridgeState::ShuttingDown);
        tracing::info!("shutting down messaging client");

        let sends = &self.ctx.sends;
        sends.close();
        let abandoned_sends = if sends.is_empty() {
            0
        } else {
            let drain = self.ctx.config.drain_timeout;
            match tokio::time::timeout(drain, sends.wait()).await {
                Ok(()) => 0,
                Err(_) => {
                    let left = sends.len();
                    tracing::warn!(in_flight = left, ?drain, "abandoning in-flight sends");
                    left
                }
            }
        };

        let limit = self.ctx.config.shutdown_timeout;
        let destroy = match tokio::time::timeout(limit, self.ctx.client.destroy()).await {
            Ok(Ok(())) => {
                tracing::info!("messaging client destroyed");
                DestroyOutcome::Completed
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "client destroy failed, exiting anyway");
                DestroyOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::error!(timeout = ?limit, "client destroy timed out, exiting anyway");
                DestroyOutcome::TimedOut(limit)
            }
        };

        self.state.send_replace(BridgeState::Terminated);
        ShutdownReport {
            destroy,
            abandoned_sends,
        }
    }
}
