//! Daemon wiring
//!
//! Binds the intake socket and starts the drain loop, the body worker and
//! the dispatch engine thread around one shared [`Scheduler`], then waits
//! for a shutdown signal and tears everything down in order.

use std::sync::Arc;

use eyre::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::{DispatchEngine, DispatchJob, ReqwestTransport, Transport, spawn_body_worker};
use crate::intake::{bind_at, cleanup_socket, run_intake};
use crate::scheduler::{Scheduler, SchedulerStats, run_drain_loop};

/// Current version from git describe (set at compile time)
pub const VERSION: &str = env!("GIT_DESCRIBE");

/// Counters reported when the daemon exits
#[derive(Debug, Clone)]
pub struct DaemonSummary {
    /// Requests accepted from the intake socket
    pub submitted: usize,
    /// Response bodies handled by the body worker
    pub responses: usize,
    pub stats: SchedulerStats,
}

/// A configured scheduler daemon, ready to run
pub struct Daemon {
    config: Config,
    scheduler: Arc<Scheduler>,
    dispatch_rx: mpsc::UnboundedReceiver<DispatchJob>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        debug!(?config, "Daemon::new: called");
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Scheduler::new(config.scheduler.clone(), dispatch_tx));
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            scheduler,
            dispatch_rx,
            shutdown_tx,
        }
    }

    /// Shared scheduler, for inspection while the daemon runs
    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Sender that stops the daemon when anything is sent on it
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run with the HTTP transport until shutdown
    pub async fn run(self) -> Result<DaemonSummary> {
        let transport = ReqwestTransport::from_config(&self.config.dispatch).context("Failed to build HTTP client")?;
        self.run_with_transport(transport).await
    }

    /// Run with the given transport until shutdown
    pub async fn run_with_transport<T: Transport>(self, transport: T) -> Result<DaemonSummary> {
        let Self {
            config,
            scheduler,
            dispatch_rx,
            shutdown_tx,
        } = self;
        let socket_path = config.intake.socket_path.clone();

        let intake_shutdown = shutdown_tx.subscribe();
        let drain_shutdown = shutdown_tx.subscribe();
        let engine_shutdown = shutdown_tx.subscribe();

        let socket = bind_at(&socket_path)?;
        info!(socket_path = %socket_path.display(), version = VERSION, "Scheduler daemon starting");

        let (body_tx, body_rx) = mpsc::channel(config.dispatch.body_queue_depth);
        let worker = spawn_body_worker(body_rx);

        let engine = DispatchEngine::new(Arc::clone(&scheduler), transport, dispatch_rx, body_tx);
        let engine_thread = match engine.spawn_on_thread(engine_shutdown) {
            Ok(thread) => thread,
            Err(e) => {
                cleanup_socket(&socket_path);
                return Err(e);
            }
        };

        let drain = tokio::spawn(run_drain_loop(Arc::clone(&scheduler), drain_shutdown));
        let intake = tokio::spawn(run_intake(
            socket,
            Arc::clone(&scheduler),
            config.intake.max_message_size,
            intake_shutdown,
        ));

        let submitted = intake.await.context("Intake task panicked")?;
        drain.await.context("Drain task panicked")?;
        cleanup_socket(&socket_path);

        // The engine owns the body sender; once its thread exits the worker drains and stops.
        let engine_result = tokio::task::spawn_blocking(move || engine_thread.join())
            .await
            .context("Failed to join dispatch thread")?;
        match engine_result {
            Ok(result) => result?,
            Err(_) => warn!("Dispatch thread panicked"),
        }
        let responses = worker.await.context("Body worker panicked")?;

        let state = scheduler.queue_state().await;
        info!(
            submitted,
            responses,
            in_flight = state.in_flight,
            queued = state.queued,
            completed = state.stats.total_completed,
            exhausted = state.stats.total_exhausted,
            "Scheduler daemon stopped"
        );

        Ok(DaemonSummary {
            submitted,
            responses,
            stats: state.stats,
        })
    }
}
