//! Dispatch engine
//!
//! A single reactor that multiplexes every in-flight transfer. The engine
//! runs on its own OS thread with a `current_thread` runtime, so transfers
//! never compete with intake or the drain tick for a scheduler thread, and
//! no thread is spawned per call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::{Context, Result};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::error::DispatchError;
use super::job::DispatchJob;
use super::transport::Transport;
use super::worker::ResponseBody;
use crate::domain::RequestId;
use crate::scheduler::{FailureOutcome, Scheduler};

/// A finished transfer waiting to be reported to the scheduler
struct TransferOutcome {
    job: DispatchJob,
    result: Result<Vec<u8>, DispatchError>,
    elapsed: Duration,
}

/// What one reactor step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStep {
    /// A transfer was started
    Started(RequestId),
    /// A job was dropped because its request is no longer admitted
    Skipped(RequestId),
    /// A transfer succeeded and its request was removed
    Completed { id: RequestId, bytes: usize },
    /// A transfer failed
    Failed { id: RequestId, outcome: FailureOutcome },
    /// The job channel is closed and nothing is in flight
    Closed,
}

/// Reactor that turns dispatch jobs into transfers
pub struct DispatchEngine<T: Transport> {
    scheduler: Arc<Scheduler>,
    transport: Arc<T>,
    jobs: mpsc::UnboundedReceiver<DispatchJob>,
    bodies: mpsc::Sender<ResponseBody>,
    in_flight: FuturesUnordered<BoxFuture<'static, TransferOutcome>>,
    jobs_open: bool,
}

impl<T: Transport> DispatchEngine<T> {
    pub fn new(
        scheduler: Arc<Scheduler>,
        transport: T,
        jobs: mpsc::UnboundedReceiver<DispatchJob>,
        bodies: mpsc::Sender<ResponseBody>,
    ) -> Self {
        debug!("DispatchEngine::new: called");
        Self {
            scheduler,
            transport: Arc::new(transport),
            jobs,
            bodies,
            in_flight: FuturesUnordered::new(),
            jobs_open: true,
        }
    }

    /// Number of transfers currently in progress
    pub fn active(&self) -> usize {
        self.in_flight.len()
    }

    /// Run one reactor step
    ///
    /// Waits for either the next job or the next finished transfer,
    /// whichever comes first. Parks while idle.
    pub async fn poll_once(&mut self) -> EngineStep {
        tokio::select! {
            job = self.jobs.recv(), if self.jobs_open => match job {
                Some(job) => self.start(job).await,
                None => {
                    debug!("DispatchEngine::poll_once: job channel closed");
                    self.jobs_open = false;
                    if self.in_flight.is_empty() {
                        EngineStep::Closed
                    } else {
                        match self.in_flight.next().await {
                            Some(outcome) => self.finish(outcome).await,
                            None => EngineStep::Closed,
                        }
                    }
                }
            },
            Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => self.finish(outcome).await,
            else => EngineStep::Closed,
        }
    }

    /// Step the reactor until shutdown or until the job channel closes and
    /// every transfer has finished
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Dispatch engine started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(abandoned = self.in_flight.len(), "Dispatch engine stopping");
                    break;
                }
                step = self.poll_once() => {
                    if step == EngineStep::Closed {
                        info!("Dispatch engine: no more jobs, exiting");
                        break;
                    }
                }
            }
        }
    }

    /// Move the engine onto a dedicated thread with its own reactor
    pub fn spawn_on_thread(self, shutdown: broadcast::Receiver<()>) -> Result<std::thread::JoinHandle<Result<()>>> {
        std::thread::Builder::new()
            .name("sd-dispatch".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("Failed to build dispatch runtime")?;
                runtime.block_on(self.run(shutdown));
                Ok(())
            })
            .context("Failed to spawn dispatch thread")
    }

    async fn start(&mut self, job: DispatchJob) -> EngineStep {
        debug!(id = %job.id, endpoint_key = %job.endpoint_key, "DispatchEngine::start: called");
        if !self.scheduler.mark_dispatched(job.id).await {
            return EngineStep::Skipped(job.id);
        }

        let id = job.id;
        let transport = Arc::clone(&self.transport);
        self.in_flight.push(Box::pin(async move {
            let started = Instant::now();
            let result = transport.get(&job.endpoint).await;
            TransferOutcome {
                job,
                result,
                elapsed: started.elapsed(),
            }
        }));
        debug!(%id, active = self.in_flight.len(), "DispatchEngine::start: transfer started");
        EngineStep::Started(id)
    }

    async fn finish(&mut self, outcome: TransferOutcome) -> EngineStep {
        let TransferOutcome { job, result, elapsed } = outcome;
        match result {
            Ok(body) => {
                let bytes = body.len();
                debug!(id = %job.id, endpoint_key = %job.endpoint_key, bytes, ?elapsed, "Transfer completed");
                let response = ResponseBody {
                    id: job.id,
                    user_id: job.user_id,
                    endpoint_key: job.endpoint_key.clone(),
                    body,
                };
                if self.bodies.send(response).await.is_err() {
                    warn!(id = %job.id, "Body worker gone, dropping response body");
                }
                self.scheduler.complete(&job.endpoint_key).await;
                EngineStep::Completed { id: job.id, bytes }
            }
            Err(e) => {
                warn!(
                    id = %job.id,
                    endpoint_key = %job.endpoint_key,
                    error = %e,
                    retryable = e.is_retryable(),
                    ?elapsed,
                    "Transfer failed"
                );
                let outcome = self.scheduler.fail(&job.endpoint_key).await;
                EngineStep::Failed { id: job.id, outcome }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::transport::mock::ScriptedTransport;
    use crate::domain::Request;
    use crate::scheduler::{SchedulerConfig, SubmitResult};
    use reqwest::Url;

    struct Harness {
        scheduler: Arc<Scheduler>,
        engine: DispatchEngine<ScriptedTransport>,
        bodies: mpsc::Receiver<ResponseBody>,
    }

    fn harness(transport: ScriptedTransport) -> Harness {
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let (body_tx, body_rx) = mpsc::channel(16);
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), dispatch_tx));
        let engine = DispatchEngine::new(Arc::clone(&scheduler), transport, dispatch_rx, body_tx);
        Harness {
            scheduler,
            engine,
            bodies: body_rx,
        }
    }

    fn request(path: &str, priority: i8, retries: u8) -> Request {
        let url = Url::parse(&format!("https://api.example.com{}", path)).unwrap();
        Request::new(priority, url, 1, retries)
    }

    /// Poll until the engine has been idle for a short while
    async fn settle(engine: &mut DispatchEngine<ScriptedTransport>) -> Vec<EngineStep> {
        let mut steps = Vec::new();
        while let Ok(step) = tokio::time::timeout(Duration::from_millis(100), engine.poll_once()).await {
            steps.push(step);
        }
        steps
    }

    #[tokio::test]
    async fn test_successful_transfer_completes_request() {
        let mut h = harness(ScriptedTransport::new());

        let SubmitResult::Dispatched { id, .. } = h.scheduler.submit(request("/a?x=1", 0, 0)).await else {
            panic!("Expected dispatch");
        };

        assert_eq!(h.engine.poll_once().await, EngineStep::Started(id));
        assert_eq!(h.engine.active(), 1);
        assert_eq!(h.engine.poll_once().await, EngineStep::Completed { id, bytes: 6 });
        assert_eq!(h.engine.active(), 0);

        let body = h.bodies.recv().await.unwrap();
        assert_eq!(body.id, id);
        assert_eq!(body.body, b"/a?x=1");
        assert_eq!(h.scheduler.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_failed_transfer_retries_then_exhausts() {
        let mut h = harness(ScriptedTransport::failing("/flaky", 5));

        let SubmitResult::Dispatched { id, .. } = h.scheduler.submit(request("/flaky", 0, 1)).await else {
            panic!("Expected dispatch");
        };

        assert_eq!(h.engine.poll_once().await, EngineStep::Started(id));
        assert_eq!(
            h.engine.poll_once().await,
            EngineStep::Failed {
                id,
                outcome: FailureOutcome::Retried {
                    id,
                    remaining_retries: 0
                }
            }
        );
        assert_eq!(h.scheduler.queued(1).await.len(), 1);

        h.scheduler.drain_tick().await;
        assert_eq!(h.engine.poll_once().await, EngineStep::Started(id));
        assert_eq!(
            h.engine.poll_once().await,
            EngineStep::Failed {
                id,
                outcome: FailureOutcome::Exhausted { id, discarded: 0 }
            }
        );
        assert_eq!(h.scheduler.in_flight().await, 0);
        assert!(h.bodies.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_second_attempt() {
        let mut h = harness(ScriptedTransport::failing("/flaky", 1));

        h.scheduler.submit(request("/flaky", 0, 2)).await;
        settle(&mut h.engine).await;
        h.scheduler.drain_tick().await;
        let steps = settle(&mut h.engine).await;

        assert!(steps.iter().any(|s| matches!(s, EngineStep::Completed { .. })));
        assert_eq!(h.scheduler.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_evicted_job_is_skipped() {
        let mut h = harness(ScriptedTransport::new());

        let mut ids = Vec::new();
        for (i, priority) in [-15, -14, -13, -12, -11, -10].into_iter().enumerate() {
            let SubmitResult::Dispatched { id, .. } = h.scheduler.submit(request(&format!("/r{}", i), priority, 0)).await
            else {
                panic!("Expected dispatch");
            };
            ids.push(id);
        }
        let SubmitResult::Dispatched { evicted, .. } = h.scheduler.submit(request("/urgent", -20, 0)).await else {
            panic!("Expected dispatch");
        };
        assert_eq!(evicted, Some(ids[5]));

        let steps = settle(&mut h.engine).await;
        assert!(steps.contains(&EngineStep::Skipped(ids[5])));
        assert_eq!(steps.iter().filter(|s| matches!(s, EngineStep::Started(_))).count(), 6);
        assert_eq!(steps.iter().filter(|s| matches!(s, EngineStep::Completed { .. })).count(), 6);

        // The evicted request is still waiting for the next window.
        assert_eq!(h.scheduler.in_flight().await, 1);
        assert_eq!(h.scheduler.queued(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness(ScriptedTransport::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(h.engine.run(shutdown_rx));
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[test]
    fn test_spawn_on_thread_processes_jobs() {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let h = runtime.block_on(async { harness(ScriptedTransport::new()) });
        let Harness {
            scheduler,
            engine,
            mut bodies,
        } = h;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let thread = engine.spawn_on_thread(shutdown_rx).unwrap();

        runtime.block_on(async {
            scheduler.submit(request("/threaded", 0, 0)).await;
            let body = tokio::time::timeout(Duration::from_secs(2), bodies.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(body.body, b"/threaded");
        });

        shutdown_tx.send(()).unwrap();
        thread.join().unwrap().unwrap();
    }
}
