//! Scheduler implementation

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::dispatch::DispatchJob;
use crate::domain::{Request, RequestId, RequestStatus};

use super::bucket::{Admission, Bucket, Occupant};
use super::config::SchedulerConfig;
use super::outcome::{DrainReport, FailureOutcome, QueueState, SchedulerStats, SubmitResult};
use super::queue::{QueuedRequest, RequestQueue};
use super::registry::{Registration, Registry, Removed};

/// Internal state protected by mutex
#[derive(Default)]
struct SchedulerInner {
    /// Owner of every in-flight request
    registry: Registry,

    /// Per-user queues of requests waiting for a slot
    queues: HashMap<u32, RequestQueue>,

    /// Per-user admission windows
    buckets: HashMap<u32, Bucket>,

    /// Statistics
    stats: SchedulerStats,
}

impl SchedulerInner {
    fn submit(&mut self, request: Request, capacity: usize, now: DateTime<Utc>) -> (SubmitResult, Option<DispatchJob>) {
        self.stats.total_submitted += 1;

        let (id, registration) = self.registry.try_register(request);
        if let Registration::Linked { owner } = registration {
            self.stats.total_linked += 1;
            return (SubmitResult::Linked { id, owner }, None);
        }

        let request = &self.registry[id];
        let user_id = request.user_id;
        let admission = self
            .buckets
            .entry(user_id)
            .or_insert_with(|| Bucket::new(user_id, capacity, now))
            .try_admit(id, request);

        match admission {
            Admission::Immediate { evicted } => {
                let evicted = evicted.and_then(|occupant| self.requeue_evicted(occupant));
                let job = admit(&mut self.registry, id, now);
                self.stats.total_admitted += 1;
                (SubmitResult::Dispatched { id, evicted }, job)
            }
            Admission::Queued => {
                let position = self.enqueue(id).unwrap_or_default();
                self.stats.total_queued += 1;
                (SubmitResult::Queued { id, position }, None)
            }
        }
    }

    /// Put a displaced occupant back in its queue if its transfer has not started
    fn requeue_evicted(&mut self, occupant: Occupant) -> Option<RequestId> {
        match self.registry.get(occupant.id).map(|r| r.status) {
            Some(RequestStatus::Admitted) => {
                self.enqueue(occupant.id)?;
                self.stats.total_evicted += 1;
                Some(occupant.id)
            }
            status => {
                debug!(id = %occupant.id, ?status, "Scheduler: evicted occupant already started, slot reclaimed");
                None
            }
        }
    }

    fn enqueue(&mut self, id: RequestId) -> Option<usize> {
        let request = self.registry.get_mut(id)?;
        request.status = RequestStatus::Queued;
        request.scheduled_at = None;

        let queue = self.queues.entry(request.user_id).or_default();
        let position = queue.insert(QueuedRequest::new(id, request.priority));
        self.stats.peak_queue_depth = self.stats.peak_queue_depth.max(queue.len());
        Some(position)
    }

    fn drain(&mut self, capacity: usize, now: DateTime<Utc>) -> (DrainReport, Vec<DispatchJob>) {
        let mut report = DrainReport::default();
        let mut jobs = Vec::new();

        let waiting: Vec<u32> = self
            .queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(user_id, _)| *user_id)
            .collect();
        report.users = waiting.len();

        for user_id in waiting {
            let Some(queue) = self.queues.get_mut(&user_id) else {
                continue;
            };
            let bucket = self
                .buckets
                .entry(user_id)
                .or_insert_with(|| Bucket::new(user_id, capacity, now));

            while !bucket.is_full() {
                let Some(next) = queue.pop_most_urgent() else {
                    break;
                };
                let Some(request) = self.registry.get(next.id) else {
                    warn!(id = %next.id, user_id, "Scheduler::drain: queued request missing from registry");
                    continue;
                };
                bucket.try_fill(next.id, request);
                if let Some(job) = admit(&mut self.registry, next.id, now) {
                    jobs.push(job);
                }
                report.promoted += 1;
            }
        }

        // Users with nothing queued get a fresh bucket lazily on their next request.
        self.queues.retain(|_, queue| !queue.is_empty());
        self.buckets.retain(|user_id, _| self.queues.contains_key(user_id));
        for bucket in self.buckets.values_mut() {
            bucket.recreate(now);
        }

        for queue in self.queues.values_mut() {
            queue.age();
            for entry in queue.iter() {
                if let Some(request) = self.registry.get_mut(entry.id) {
                    request.set_priority(entry.priority);
                    report.aged += 1;
                }
            }
        }

        self.stats.drain_ticks += 1;
        self.stats.total_promoted += report.promoted as u64;
        (report, jobs)
    }

    fn fail(&mut self, key: &str) -> FailureOutcome {
        let Some(id) = self.registry.id_for_key(key) else {
            return FailureOutcome::Unknown;
        };
        let Some(request) = self.registry.lookup_by_key_mut(key) else {
            return FailureOutcome::Unknown;
        };

        if request.take_retry() {
            let remaining_retries = request.remaining_retries;
            self.enqueue(id);
            self.stats.total_retried += 1;
            return FailureOutcome::Retried { id, remaining_retries };
        }

        let discarded = self.registry.remove(key).map(|r| r.discarded.len()).unwrap_or_default();
        self.stats.total_exhausted += 1;
        self.stats.total_discarded_linked += discarded as u64;
        FailureOutcome::Exhausted { id, discarded }
    }
}

/// Mark a request as holding a slot and build its dispatch job
fn admit(registry: &mut Registry, id: RequestId, now: DateTime<Utc>) -> Option<DispatchJob> {
    let request = registry.get_mut(id)?;
    request.status = RequestStatus::Admitted;
    request.scheduled_at = Some(now);
    Some(DispatchJob::new(id, request))
}

/// The Scheduler owns per-user admission buckets, priority queues and the
/// registry of in-flight requests, and feeds admitted requests to the
/// dispatch engine.
pub struct Scheduler {
    config: SchedulerConfig,
    inner: Mutex<SchedulerInner>,
    dispatch_tx: mpsc::UnboundedSender<DispatchJob>,
}

impl Scheduler {
    /// Create a new scheduler sending admitted requests to `dispatch_tx`
    pub fn new(config: SchedulerConfig, dispatch_tx: mpsc::UnboundedSender<DispatchJob>) -> Self {
        debug!(?config, "Scheduler::new: called");
        Self {
            config,
            inner: Mutex::new(SchedulerInner::default()),
            dispatch_tx,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register, admit or queue a freshly parsed request
    pub async fn submit(&self, request: Request) -> SubmitResult {
        debug!(endpoint_key = %request.endpoint_key, user_id = request.user_id, priority = request.priority, "Scheduler::submit: called");
        let (result, job) = {
            let mut inner = self.inner.lock().await;
            inner.submit(request, self.config.bucket_capacity, Utc::now())
        };

        if let Some(job) = job {
            self.dispatch(job);
        }

        match result {
            SubmitResult::Dispatched { id, evicted } => debug!(%id, ?evicted, "Scheduler::submit: dispatched immediately"),
            SubmitResult::Queued { id, position } => debug!(%id, position, "Scheduler::submit: queued"),
            SubmitResult::Linked { id, owner } => debug!(%id, %owner, "Scheduler::submit: linked to in-flight request"),
        }
        result
    }

    /// Promote queued requests into buckets, reset every window, age the rest
    pub async fn drain_tick(&self) -> DrainReport {
        debug!("Scheduler::drain_tick: called");
        let (report, jobs) = {
            let mut inner = self.inner.lock().await;
            inner.drain(self.config.bucket_capacity, Utc::now())
        };

        for job in jobs {
            self.dispatch(job);
        }

        debug!(?report, "Scheduler::drain_tick: done");
        report
    }

    /// Claim an admitted request for transfer
    ///
    /// Returns false when the request was evicted or already started since
    /// its job was emitted; the engine must then skip the job.
    pub async fn mark_dispatched(&self, id: RequestId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.registry.get_mut(id) {
            Some(request) if request.status == RequestStatus::Admitted => {
                request.status = RequestStatus::Dispatched;
                true
            }
            Some(request) => {
                debug!(%id, status = ?request.status, "Scheduler::mark_dispatched: not admitted, skipping");
                false
            }
            None => {
                debug!(%id, "Scheduler::mark_dispatched: unknown request, skipping");
                false
            }
        }
    }

    /// Record a successful transfer and drop the request with its duplicates
    pub async fn complete(&self, key: &str) -> Option<Removed> {
        debug!(%key, "Scheduler::complete: called");
        let mut inner = self.inner.lock().await;
        let removed = inner.registry.remove(key);

        match &removed {
            Some(removed) => {
                inner.stats.total_completed += 1;
                inner.stats.total_discarded_linked += removed.discarded.len() as u64;
                if !removed.discarded.is_empty() {
                    info!(
                        %key,
                        discarded = removed.discarded.len(),
                        "Completed request had linked duplicates; discarding them"
                    );
                }
            }
            None => warn!(%key, "Scheduler::complete: no request owns this key"),
        }
        removed
    }

    /// Record a failed transfer: retry through the queue or give up
    pub async fn fail(&self, key: &str) -> FailureOutcome {
        debug!(%key, "Scheduler::fail: called");
        let mut inner = self.inner.lock().await;
        let outcome = inner.fail(key);

        match outcome {
            FailureOutcome::Retried { id, remaining_retries } => {
                debug!(%id, %key, remaining_retries, "Scheduler::fail: re-queued for retry")
            }
            FailureOutcome::Exhausted { id, discarded } => {
                warn!(%id, %key, discarded, "Request failed with no retries left, abandoning")
            }
            FailureOutcome::Unknown => warn!(%key, "Scheduler::fail: no request owns this key"),
        }
        outcome
    }

    /// Get current occupancy
    pub async fn queue_state(&self) -> QueueState {
        let inner = self.inner.lock().await;
        QueueState {
            in_flight: inner.registry.count(),
            queued: inner.queues.values().map(RequestQueue::len).sum(),
            waiting_users: inner.queues.values().filter(|q| !q.is_empty()).count(),
            occupied_slots: inner.buckets.values().map(Bucket::len).sum(),
            buckets: inner.buckets.len(),
            stats: inner.stats.clone(),
        }
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        self.inner.lock().await.stats.clone()
    }

    /// Number of distinct endpoint keys in flight
    pub async fn in_flight(&self) -> usize {
        self.inner.lock().await.registry.count()
    }

    /// Copy of a registered request
    pub async fn request(&self, id: RequestId) -> Option<Request> {
        self.inner.lock().await.registry.get(id).cloned()
    }

    /// Copy of a user's queue, most urgent first
    pub async fn queued(&self, user_id: u32) -> Vec<QueuedRequest> {
        let inner = self.inner.lock().await;
        inner
            .queues
            .get(&user_id)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Copy of a user's current bucket occupants
    pub async fn occupants(&self, user_id: u32) -> Vec<Occupant> {
        let inner = self.inner.lock().await;
        inner
            .buckets
            .get(&user_id)
            .map(|b| b.occupants().to_vec())
            .unwrap_or_default()
    }

    fn dispatch(&self, job: DispatchJob) {
        if let Err(e) = self.dispatch_tx.send(job) {
            warn!(id = %e.0.id, endpoint_key = %e.0.endpoint_key, "Dispatch engine gone, dropping job");
        }
    }
}
