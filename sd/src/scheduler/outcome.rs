//! Result and statistics types for the scheduler

use crate::domain::RequestId;

/// Result of submitting a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitResult {
    /// Admitted into the bucket and handed to the dispatch engine
    Dispatched {
        id: RequestId,
        /// Occupant pushed back onto the queue to make room
        evicted: Option<RequestId>,
    },

    /// Waiting in the user's queue for a drain tick
    Queued { id: RequestId, position: usize },

    /// Same endpoint key already in flight; absorbed into `owner`
    Linked { id: RequestId, owner: RequestId },
}

/// What happened to a request whose transfer failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Re-queued for the next drain tick
    Retried { id: RequestId, remaining_retries: u8 },

    /// Out of retries and removed from the registry
    Exhausted { id: RequestId, discarded: usize },

    /// No request owns the key
    Unknown,
}

/// Summary of one drain tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests moved from queues into buckets
    pub promoted: usize,
    /// Requests aged in place
    pub aged: usize,
    /// Users whose queue was non-empty at the start of the tick
    pub users: usize,
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    pub total_linked: u64,
    pub total_admitted: u64,
    pub total_queued: u64,
    pub total_evicted: u64,
    pub total_promoted: u64,
    pub total_completed: u64,
    pub total_retried: u64,
    pub total_exhausted: u64,
    pub total_discarded_linked: u64,
    pub drain_ticks: u64,
    pub peak_queue_depth: usize,
}

/// Snapshot of scheduler occupancy
#[derive(Debug, Clone)]
pub struct QueueState {
    /// Distinct endpoint keys in flight
    pub in_flight: usize,
    /// Requests waiting across all user queues
    pub queued: usize,
    /// Users with a non-empty queue
    pub waiting_users: usize,
    /// Slots taken across all buckets in the current window
    pub occupied_slots: usize,
    /// Users holding a bucket in the current window
    pub buckets: usize,
    pub stats: SchedulerStats,
}
