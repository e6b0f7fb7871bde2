//! Per-user admission scheduler
//!
//! Combines the request registry, per-user priority queues and per-user
//! admission buckets behind a single lock, plus the periodic drain tick that
//! promotes queued requests and ages the rest.

mod bucket;
mod config;
mod core;
mod drain;
mod outcome;
mod queue;
mod registry;

pub use bucket::{Admission, Bucket, Occupant};
pub use config::SchedulerConfig;
pub use core::Scheduler;
pub use drain::run_drain_loop;
pub use outcome::{DrainReport, FailureOutcome, QueueState, SchedulerStats, SubmitResult};
pub use queue::{QueuedRequest, RequestQueue};
pub use registry::{Registration, Registry, Removed};
