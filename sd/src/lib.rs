//! Scheduler - per-user admission control for rate-limited API calls
//!
//! Local producers describe outbound API calls in small datagrams. The
//! scheduler admits each call immediately, holds it in a per-user priority
//! queue, or displaces a less urgent admitted call, then performs the HTTP
//! request on a dedicated dispatch reactor and retries failures through the
//! queue.
//!
//! # Core Concepts
//!
//! - **Bucket**: each user gets a fixed number of admissions per drain window
//! - **Niceness**: lower priority values are more urgent; only urgent classes skip the queue
//! - **Aging**: every drain tick makes each still-queued request one step more urgent
//! - **Linking**: a request for an endpoint already in flight is absorbed, not sent twice
//!
//! # Modules
//!
//! - [`intake`] - Datagram socket, wire format parser and client
//! - [`scheduler`] - Registry, queues, buckets and the drain tick
//! - [`dispatch`] - HTTP dispatch engine and body worker
//! - [`daemon`] - Wiring of all components under one shutdown signal
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod domain;
pub mod intake;
pub mod scheduler;

// Re-export commonly used types
pub use config::{Config, DispatchConfig, IntakeConfig};
pub use daemon::{Daemon, DaemonSummary};
pub use dispatch::{DispatchEngine, DispatchError, DispatchJob, EngineStep, ReqwestTransport, ResponseBody, Transport};
pub use domain::{Request, RequestClass, RequestId, RequestStatus};
pub use intake::{IntakeClient, ParseError, Submission, parse_request};
pub use scheduler::{FailureOutcome, QueueState, Scheduler, SchedulerConfig, SchedulerStats, SubmitResult};
