//! HTTP dispatch
//!
//! Admitted requests arrive as [`DispatchJob`]s on an unbounded channel, are
//! fetched by the [`DispatchEngine`] through a [`Transport`], and successful
//! bodies are handed to the body worker.

mod engine;
mod error;
mod job;
mod transport;
mod worker;

pub use engine::{DispatchEngine, EngineStep};
pub use error::DispatchError;
pub use job::DispatchJob;
pub use transport::{ReqwestTransport, Transport};
pub use worker::{ResponseBody, spawn_body_worker};
