//! Datagram intake
//!
//! Producers send one request per datagram on a local Unix socket. Intake is
//! fire-and-forget: nothing is written back, and malformed messages are
//! logged and dropped.

mod client;
mod listener;
mod parser;

pub use client::{IntakeClient, Submission};
pub use listener::{bind_at, cleanup_socket, run_intake};
pub use parser::{ParseError, parse_request};

/// Largest datagram accepted on the intake socket
pub const MAX_MESSAGE_SIZE: usize = 128;

/// Socket path used when neither the command line nor the config names one
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/scheduler.sock";
