//! Intake client for local producers
//!
//! Encodes a submission in the intake wire format and sends it as a single
//! datagram. There is no reply; delivery to a bound socket is the only
//! acknowledgement.

use std::fmt;
use std::path::PathBuf;

use eyre::{Context, Result};
use reqwest::Url;
use tokio::net::UnixDatagram;
use tracing::debug;

use super::MAX_MESSAGE_SIZE;

/// One request as a producer describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub priority: i8,
    pub endpoint: Url,
    pub user_id: u32,
    pub max_retries: u8,
}

impl Submission {
    pub fn new(priority: i8, endpoint: Url, user_id: u32, max_retries: u8) -> Self {
        Self {
            priority,
            endpoint,
            user_id,
            max_retries,
        }
    }

    /// Wire encoding of the submission
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n{}\n{}",
            self.priority, self.endpoint, self.user_id, self.max_retries
        )
    }
}

/// Client for submitting requests to a running scheduler
#[derive(Debug, Clone)]
pub struct IntakeClient {
    socket_path: PathBuf,
}

impl IntakeClient {
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Check if the scheduler socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Send one submission
    pub async fn submit(&self, submission: &Submission) -> Result<()> {
        debug!(socket_path = ?self.socket_path, %submission.endpoint, "IntakeClient::submit: called");
        let payload = submission.encode();
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!(
                "Submission too large: {} bytes (max {})",
                payload.len(),
                MAX_MESSAGE_SIZE
            ));
        }

        let socket = UnixDatagram::unbound().context("Failed to create client socket")?;
        socket
            .send_to(&payload, &self.socket_path)
            .await
            .context(format!("Failed to send to {}", self.socket_path.display()))?;
        Ok(())
    }
}
