//! Intake socket listener

use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::net::UnixDatagram;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::parser::parse_request;
use crate::scheduler::Scheduler;

/// Bind the intake datagram socket at `socket_path`
///
/// Creates the parent directory and replaces a stale socket file left by a
/// previous run.
pub fn bind_at(socket_path: &Path) -> Result<UnixDatagram> {
    debug!(?socket_path, "bind_at: creating intake socket");

    if let Some(parent) = socket_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "bind_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let socket = UnixDatagram::bind(socket_path).context("Failed to bind intake socket")?;
    debug!(?socket_path, "bind_at: socket bound successfully");
    Ok(socket)
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Receive datagrams and submit them to the scheduler until shutdown
///
/// Returns the number of requests handed to the scheduler.
pub async fn run_intake(
    socket: UnixDatagram,
    scheduler: Arc<Scheduler>,
    max_message_size: usize,
    mut shutdown: broadcast::Receiver<()>,
) -> usize {
    // One extra byte tells an oversized datagram apart from one that fits exactly.
    let mut buf = vec![0u8; max_message_size + 1];
    let mut submitted = 0;
    info!(max_message_size, "Intake listening");

    loop {
        let n = tokio::select! {
            _ = shutdown.recv() => {
                info!(submitted, "Intake stopping");
                break;
            }
            received = socket.recv(&mut buf) => match received {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "Intake receive failed");
                    continue;
                }
            },
        };

        if n == 0 {
            debug!("run_intake: empty datagram, ignoring");
            continue;
        }
        if n > max_message_size {
            warn!(max_message_size, "Dropping oversized intake message");
            continue;
        }

        match parse_request(&buf[..n]) {
            Ok(request) => {
                scheduler.submit(request).await;
                submitted += 1;
            }
            Err(e) => warn!(error = %e, bytes = n, "Dropping malformed intake message"),
        }
    }

    submitted
}
