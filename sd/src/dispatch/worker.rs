//! Response body worker
//!
//! Bodies are handed off the dispatch reactor through a bounded queue so
//! that slow consumers apply backpressure to the engine instead of growing
//! memory without limit.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::RequestId;

/// Bytes shown in the log preview of a body
const PREVIEW_LEN: usize = 64;

/// A successful transfer's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBody {
    pub id: RequestId,
    pub user_id: u32,
    pub endpoint_key: String,
    pub body: Vec<u8>,
}

impl ResponseBody {
    /// Lossy UTF-8 preview of the first bytes of the body
    pub fn preview(&self) -> String {
        let end = self.body.len().min(PREVIEW_LEN);
        let mut preview = String::from_utf8_lossy(&self.body[..end]).replace(['\n', '\r'], " ");
        if self.body.len() > PREVIEW_LEN {
            preview.push_str("...");
        }
        preview
    }
}

/// Spawn the task that consumes response bodies
///
/// Runs until every sender is dropped and returns the number of bodies
/// handled.
pub fn spawn_body_worker(mut rx: mpsc::Receiver<ResponseBody>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        debug!("body worker: started");
        let mut handled = 0;
        while let Some(body) = rx.recv().await {
            handled += 1;
            info!(
                id = %body.id,
                user_id = body.user_id,
                endpoint_key = %body.endpoint_key,
                bytes = body.body.len(),
                preview = %body.preview(),
                "Response received"
            );
        }
        debug!(handled, "body worker: channel closed, exiting");
        handled
    })
}
