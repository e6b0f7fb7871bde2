//! Per-user priority queue of admitted-but-undispatched requests

use std::collections::VecDeque;

use crate::domain::RequestId;

/// A queue entry: the request id and its current niceness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedRequest {
    pub id: RequestId,
    pub priority: i8,
}

impl QueuedRequest {
    pub fn new(id: RequestId, priority: i8) -> Self {
        Self { id, priority }
    }

    /// Most urgent first, then earliest arrival
    fn sort_key(&self) -> (i8, RequestId) {
        (self.priority, self.id)
    }
}

/// Ordered queue, most urgent request at the front
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<QueuedRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping order, returning the zero-based position
    pub fn insert(&mut self, entry: QueuedRequest) -> usize {
        let position = self.entries.partition_point(|e| e.sort_key() < entry.sort_key());
        self.entries.insert(position, entry);
        position
    }

    pub fn pop_most_urgent(&mut self) -> Option<QueuedRequest> {
        self.entries.pop_front()
    }

    /// Make every queued request one step more urgent
    ///
    /// Returns the number of entries aged.
    pub fn age(&mut self) -> usize {
        for entry in self.entries.iter_mut() {
            entry.priority = entry.priority.saturating_sub(1);
        }
        // Saturation at i8::MIN can produce ties that arrival order must break.
        self.entries.make_contiguous().sort_by_key(QueuedRequest::sort_key);
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedRequest> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
