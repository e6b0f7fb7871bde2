//! Per-user admission bucket
//!
//! A bucket is a fixed number of slots that one user may fill within a
//! window. Windows are discrete: every drain tick recreates the bucket
//! rather than sliding it.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{Request, RequestId};

/// A request holding a bucket slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub id: RequestId,
    /// Niceness at admission time
    pub priority: i8,
}

/// Result of [`Bucket::try_admit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Slot granted; `evicted` is the occupant displaced to make room
    Immediate { evicted: Option<Occupant> },
    /// No slot; the request belongs in the user's queue
    Queued,
}

/// Time-boxed admission window for one user
#[derive(Debug, Clone)]
pub struct Bucket {
    user_id: u32,
    window_start: DateTime<Utc>,
    capacity: usize,
    occupants: Vec<Occupant>,
}

impl Bucket {
    pub fn new(user_id: u32, capacity: usize, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            window_start: now,
            capacity,
            occupants: Vec::with_capacity(capacity + 1),
        }
    }

    /// Admit an arriving request, displacing a less urgent occupant if full
    pub fn try_admit(&mut self, id: RequestId, request: &Request) -> Admission {
        if !request.class.is_urgent() {
            debug!(%id, user_id = self.user_id, class = %request.class, "Bucket::try_admit: generic, queuing");
            return Admission::Queued;
        }

        let incoming = Occupant {
            id,
            priority: request.priority,
        };

        if self.occupants.len() < self.capacity {
            self.occupants.push(incoming);
            debug!(%id, user_id = self.user_id, occupants = self.occupants.len(), "Bucket::try_admit: free slot");
            return Admission::Immediate { evicted: None };
        }

        self.occupants.sort_by_key(|o| o.priority);
        match self.occupants.last() {
            Some(least_urgent) if least_urgent.priority > request.priority => {
                let evicted = self.occupants.pop();
                self.occupants.push(incoming);
                debug!(%id, user_id = self.user_id, ?evicted, "Bucket::try_admit: evicted less urgent occupant");
                Admission::Immediate { evicted }
            }
            _ => {
                debug!(%id, user_id = self.user_id, "Bucket::try_admit: full, queuing");
                Admission::Queued
            }
        }
    }

    /// Fill a free slot without comparing priorities
    ///
    /// Returns the slots left after insertion, or `None` if the bucket was
    /// already full and nothing was inserted.
    pub fn try_fill(&mut self, id: RequestId, request: &Request) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        self.occupants.push(Occupant {
            id,
            priority: request.priority,
        });
        Some(self.remaining())
    }

    /// Start a fresh window with no occupants
    pub fn recreate(&mut self, now: DateTime<Utc>) {
        debug!(
            user_id = self.user_id,
            released = self.occupants.len(),
            previous_window = %self.window_start,
            "Bucket::recreate: new window"
        );
        self.occupants.clear();
        self.window_start = now;
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.occupants.len())
    }

}
