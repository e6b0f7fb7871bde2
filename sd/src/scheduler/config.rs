//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max admitted requests per user per bucket window
    #[serde(rename = "bucket-capacity", default = "default_bucket_capacity")]
    pub bucket_capacity: usize,

    /// Drain tick interval in seconds; also the bucket window length
    #[serde(rename = "drain-interval-secs", default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
}

fn default_bucket_capacity() -> usize {
    6
}

fn default_drain_interval_secs() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: default_bucket_capacity(),
            drain_interval_secs: default_drain_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Get the drain interval as a Duration
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }
}
