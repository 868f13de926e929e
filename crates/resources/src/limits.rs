//! Admission counters

use serde::{Deserialize, Serialize};

/// Snapshot of a load shedder's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShedderStats {
    /// Bytes currently reserved by admitted fetches
    pub size_in_flight: u64,
    /// Number of admitted fetches that have not released yet
    pub requests_in_flight: u64,
    /// Total number of requests shed since start
    pub requests_shed: u64,
    pub max_size_in_flight: u64,
}

impl ShedderStats {
    /// Bytes still available before shedding starts
    #[must_use]
    pub fn headroom(&self) -> u64 {
        self.max_size_in_flight.saturating_sub(self.size_in_flight)
    }

    /// Check if nothing is currently reserved
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.requests_in_flight == 0 && self.size_in_flight == 0
    }
}
