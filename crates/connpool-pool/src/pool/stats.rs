//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a connection pool's partitions and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Fixed number of connections owned by the pool
    capacity: usize,
    /// Connections ready to hand out
    available: usize,
    /// Connections currently lent to callers
    in_use: usize,
    /// Threads blocked waiting for a connection
    waiting: usize,
    /// Successful acquisitions since initialization
    acquired_total: u64,
    /// Successful returns to the available set
    released_total: u64,
    /// Acquisitions that gave up on a deadline
    timeouts: u64,
    /// Acquisitions cancelled while waiting
    cancellations: u64,
}

impl PoolStats {
    /// Create new pool statistics with zeroed counters
    pub fn new(capacity: usize, available: usize, in_use: usize, waiting: usize) -> Self {
        Self {
            capacity,
            available,
            in_use,
            waiting,
            ..Default::default()
        }
    }

    pub(crate) fn with_totals(
        mut self,
        acquired_total: u64,
        released_total: u64,
        timeouts: u64,
        cancellations: u64,
    ) -> Self {
        self.acquired_total = acquired_total;
        self.released_total = released_total;
        self.timeouts = timeouts;
        self.cancellations = cancellations;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.available
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn acquired_total(&self) -> u64 {
        self.acquired_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn cancellations(&self) -> u64 {
        self.cancellations
    }

    /// Calculate pool utilization as a fraction (0.0 to 1.0)
    ///
    /// Returns 0.0 if capacity is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.in_use as f64 / self.capacity as f64
        }
    }

    /// Check if every connection is lent out
    pub fn is_exhausted(&self) -> bool {
        self.available == 0 && self.capacity > 0
    }
}
