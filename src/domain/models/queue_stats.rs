//! Derived, read-only LLM queue statistics (spec §3.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub high_size: usize,
    pub low_size: usize,
    pub high_cap: usize,
    pub low_cap: usize,
    pub workers_busy: usize,
    pub workers_total: usize,
    pub background_enabled: bool,
    pub rejections_total: u64,
}

impl QueueStats {
    /// Fullness ratio of the LOW stack, the signal auto-throttle acts on.
    pub fn low_fullness(&self) -> f64 {
        if self.low_cap == 0 {
            return 0.0;
        }
        self.low_size as f64 / self.low_cap as f64
    }

    pub fn is_drained(&self) -> bool {
        self.high_size == 0 && self.low_size == 0 && self.workers_busy == 0
    }
}
