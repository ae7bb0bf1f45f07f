//! Round-robin target selection.
//!
//! The counter is incremented *before* the modulo, so the first call for a
//! given `n` returns `1`, not `0`. This is an observable contract, not a
//! bug: callers (and the test suite) depend on the exact sequence.

use std::sync::atomic::{AtomicI64, Ordering};

pub struct RoundRobin {
    counter: AtomicI64,
}

impl RoundRobin {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: AtomicI64::new(0),
        }
    }

    /// Returns an index in `[0, n)`, or `-1` when `n <= 0`.
    #[must_use]
    pub fn next(&self, n: i64) -> i64 {
        if n <= 0 {
            return -1;
        }
        let v = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let idx = v % n;
        if idx < 0 { -idx } else { idx }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}
