//! Two atomic counters and a hand-formatted Prometheus-text exposition.
//!
//! The exposition format is fixed bit-exact by the admin-plane contract, so
//! this builds the text directly rather than pulling in a metrics-registry
//! crate for two counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    total_requests: AtomicU64,
    total_failures: AtomicU64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failures(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn render(&self) -> String {
        let requests = self.total_requests.load(Ordering::Relaxed);
        let failures = self.total_failures.load(Ordering::Relaxed);
        format!(
            "# HELP go_agw_total_requests Total requests handled\n\
             # TYPE go_agw_total_requests counter\n\
             go_agw_total_requests {requests}\n\
             # HELP go_agw_total_failures Total failed requests\n\
             # TYPE go_agw_total_failures counter\n\
             go_agw_total_failures {failures}\n"
        )
    }
}
