//! Per-key token bucket rate limiting.
//!
//! One mutex guards both the key map and each bucket's state; fine-grained
//! sharding was judged unnecessary at the scale this gateway targets.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    rate: f64,
    last: Instant,
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// `rps <= 0` always allows. Otherwise refills the bucket for `key` by
    /// elapsed time, clamps to capacity, and consumes one token if available.
    #[must_use]
    pub fn allow(&self, key: &str, rps: i64, burst: i64) -> bool {
        if rps <= 0 {
            return true;
        }
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| TokenBucket {
            capacity: (burst.max(1)) as f64,
            tokens: burst as f64,
            rate: rps as f64,
            last: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * bucket.rate).min(bucket.capacity);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the host portion of a `host:port` remote address, falling back
/// to the whole string when it doesn't parse that way.
#[must_use]
pub fn client_ip(remote_addr: &str) -> String {
    match remote_addr.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.trim_matches(['[', ']']).to_string(),
        _ => remote_addr.to_string(),
    }
}
