//! Per-IP request limiting
//!
//! Fixed-window counting keyed by caller IP for the abuse-sensitive
//! operations (credential probes, training requests). Counters reset
//! when their window elapses; stale entries are pruned on a periodic
//! `cleanup` call and the whole map resets with the process.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub struct RateLimiter {
    /// IP -> (request count, window start)
    requests: RwLock<HashMap<String, (u32, Instant)>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Whether a request from `ip` is allowed right now. Counting is
    /// fixed-window: the counter resets when the window elapses.
    pub async fn check(&self, ip: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let entry = requests.entry(ip.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) > self.window {
            entry.0 = 0;
            entry.1 = now;
        }

        if entry.0 >= self.max_requests {
            return false;
        }

        entry.0 += 1;
        true
    }

    /// Drop entries idle for more than two windows. Call periodically.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, (_, start)| now.duration_since(*start) <= self.window * 2);
    }

    #[cfg(test)]
    pub(crate) async fn tracked_ips(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_enforced_per_ip() {
        let limiter = RateLimiter::new(3, 60);

        for _ in 0..3 {
            assert!(limiter.check("203.0.113.1").await);
        }
        assert!(!limiter.check("203.0.113.1").await);

        // Other callers have their own window
        assert!(limiter.check("203.0.113.2").await);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.check("203.0.113.1").await);
        // Zero-length window: the next call starts a fresh one
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(limiter.check("203.0.113.1").await);
    }

    #[tokio::test]
    async fn test_cleanup_prunes_stale_entries() {
        let limiter = RateLimiter::new(10, 0);
        limiter.check("203.0.113.1").await;
        limiter.check("203.0.113.2").await;
        assert_eq!(limiter.tracked_ips().await, 2);

        tokio::time::sleep(Duration::from_millis(5)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_ips().await, 0);
    }
}
