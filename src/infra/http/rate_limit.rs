use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Sliding-window limiter keyed by caller and route.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn allow(&self, key: &str, route: &str) -> (bool, u32) {
        self.allow_at(key, route, Instant::now())
    }

    fn allow_at(&self, key: &str, route: &str, now: Instant) -> (bool, u32) {
        self.sweep_if_due(now);

        let bucket_key = format!("{key}:{route}");
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        // after push, one fewer slot remains
        (true, remaining.saturating_sub(1))
    }

    /// Drop buckets with no request inside the window, at most once per window.
    /// Must not run while a bucket entry is held.
    fn sweep_if_due(&self, now: Instant) {
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last_sweep) < self.window {
            return;
        }
        *last_sweep = now;

        let window = self.window;
        self.buckets.retain(|_, instants| {
            instants.retain(|instant| now.duration_since(*instant) < window);
            !instants.is_empty()
        });
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_the_window_is_full() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let now = Instant::now();

        assert_eq!(limiter.allow_at("u1", "POST /question", now), (true, 1));
        assert_eq!(limiter.allow_at("u1", "POST /question", now), (true, 0));
        assert_eq!(limiter.allow_at("u1", "POST /question", now), (false, 0));
        assert!(limiter.allow_at("u2", "POST /question", now).0);
        assert!(limiter.allow_at("u1", "POST /answer", now).0);
    }

    #[test]
    fn slots_free_up_after_the_window() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 1);
        let start = Instant::now();

        assert!(limiter.allow_at("u1", "POST /poll", start).0);
        assert!(!limiter.allow_at("u1", "POST /poll", start).0);
        assert!(
            limiter
                .allow_at("u1", "POST /poll", start + Duration::from_secs(2))
                .0
        );
        assert_eq!(limiter.retry_after_secs(), 1);
        assert_eq!(limiter.limit(), 1);
    }

    #[test]
    fn idle_buckets_are_dropped_once_the_window_passes() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 5);
        let start = Instant::now();

        for n in 0..1_000 {
            let peer = format!("10.0.{}.{}", n / 256, n % 256);
            assert!(limiter.allow_at(&peer, "POST /user/register", start).0);
        }
        assert_eq!(limiter.bucket_count(), 1_000);

        let later = start + Duration::from_secs(3_600);
        assert!(limiter.allow_at("10.1.0.1", "POST /user/register", later).0);
        assert_eq!(limiter.bucket_count(), 1);
    }
}
