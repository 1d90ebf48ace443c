use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Enforces a randomized minimum delay between consecutive outbound requests.
///
/// The last-request timestamp sits behind an async mutex that is held across
/// the sleep, so overlapping callers observe a consistent wait baseline and
/// actual requests stay serialized even if fetchers run concurrently.
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self {
            min_delay,
            max_delay,
            jitter,
            last_request: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();

            let min = self.min_delay.as_secs_f64();
            let max = self.max_delay.as_secs_f64();
            let mut delay = if max > min {
                rand::thread_rng().gen_range(min..max)
            } else {
                min
            };

            // ±20% random variation
            if self.jitter {
                delay += delay * 0.2 * (rand::thread_rng().gen::<f64>() * 2.0 - 1.0);
            }

            let delay = Duration::from_secs_f64(delay.max(0.0));
            if elapsed < delay {
                let wait_time = delay - elapsed;
                debug!("rate limiter: waiting {:.2}s before next request", wait_time.as_secs_f64());
                tokio::time::sleep(wait_time).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Advisory sliding-window budget over outbound requests. Callers that get
/// `false` from [`can_make_request`](Self::can_make_request) are expected to
/// back off and re-check, not to hard-fail.
pub struct RequestThrottler {
    requests_per_minute: usize,
    requests_per_hour: usize,
    request_times: StdMutex<Vec<Instant>>,
}

impl RequestThrottler {
    pub fn new(requests_per_minute: usize, requests_per_hour: usize) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            request_times: StdMutex::new(Vec::new()),
        }
    }

    pub fn can_make_request(&self) -> bool {
        let mut times = self.request_times.lock().expect("throttler mutex poisoned");
        let now = Instant::now();

        times.retain(|t| now.duration_since(*t) < Duration::from_secs(3600));

        if times.len() >= self.requests_per_hour {
            warn!(
                "hourly request limit reached ({}), holding back",
                self.requests_per_hour
            );
            return false;
        }

        let recent = times
            .iter()
            .filter(|t| now.duration_since(**t) < Duration::from_secs(60))
            .count();
        if recent >= self.requests_per_minute {
            debug!(
                "per-minute request limit reached ({}), holding back",
                self.requests_per_minute
            );
            return false;
        }

        true
    }

    pub fn record_request(&self) {
        let mut times = self.request_times.lock().expect("throttler mutex poisoned");
        times.push(Instant::now());
    }
}

const USER_AGENTS: [&str; 6] = [
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Firefox on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Safari on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Pool of plausible browser User-Agent strings.
#[derive(Default)]
pub struct UserAgentRotator {
    cursor: AtomicUsize,
}

impl UserAgentRotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next agent in round-robin order, starting from the first entry.
    pub fn get(&self) -> &'static str {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[index % USER_AGENTS.len()]
    }

    pub fn get_random(&self) -> &'static str {
        let index = rand::thread_rng().gen_range(0..USER_AGENTS.len());
        USER_AGENTS[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sequential_waits_respect_lower_bound() {
        let limiter = RateLimiter::new(
            Duration::from_millis(200),
            Duration::from_millis(200),
            false,
        );

        let started = Instant::now();
        for _ in 0..4 {
            limiter.wait().await;
        }

        // 3 inter-request gaps of exactly 200ms (no jitter configured)
        assert!(started.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn first_wait_returns_immediately() {
        let limiter = RateLimiter::new(Duration::from_secs(5), Duration::from_secs(5), false);
        let started = Instant::now();
        limiter.wait().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn throttler_enforces_minute_budget() {
        let throttler = RequestThrottler::new(2, 100);
        assert!(throttler.can_make_request());
        throttler.record_request();
        throttler.record_request();
        assert!(!throttler.can_make_request());

        // budget frees up once the window slides past the recorded requests
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(throttler.can_make_request());
    }

    #[tokio::test(start_paused = true)]
    async fn throttler_enforces_hour_budget() {
        let throttler = RequestThrottler::new(100, 3);
        for _ in 0..3 {
            throttler.record_request();
        }
        tokio::time::advance(Duration::from_secs(120)).await;
        // per-minute window is clear, hourly budget still spent
        assert!(!throttler.can_make_request());

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(throttler.can_make_request());
    }

    #[test]
    fn rotator_cycles_from_first_entry() {
        let rotator = UserAgentRotator::new();
        let first = rotator.get();
        assert_eq!(first, USER_AGENTS[0]);
        for _ in 0..USER_AGENTS.len() - 1 {
            rotator.get();
        }
        assert_eq!(rotator.get(), first);
    }

    #[test]
    fn random_agent_comes_from_pool() {
        let rotator = UserAgentRotator::new();
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&rotator.get_random()));
        }
    }
}
