use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response};
use tracing::{debug, error, warn};

use super::rate_limit::{RateLimiter, RequestThrottler, UserAgentRotator};

const DEFAULT_RETRIES: u32 = 3;

/// How a failed attempt is classified; drives the backoff choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchFailure {
    /// 404 — the resource is genuinely absent, retrying is pointless.
    NotFound,
    /// 429 — the server told us to slow down, optionally by how long.
    RateLimited(Option<Duration>),
    /// 503 — the server is overloaded.
    Overloaded,
    /// 403 — possibly an IP-level block.
    PossiblyBlocked,
    /// Timeout or connection-level failure.
    Transport,
    UnexpectedStatus(u16),
}

/// Wait durations for the non-generic backoff branches. Defaults follow the
/// politeness budget the target site tolerates; tests shrink them.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Soft pause when the request throttler vetoes an attempt.
    pub throttle_cooldown: Duration,
    /// Used when a 429 response carries no Retry-After header.
    pub retry_after_default: Duration,
    /// Linear step for 503 backoff: `step * (attempt + 1)`.
    pub overloaded_step: Duration,
    /// Linear step for 403 backoff: `step * (attempt + 1)`.
    pub blocked_step: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            throttle_cooldown: Duration::from_secs(5),
            retry_after_default: Duration::from_secs(60),
            overloaded_step: Duration::from_secs(5),
            blocked_step: Duration::from_secs(30),
        }
    }
}

/// Fetches one URL's HTML with bounded retries and status-specific backoff,
/// gated by the shared rate limiter and request throttler.
pub struct PageFetcher {
    client: Client,
    rate_limiter: Arc<RateLimiter>,
    throttler: Arc<RequestThrottler>,
    user_agents: Arc<UserAgentRotator>,
    current_agent: Mutex<&'static str>,
    backoff: BackoffPolicy,
}

impl PageFetcher {
    pub fn new(
        client: Client,
        rate_limiter: Arc<RateLimiter>,
        throttler: Arc<RequestThrottler>,
        user_agents: Arc<UserAgentRotator>,
    ) -> Self {
        let initial_agent = user_agents.get_random();
        Self {
            client,
            rate_limiter,
            throttler,
            user_agents,
            current_agent: Mutex::new(initial_agent),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn fetch(&self, url: &str) -> Option<String> {
        self.fetch_with_retries(url, DEFAULT_RETRIES).await
    }

    /// Returns the body on HTTP 200, `None` once the resource is known absent
    /// (404) or the retry budget is exhausted.
    pub async fn fetch_with_retries(&self, url: &str, retries: u32) -> Option<String> {
        if !self.throttler.can_make_request() {
            debug!("request budget exhausted, cooling down before fetch");
            tokio::time::sleep(self.backoff.throttle_cooldown).await;
        }

        self.rate_limiter.wait().await;

        // occasionally show up as a different browser
        if rand::thread_rng().gen::<f64>() < 0.3 {
            let mut agent = self.current_agent.lock().expect("user agent mutex poisoned");
            *agent = self.user_agents.get_random();
        }

        for attempt in 0..retries {
            let is_last = attempt + 1 >= retries;

            let failure = match self.attempt(url).await {
                Ok(body) => return Some(body),
                Err(failure) => failure,
            };

            match failure {
                FetchFailure::NotFound => {
                    warn!("page not found: {}", url);
                    return None;
                }
                FetchFailure::RateLimited(retry_after) => {
                    let wait = retry_after.unwrap_or(self.backoff.retry_after_default);
                    warn!(
                        "rate limited (429) for {}, waiting {}s, attempt {}/{}",
                        url,
                        wait.as_secs(),
                        attempt + 1,
                        retries
                    );
                    if !is_last {
                        tokio::time::sleep(wait).await;
                    }
                    continue;
                }
                FetchFailure::Overloaded => {
                    warn!(
                        "service unavailable (503) for {}, attempt {}/{}",
                        url,
                        attempt + 1,
                        retries
                    );
                    if !is_last {
                        let jitter =
                            Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..3.0));
                        tokio::time::sleep(self.backoff.overloaded_step * (attempt + 1) + jitter)
                            .await;
                    }
                    continue;
                }
                FetchFailure::PossiblyBlocked => {
                    error!(
                        "forbidden (403) for {} - possible IP ban, attempt {}/{}",
                        url,
                        attempt + 1,
                        retries
                    );
                    if !is_last {
                        tokio::time::sleep(self.backoff.blocked_step * (attempt + 1)).await;
                    }
                    continue;
                }
                FetchFailure::UnexpectedStatus(status) => {
                    warn!(
                        "unexpected status {} for {}, attempt {}/{}",
                        status,
                        url,
                        attempt + 1,
                        retries
                    );
                }
                FetchFailure::Transport => {}
            }

            if !is_last {
                // exponential backoff with jitter
                let backoff = 2f64.powi(attempt as i32) + rand::thread_rng().gen::<f64>();
                tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
            }
        }

        None
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchFailure> {
        let agent = *self.current_agent.lock().expect("user agent mutex poisoned");
        let response = match self.client.get(url).header(USER_AGENT, agent).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!("timeout fetching {}", url);
                return Err(FetchFailure::Transport);
            }
            Err(err) => {
                warn!("error fetching {}: {}", url, err);
                return Err(FetchFailure::Transport);
            }
        };

        match response.status().as_u16() {
            200 => {
                self.throttler.record_request();
                match response.text().await {
                    Ok(body) => Ok(body),
                    Err(err) => {
                        warn!("failed to read body of {}: {}", url, err);
                        Err(FetchFailure::Transport)
                    }
                }
            }
            404 => Err(FetchFailure::NotFound),
            429 => Err(FetchFailure::RateLimited(retry_after(&response))),
            503 => Err(FetchFailure::Overloaded),
            403 => Err(FetchFailure::PossiblyBlocked),
            other => Err(FetchFailure::UnexpectedStatus(other)),
        }
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
