pub mod extract;
pub mod fetcher;
pub mod orchestrator;
pub mod rate_limit;
pub mod record;
pub mod url;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::config::Config;
use crate::error::Result;

pub use extract::ListingExtractor;
pub use fetcher::{BackoffPolicy, PageFetcher};
pub use orchestrator::{ScrapeMode, ScrapeOptions, ScrapeOrchestrator, ScrapeProgress};
pub use rate_limit::{RateLimiter, RequestThrottler, UserAgentRotator};
pub use record::VacancyRecord;
pub use url::{SearchCriteria, SearchUrlBuilder};

/// Source tag stored with every record scraped from the site.
pub const SOURCE_NAME: &str = "gsz.gov.by";

/// Entry point the conversational layer and the scheduler scrape through.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScrapeRunner: Send + Sync {
    async fn run(&self, options: &ScrapeOptions) -> Result<Vec<VacancyRecord>>;
}

/// Scraper for the gsz.gov.by vacancy search. Owns the process-wide rate
/// limiter, request throttler and User-Agent pool; each operation gets its
/// own fetcher so concurrent scrapes serialize only on the shared limiter.
pub struct GszScraper {
    urls: SearchUrlBuilder,
    source: String,
    rate_limiter: Arc<RateLimiter>,
    throttler: Arc<RequestThrottler>,
    user_agents: Arc<UserAgentRotator>,
    request_timeout: Duration,
    page_delay: Duration,
}

impl GszScraper {
    pub fn from_config(config: &Config) -> Result<Self> {
        let min_delay = config.delay_between_requests;
        Ok(Self {
            urls: SearchUrlBuilder::new(&config.source_base_url)?,
            source: SOURCE_NAME.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(
                Duration::from_secs_f64(min_delay),
                Duration::from_secs_f64(min_delay * 1.5),
                true,
            )),
            throttler: Arc::new(RequestThrottler::new(
                config.requests_per_minute,
                config.requests_per_hour,
            )),
            user_agents: Arc::new(UserAgentRotator::new()),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            page_delay: Duration::from_secs_f64(config.delay_between_pages),
        })
    }

    /// Builds a fresh orchestrator for one scrape operation.
    pub fn orchestrator(&self) -> Result<ScrapeOrchestrator> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = Client::builder()
            .timeout(self.request_timeout)
            .default_headers(headers)
            .build()?;

        let fetcher = PageFetcher::new(
            client,
            Arc::clone(&self.rate_limiter),
            Arc::clone(&self.throttler),
            Arc::clone(&self.user_agents),
        );
        let extractor = ListingExtractor::new(self.urls.base().clone(), self.source.clone());

        Ok(ScrapeOrchestrator::new(
            fetcher,
            self.urls.clone(),
            extractor,
            self.page_delay,
        ))
    }
}

#[async_trait]
impl ScrapeRunner for GszScraper {
    async fn run(&self, options: &ScrapeOptions) -> Result<Vec<VacancyRecord>> {
        self.orchestrator()?.run(options).await
    }
}
