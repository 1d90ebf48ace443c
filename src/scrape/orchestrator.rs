use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::extract::{ContactDetails, ListingExtractor};
use super::fetcher::PageFetcher;
use super::record::VacancyRecord;
use super::url::{SearchCriteria, SearchUrlBuilder};
use crate::error::Result;

/// Page ceiling when scraping until the site runs dry (monitoring).
pub const EXHAUSTIVE_PAGE_CEILING: u32 = 1000;
/// Minimum page ceiling for interactive searches.
const BOUNDED_PAGE_FLOOR: u32 = 10;

const MAX_CONSECUTIVE_EMPTY_PAGES: u32 = 2;
const MAX_CONSECUTIVE_FETCH_FAILURES: u32 = 2;
const MAX_DETAIL_FETCH_ERRORS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeMode {
    /// Cap cost for interactive search.
    Bounded,
    /// Keep going until pages are genuinely empty (monitoring).
    Exhaustive,
}

/// Emitted after every processed page; listeners are optional and a full or
/// dropped receiver never slows the scrape down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeProgress {
    pub pages_done: u32,
    pub pages_planned: u32,
    pub items_found: usize,
}

#[derive(Clone)]
pub struct ScrapeOptions {
    pub criteria: SearchCriteria,
    pub mode: ScrapeMode,
    pub limit: Option<usize>,
    pub fetch_details: bool,
    pub filter_by_city: bool,
    pub progress: Option<UnboundedSender<ScrapeProgress>>,
}

impl ScrapeOptions {
    pub fn search(criteria: SearchCriteria) -> Self {
        Self {
            criteria,
            mode: ScrapeMode::Bounded,
            limit: None,
            fetch_details: false,
            filter_by_city: true,
            progress: None,
        }
    }

    pub fn monitoring(criteria: SearchCriteria) -> Self {
        Self {
            mode: ScrapeMode::Exhaustive,
            ..Self::search(criteria)
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_details(mut self) -> Self {
        self.fetch_details = true;
        self
    }

    pub fn with_progress(mut self, progress: UnboundedSender<ScrapeProgress>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Drives the fetch→extract loop across result pages in strictly increasing
/// page order, applying client-side filters and the stop heuristics.
pub struct ScrapeOrchestrator {
    fetcher: PageFetcher,
    urls: SearchUrlBuilder,
    extractor: ListingExtractor,
    page_delay: Duration,
    detail_delay: Duration,
}

impl ScrapeOrchestrator {
    pub fn new(
        fetcher: PageFetcher,
        urls: SearchUrlBuilder,
        extractor: ListingExtractor,
        page_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            urls,
            extractor,
            page_delay,
            detail_delay: Duration::from_secs(1),
        }
    }

    pub fn with_detail_delay(mut self, detail_delay: Duration) -> Self {
        self.detail_delay = detail_delay;
        self
    }

    /// Total advertised vacancy count for the criteria, if the site shows one.
    pub async fn total_vacancies(&self, criteria: &SearchCriteria) -> Option<u32> {
        let url = self.urls.build(criteria, 1);
        let html = self.fetcher.fetch(&url).await?;
        self.extractor.total_count(&html)
    }

    /// Page-count discovery from the first results page; 1 when the page
    /// cannot be fetched at all.
    pub async fn total_pages(&self, criteria: &SearchCriteria) -> u32 {
        let url = self.urls.build(criteria, 1);
        match self.fetcher.fetch(&url).await {
            Some(html) => self.extractor.total_pages(&html),
            None => 1,
        }
    }

    pub async fn run(&self, options: &ScrapeOptions) -> Result<Vec<VacancyRecord>> {
        info!(
            profession = options.criteria.profession.as_deref().unwrap_or("-"),
            city = options.criteria.city.as_deref().unwrap_or("-"),
            company = options.criteria.company_name.as_deref().unwrap_or("-"),
            mode = ?options.mode,
            "starting vacancy scrape"
        );

        let total_pages = self.total_pages(&options.criteria).await;
        let max_pages_to_try = match options.mode {
            ScrapeMode::Exhaustive => EXHAUSTIVE_PAGE_CEILING,
            ScrapeMode::Bounded => total_pages.max(BOUNDED_PAGE_FLOOR),
        };
        debug!(total_pages, max_pages_to_try, "page plan ready");
        emit_progress(options, 0, total_pages, 0);

        let mut records: Vec<VacancyRecord> = Vec::new();
        let mut consecutive_empty = 0u32;
        let mut consecutive_failures = 0u32;
        let mut detail_errors = 0u32;
        let mut details_enabled = options.fetch_details;

        for page in 1..=max_pages_to_try {
            if limit_reached(&records, options.limit) {
                break;
            }

            let url = self.urls.build(&options.criteria, page);
            debug!(page, %url, "fetching listing page");

            let Some(html) = self.fetcher.fetch(&url).await else {
                warn!(page, "failed to fetch listing page");
                consecutive_failures += 1;
                if consecutive_failures >= MAX_CONSECUTIVE_FETCH_FAILURES {
                    info!(
                        "stopping after {} consecutive failed pages",
                        consecutive_failures
                    );
                    break;
                }
                continue;
            };
            consecutive_failures = 0;

            let extracted = self.extractor.extract_records(&html);
            info!(
                page,
                items = extracted.items_seen,
                rejected = extracted.rejected,
                "listing page extracted"
            );

            if extracted.items_seen == 0 {
                consecutive_empty += 1;
                if consecutive_empty >= MAX_CONSECUTIVE_EMPTY_PAGES {
                    info!("stopping after {} consecutive empty pages", consecutive_empty);
                    break;
                }
            } else {
                consecutive_empty = 0;
            }

            for mut record in extracted.records {
                if limit_reached(&records, options.limit) {
                    break;
                }

                if options.filter_by_city {
                    if let Some(city) = options.criteria.city.as_deref() {
                        if !city_matches(city, record.company_address.as_deref()) {
                            debug!(
                                city,
                                address = record.company_address.as_deref().unwrap_or("-"),
                                "dropping vacancy outside city filter"
                            );
                            continue;
                        }
                    }
                }
                if let Some(company) = options.criteria.company_name.as_deref() {
                    if !company_matches(company, &record.company_name) {
                        debug!(company, found = %record.company_name, "dropping vacancy outside company filter");
                        continue;
                    }
                }

                if details_enabled {
                    if let Some(detail_url) = record.url.clone() {
                        // detail pages are more expensive for the server
                        let jitter =
                            Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..0.5));
                        tokio::time::sleep(self.detail_delay + jitter).await;

                        match self.fetch_details(&detail_url).await {
                            Some(details) => {
                                detail_errors = 0;
                                if details.contact_phone.is_some() {
                                    record.contact_phone = details.contact_phone;
                                }
                                if details.contact_person.is_some() {
                                    record.contact_person = details.contact_person;
                                }
                            }
                            None => {
                                detail_errors += 1;
                                if detail_errors >= MAX_DETAIL_FETCH_ERRORS {
                                    warn!(
                                        "too many detail fetch failures ({}), disabling detail enrichment",
                                        detail_errors
                                    );
                                    details_enabled = false;
                                }
                            }
                        }
                    }
                }

                records.push(record);
            }

            emit_progress(options, page, max_pages_to_try, records.len());

            if limit_reached(&records, options.limit) {
                break;
            }

            if page < max_pages_to_try {
                tokio::time::sleep(jittered_page_delay(self.page_delay)).await;
            }
        }

        info!(found = records.len(), "vacancy scrape finished");
        Ok(records)
    }

    async fn fetch_details(&self, url: &str) -> Option<ContactDetails> {
        let html = self.fetcher.fetch(url).await?;
        Some(self.extractor.extract_contact_details(&html))
    }
}

fn limit_reached(records: &[VacancyRecord], limit: Option<usize>) -> bool {
    limit.is_some_and(|limit| records.len() >= limit)
}

fn emit_progress(options: &ScrapeOptions, pages_done: u32, pages_planned: u32, items_found: usize) {
    if let Some(progress) = &options.progress {
        // receiver may be gone; scraping must not care
        let _ = progress.send(ScrapeProgress {
            pages_done,
            pages_planned,
            items_found,
        });
    }
}

/// Inter-page delay with ±30% jitter, to look human and respect server load.
fn jittered_page_delay(delay: Duration) -> Duration {
    let base = delay.as_secs_f64();
    let jitter = base * 0.3 * (rand::thread_rng().gen::<f64>() * 2.0 - 1.0);
    Duration::from_secs_f64((base + jitter).max(0.0))
}

/// City filters match against the company address: the city name itself, its
/// "г. City" spellings and region-suffix forms, plus known per-city variants.
const CITY_VARIANTS: &[(&str, &[&str])] = &[
    ("минск", &["минск", "г. минск", "г минск", "минская"]),
    ("могилев", &["могилев", "г. могилев", "могилевская"]),
    ("гомель", &["гомель", "г. гомель", "гомельская"]),
    ("брест", &["брест", "г. брест", "брестская"]),
    ("гродно", &["гродно", "г. гродно", "гродненская"]),
    ("витебск", &["витебск", "г. витебск", "витебская"]),
];

pub(crate) fn city_matches(filter_city: &str, address: Option<&str>) -> bool {
    let city = filter_city.trim().to_lowercase();
    if city.is_empty() {
        return true;
    }
    let Some(address) = address else {
        return false;
    };
    let address = address.to_lowercase();

    let mut variants = vec![
        city.clone(),
        format!("г. {city}"),
        format!("г {city}"),
        format!("{city}ая"),
        format!("{city}ская"),
    ];
    if let Some((_, extra)) = CITY_VARIANTS.iter().find(|(name, _)| *name == city) {
        variants.extend(extra.iter().map(|v| v.to_string()));
    }

    variants.iter().any(|variant| address.contains(variant.as_str()))
}

pub(crate) fn company_matches(filter_company: &str, company_name: &str) -> bool {
    company_name
        .to_lowercase()
        .contains(&filter_company.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_matches_prefixed_address() {
        assert!(city_matches("Минск", Some("г. Минск, ул. Примерная, 1")));
    }

    #[test]
    fn city_rejects_other_city() {
        assert!(!city_matches("Минск", Some("г. Гомель")));
    }

    #[test]
    fn city_matches_region_suffix() {
        assert!(city_matches("Минск", Some("Минская область, Борисов")));
    }

    #[test]
    fn missing_address_never_matches() {
        assert!(!city_matches("Минск", None));
    }

    #[test]
    fn company_filter_is_case_insensitive_substring() {
        assert!(company_matches("тиктри", "ООО «Тиктри»"));
        assert!(!company_matches("рога", "ООО «Тиктри»"));
    }

    #[test]
    fn limit_counts_accepted_records_only() {
        assert!(!limit_reached(&[], Some(1)));
        assert!(limit_reached(&[], Some(0)));
        assert!(!limit_reached(&[], None));
    }

    #[test]
    fn page_delay_jitter_stays_within_band() {
        let base = Duration::from_secs(3);
        for _ in 0..50 {
            let delay = jittered_page_delay(base);
            assert!(delay >= Duration::from_millis(2100));
            assert!(delay <= Duration::from_millis(3900));
        }
    }
}
