use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::record::{RecordValidationError, VacancyDraft, VacancyRecord};
use crate::utils::text::{extract_phone, normalize_text};

/// Listing items per full results page.
pub const PAGE_SIZE: usize = 20;
/// Pages to probe when a full page carries no pagination control.
pub const FALLBACK_PAGE_PROBE: u32 = 10;

/// One way of locating elements in a page layout; strategies are tried in
/// order until one yields results, so new site layouts are new table rows.
struct SelectorStrategy {
    label: &'static str,
    selector: Selector,
}

struct Selectors {
    listing: Vec<SelectorStrategy>,
    pagination: Vec<SelectorStrategy>,
    links: Selector,
    job_title: Selector,
    link: Selector,
    org: Selector,
    salary: Selector,
    address: Selector,
    job_info: Selector,
    info_entries: Selector,
    contact_anchor: Selector,
    label_blocks: Selector,
}

fn strategy(label: &'static str, css: &str) -> SelectorStrategy {
    SelectorStrategy {
        label,
        selector: css_selector(css),
    }
}

fn css_selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        listing: vec![
            strategy("job-block", "div.job-block"),
            strategy("vacancy-item", "div.vacancy-item"),
            strategy("vacancy-div", "div.vacancy"),
            strategy("vacancy-article", "article.vacancy"),
            strategy("data-vacancy", "div[data-vacancy]"),
        ],
        pagination: vec![
            strategy("div-pagination", "div.pagination"),
            strategy("nav-pagination", "nav.pagination"),
            strategy("ul-pagination", "ul.pagination"),
            strategy("div-pager", "div.pager"),
            strategy("nav-pager", "nav.pager"),
            strategy("ul-pager", "ul.pager"),
            strategy("page-numbers", "div.page-numbers"),
        ],
        links: css_selector("a"),
        job_title: css_selector("h4.job-title"),
        link: css_selector("a"),
        org: css_selector("li.org"),
        salary: css_selector("span.salary"),
        address: css_selector("span.address"),
        job_info: css_selector("ul.job-info"),
        info_entries: css_selector("li, span"),
        contact_anchor: css_selector("#contact-info-anchor"),
        label_blocks: css_selector("div, p"),
    })
}

fn total_count_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)Количество заявленных вакансий:\s*(\d+)",
            r"(?i)Количество вакансий:\s*(\d+)",
            r"(?i)Найдено вакансий:\s*(\d+)",
            r"(?i)Всего вакансий:\s*(\d+)",
            r"(?i)вакансий[:\s]+(\d+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex must compile"))
        .collect()
    })
}

fn page_param_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[?&]page=(\d+)").expect("static regex must compile"))
}

fn external_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/vacancy/(\d+)/").expect("static regex must compile"))
}

fn slots_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Ставка:\s*(\d+)").expect("static regex must compile"))
}

/// Everything pulled out of one fetched search-results page.
#[derive(Debug, Default)]
pub struct ExtractedPage {
    pub records: Vec<VacancyRecord>,
    /// Listing items seen before validation; drives the empty-page heuristic.
    pub items_seen: usize,
    pub rejected: usize,
}

/// Contact fields recovered from a vacancy's own detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDetails {
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
}

/// Parses fetched search-results HTML into vacancy records plus total-count
/// and pagination heuristics. Parsing is synchronous and never suspends.
pub struct ListingExtractor {
    base: Url,
    source: String,
}

impl ListingExtractor {
    pub fn new(base: Url, source: impl Into<String>) -> Self {
        Self {
            base,
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// First numeric match of any known "total vacancies: N" phrasing.
    pub fn total_count(&self, html: &str) -> Option<u32> {
        let doc = Html::parse_document(html);
        let page_text: String = doc.root_element().text().collect();

        for pattern in total_count_patterns() {
            if let Some(captures) = pattern.captures(&page_text) {
                if let Ok(count) = captures[1].parse::<u32>() {
                    info!("found total vacancies count: {}", count);
                    return Some(count);
                }
            }
        }

        warn!("could not find total vacancies count on page");
        None
    }

    /// Page count from the pagination control, or a conservative probe bound
    /// when a full page of items carries no control at all.
    pub fn total_pages(&self, html: &str) -> u32 {
        let doc = Html::parse_document(html);
        let s = selectors();

        let block = s
            .pagination
            .iter()
            .find_map(|st| doc.select(&st.selector).next().map(|el| (st.label, el)));

        if let Some((label, block)) = block {
            let mut max_page = 1u32;
            for link in block.select(&s.links) {
                let text: String = link.text().collect();
                if let Ok(page) = text.trim().parse::<u32>() {
                    max_page = max_page.max(page);
                }
                if let Some(href) = link.value().attr("href") {
                    if let Some(captures) = page_param_pattern().captures(href) {
                        if let Ok(page) = captures[1].parse::<u32>() {
                            max_page = max_page.max(page);
                        }
                    }
                }
            }
            if max_page > 1 {
                info!("pagination ({}) reports {} pages", label, max_page);
                return max_page;
            }
        }

        // no usable control: a full page of items suggests more pages exist
        let items = self.select_items(&doc).len();
        if items >= PAGE_SIZE {
            info!(
                "found {} listing items and no pagination, probing up to {} pages",
                items, FALLBACK_PAGE_PROBE
            );
            FALLBACK_PAGE_PROBE
        } else {
            1
        }
    }

    /// Extracts every listing item on the page. Malformed or invalid items
    /// are counted and logged, never abort the page.
    pub fn extract_records(&self, html: &str) -> ExtractedPage {
        let doc = Html::parse_document(html);
        let items = self.select_items(&doc);

        let mut page = ExtractedPage {
            items_seen: items.len(),
            ..Default::default()
        };

        for item in items {
            match self.extract_item(item) {
                Ok(record) => page.records.push(record),
                Err(reason) => {
                    warn!("skipping listing item: {}", reason);
                    page.rejected += 1;
                }
            }
        }

        page
    }

    fn select_items<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        let s = selectors();
        for st in &s.listing {
            let found: Vec<ElementRef<'a>> = doc.select(&st.selector).collect();
            if !found.is_empty() {
                if st.label != "job-block" {
                    debug!("found {} items via fallback selector {}", found.len(), st.label);
                }
                return found;
            }
        }
        Vec::new()
    }

    fn extract_item(&self, item: ElementRef<'_>) -> Result<VacancyRecord, RecordValidationError> {
        let s = selectors();
        let mut draft = VacancyDraft {
            source: Some(self.source.clone()),
            ..Default::default()
        };

        if let Some(title) = item.select(&s.job_title).next() {
            let link = title.select(&s.link).next();
            let title_text = link.map(element_text).unwrap_or_else(|| element_text(title));
            draft.position = normalize_text(&title_text);

            if let Some(href) = link.and_then(|l| l.value().attr("href")) {
                if let Ok(absolute) = self.base.join(href) {
                    draft.url = Some(absolute.to_string());
                }
            }
        }

        draft.external_id = Some(
            draft
                .url
                .as_deref()
                .and_then(extract_external_id)
                .unwrap_or_else(|| "unknown".to_string()),
        );

        if let Some(org) = item.select(&s.org).next() {
            let link = org.select(&s.link).next();
            let org_text = link.map(element_text).unwrap_or_else(|| element_text(org));
            draft.company_name = normalize_text(&org_text);
        }

        if let Some(salary) = item.select(&s.salary).next() {
            draft.salary = normalize_text(&element_text(salary));
        }

        if let Some(address) = item.select(&s.address).next() {
            draft.company_address = normalize_text(&element_text(address));
        }

        if let Some(info) = item.select(&s.job_info).next() {
            for entry in info.select(&s.info_entries) {
                let text = element_text(entry);
                if text.contains("Ставка:") {
                    draft.vacancies_count = slots_pattern()
                        .captures(&text)
                        .and_then(|c| c[1].parse::<u32>().ok());
                    break;
                }
            }
        }

        draft.validate()
    }

    /// Labeled-text lookup near the contact anchor of a detail page.
    pub fn extract_contact_details(&self, html: &str) -> ContactDetails {
        let doc = Html::parse_document(html);
        let s = selectors();
        let mut details = ContactDetails::default();

        let Some(anchor) = doc.select(&s.contact_anchor).next() else {
            return details;
        };
        let Some(container) = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| matches!(el.value().name(), "section" | "div"))
        else {
            return details;
        };

        if let Some(block) = labeled_block(container, &["Контактный телефон"]) {
            if let Some(value) = next_element_text(block) {
                details.contact_phone = extract_phone(&value).or_else(|| normalize_text(&value));
            }
        }

        if let Some(block) = labeled_block(container, &["ФИО", "Контактное лицо"]) {
            if let Some(value) = next_element_text(block) {
                details.contact_person = normalize_text(&value);
            }
        }

        details
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

fn extract_external_id(url: &str) -> Option<String> {
    external_id_pattern()
        .captures(url)
        .map(|c| c[1].to_string())
}

/// Innermost div/p that directly owns a text node containing one of `labels`.
fn labeled_block<'a>(container: ElementRef<'a>, labels: &[&str]) -> Option<ElementRef<'a>> {
    container.select(&selectors().label_blocks).find(|el| {
        el.children()
            .filter_map(|node| node.value().as_text())
            .any(|text| labels.iter().any(|label| text.text.contains(label)))
    })
}

fn next_element_text(el: ElementRef<'_>) -> Option<String> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .map(element_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(
            Url::parse("https://gsz.gov.by").expect("valid base"),
            "gsz.gov.by",
        )
    }

    fn job_block(id: u32, position: &str, company: &str, address: &str) -> String {
        format!(
            r##"<div class="job-block">
                <h4 class="job-title"><a href="/directory/vacancy/{id}/">{position}</a></h4>
                <ul class="job-info">
                    <li class="org"><a href="#">{company}</a></li>
                    <li><span class="salary">от 1000 BYN</span></li>
                    <li><span class="address">{address}</span></li>
                    <li><span>Ставка: 2</span></li>
                </ul>
            </div>"##
        )
    }

    fn page(body: &str) -> String {
        format!("<html><body>{body}</body></html>")
    }

    #[test]
    fn total_count_matches_known_phrasings() {
        let html = page("<p>Количество заявленных вакансий: 4442</p>");
        assert_eq!(extractor().total_count(&html), Some(4442));

        let html = page("<p>Найдено вакансий: 17</p>");
        assert_eq!(extractor().total_count(&html), Some(17));

        let html = page("<p>ничего интересного</p>");
        assert_eq!(extractor().total_count(&html), None);
    }

    #[test]
    fn pagination_takes_max_of_link_texts() {
        let html = page(
            r#"<div class="pagination">
                <a href="?page=1">1</a><a href="?page=2">2</a>
                <a href="?page=3">3</a><a href="?page=7">7</a>
            </div>"#,
        );
        assert_eq!(extractor().total_pages(&html), 7);
    }

    #[test]
    fn pagination_reads_page_param_from_hrefs() {
        let html = page(
            r#"<nav class="pagination">
                <a href="/registration/vacancy-search/?page=12">далее</a>
            </nav>"#,
        );
        assert_eq!(extractor().total_pages(&html), 12);
    }

    #[test]
    fn full_page_without_pagination_probes_fallback() {
        let blocks: String = (1..=20)
            .map(|i| job_block(i, "рабочий", "ООО Тест", "г. Минск"))
            .collect();
        assert_eq!(extractor().total_pages(&page(&blocks)), FALLBACK_PAGE_PROBE);
    }

    #[test]
    fn short_page_without_pagination_is_single() {
        let blocks: String = (1..=5)
            .map(|i| job_block(i, "рабочий", "ООО Тест", "г. Минск"))
            .collect();
        assert_eq!(extractor().total_pages(&page(&blocks)), 1);
    }

    #[test]
    fn records_are_extracted_with_all_fields() {
        let html = page(&job_block(12345, "подсобный рабочий", "ООО «Тиктри»", "г. Минск, ул. Примерная, 1"));
        let extracted = extractor().extract_records(&html);

        assert_eq!(extracted.items_seen, 1);
        assert_eq!(extracted.rejected, 0);
        let record = &extracted.records[0];
        assert_eq!(record.external_id, "12345");
        assert_eq!(record.source, "gsz.gov.by");
        assert_eq!(record.position, "подсобный рабочий");
        assert_eq!(record.company_name, "ООО «Тиктри»");
        assert_eq!(record.company_address.as_deref(), Some("г. Минск, ул. Примерная, 1"));
        assert_eq!(record.salary.as_deref(), Some("от 1000 BYN"));
        assert_eq!(record.vacancies_count, Some(2));
        assert_eq!(
            record.url.as_deref(),
            Some("https://gsz.gov.by/directory/vacancy/12345/")
        );
    }

    #[test]
    fn invalid_item_is_skipped_but_siblings_survive() {
        let broken = r#"<div class="job-block"><h4 class="job-title"><a href="/directory/vacancy/7/">дворник</a></h4></div>"#;
        let html = page(&format!(
            "{}{}",
            broken,
            job_block(8, "сторож", "ОАО Охрана", "г. Гомель")
        ));
        let extracted = extractor().extract_records(&html);

        assert_eq!(extracted.items_seen, 2);
        assert_eq!(extracted.rejected, 1);
        assert_eq!(extracted.records.len(), 1);
        assert_eq!(extracted.records[0].external_id, "8");
    }

    #[test]
    fn alternative_listing_selector_is_used() {
        let html = page(
            r#"<div class="vacancy-item">
                <h4 class="job-title"><a href="/directory/vacancy/99/">маляр</a></h4>
                <ul class="job-info"><li class="org">УП Ремонт</li></ul>
            </div>"#,
        );
        let extracted = extractor().extract_records(&html);
        assert_eq!(extracted.records.len(), 1);
        assert_eq!(extracted.records[0].external_id, "99");
    }

    #[test]
    fn missing_href_falls_back_to_unknown_id() {
        let html = page(
            r#"<div class="job-block">
                <h4 class="job-title">электрик</h4>
                <ul class="job-info"><li class="org">ЗАО Свет</li></ul>
            </div>"#,
        );
        let extracted = extractor().extract_records(&html);
        assert_eq!(extracted.records[0].external_id, "unknown");
        assert_eq!(extracted.records[0].url, None);
    }

    #[test]
    fn contact_details_are_read_near_anchor() {
        let html = page(
            r#"<div>
                <span id="contact-info-anchor"></span>
                <div>Контактный телефон организации</div>
                <div>+375 29 123-45-67 (отдел кадров)</div>
                <div>ФИО</div>
                <div>Иванов Иван Иванович</div>
            </div>"#,
        );
        let details = extractor().extract_contact_details(&html);
        assert_eq!(details.contact_phone.as_deref(), Some("+375 29 123-45-67"));
        assert_eq!(details.contact_person.as_deref(), Some("Иванов Иван Иванович"));
    }

    #[test]
    fn detail_page_without_anchor_yields_nothing() {
        let html = page("<div><p>Контактный телефон: нигде</p></div>");
        assert_eq!(extractor().extract_contact_details(&html), ContactDetails::default());
    }
}
