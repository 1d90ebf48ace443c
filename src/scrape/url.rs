use url::Url;

use crate::error::Result;

/// Search parameters shared by interactive search and monitoring filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub profession: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
}

const SEARCH_PATH: &str = "/registration/vacancy-search/";
const PAGE_SIZE_PARAM: &str = "20";

/// Renders the site's search query-string dialect. Same inputs always yield
/// the same URL string; the explicit page parameter appears only past page 1.
#[derive(Debug, Clone)]
pub struct SearchUrlBuilder {
    base: Url,
}

impl SearchUrlBuilder {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base_url)?,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn build(&self, criteria: &SearchCriteria, page: u32) -> String {
        let mut url = self.base.clone();
        url.set_path(SEARCH_PATH);
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(profession) = criteria.profession.as_deref() {
                pairs.append_pair("profession", profession);
            }
            if let Some(city) = criteria.city.as_deref() {
                pairs.append_pair("city", city);
            }
            if let Some(company) = criteria.company_name.as_deref() {
                pairs.append_pair("business_entity", company);
            }
            // the site serves the foreign-citizen listing set
            pairs.append_pair("for_foreigner", "on");
            pairs.append_pair("paginate_by", PAGE_SIZE_PARAM);
            if page > 1 {
                pairs.append_pair("page", &page.to_string());
            }
        }
        url.to_string()
    }
}
