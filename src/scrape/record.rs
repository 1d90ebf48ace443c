use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scraped job posting. Constructed only through [`VacancyDraft::validate`],
/// so required fields are always non-empty and `url` is always absolute http(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VacancyRecord {
    pub external_id: String,
    pub source: String,
    pub date_posted: Option<DateTime<Utc>>,
    pub company_name: String,
    pub company_address: Option<String>,
    pub position: String,
    pub vacancies_count: Option<u32>,
    pub salary: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub url: Option<String>,
}

impl VacancyRecord {
    /// Natural de-duplication key against the store.
    pub fn key(&self) -> (&str, &str) {
        (&self.external_id, &self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordValidationError {
    #[error("external id is missing or empty")]
    MissingExternalId,
    #[error("source is missing or empty")]
    MissingSource,
    #[error("company name is missing or empty")]
    MissingCompanyName,
    #[error("position is missing or empty")]
    MissingPosition,
    #[error("url is not absolute http(s): {0}")]
    InvalidUrl(String),
}

/// Accumulator for fields pulled out of a listing item, before validation.
#[derive(Debug, Clone, Default)]
pub struct VacancyDraft {
    pub external_id: Option<String>,
    pub source: Option<String>,
    pub date_posted: Option<DateTime<Utc>>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub position: Option<String>,
    pub vacancies_count: Option<u32>,
    pub salary: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub url: Option<String>,
}

impl VacancyDraft {
    pub fn validate(self) -> Result<VacancyRecord, RecordValidationError> {
        let external_id = required(self.external_id, RecordValidationError::MissingExternalId)?;
        let source = required(self.source, RecordValidationError::MissingSource)?;
        let company_name = required(self.company_name, RecordValidationError::MissingCompanyName)?;
        let position = required(self.position, RecordValidationError::MissingPosition)?;

        if let Some(url) = &self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RecordValidationError::InvalidUrl(url.clone()));
            }
        }

        Ok(VacancyRecord {
            external_id,
            source,
            date_posted: self.date_posted,
            company_name,
            company_address: self.company_address,
            position,
            vacancies_count: self.vacancies_count,
            salary: self.salary,
            contact_person: self.contact_person,
            contact_phone: self.contact_phone,
            url: self.url,
        })
    }
}

fn required(
    value: Option<String>,
    err: RecordValidationError,
) -> Result<String, RecordValidationError> {
    match value {
        Some(v) => {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                Err(err)
            } else {
                Ok(trimmed.to_string())
            }
        }
        None => Err(err),
    }
}
