use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A vacancy as persisted. `(external_id, source)` is unique in storage;
/// rows are written once and never updated by the scraper.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vacancy {
    pub id: Uuid,
    pub external_id: String,
    pub source: String,
    pub date_posted: Option<DateTime<Utc>>,
    pub company_name: String,
    pub company_address: Option<String>,
    pub position: String,
    pub vacancies_count: Option<i32>,
    pub salary: Option<String>,
    pub contact_person: Option<String>,
    pub contact_phone: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
