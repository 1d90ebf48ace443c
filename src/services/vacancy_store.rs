use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::vacancy::Vacancy;
use crate::scrape::record::VacancyRecord;
use crate::scrape::url::SearchCriteria;

/// Persistence contract the scraper and scheduler deduplicate against.
/// Storage is create-if-absent: existence is re-checked right before insert,
/// and stored rows are never merged with re-scraped data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VacancyStore: Send + Sync {
    async fn find_by_key(&self, external_id: &str, source: &str) -> Result<Option<Vacancy>>;
    async fn insert(&self, record: &VacancyRecord) -> Result<Vacancy>;
}

const VACANCY_COLUMNS: &str = r#"id, external_id, source, date_posted, company_name,
       company_address, "position", vacancies_count, salary, contact_person,
       contact_phone, url, created_at, updated_at"#;

#[derive(Clone)]
pub struct PgVacancyStore {
    pool: PgPool,
}

impl PgVacancyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stored-vacancy search used by the bot's search results view.
    pub async fn search(&self, criteria: &SearchCriteria, limit: i64) -> Result<Vec<Vacancy>> {
        let vacancies = sqlx::query_as::<_, Vacancy>(&format!(
            r#"SELECT {VACANCY_COLUMNS}
               FROM vacancies
               WHERE ($1::text IS NULL OR "position" ILIKE '%' || $1 || '%')
                 AND ($2::text IS NULL OR company_address ILIKE '%' || $2 || '%')
                 AND ($3::text IS NULL OR company_name ILIKE '%' || $3 || '%')
               ORDER BY date_posted DESC NULLS LAST
               LIMIT $4"#
        ))
        .bind(criteria.profession.as_deref())
        .bind(criteria.city.as_deref())
        .bind(criteria.company_name.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(vacancies)
    }

    pub async fn get_recent(&self, days: i32, limit: i64) -> Result<Vec<Vacancy>> {
        let vacancies = sqlx::query_as::<_, Vacancy>(&format!(
            r#"SELECT {VACANCY_COLUMNS}
               FROM vacancies
               WHERE created_at >= NOW() - make_interval(days => $1)
               ORDER BY created_at DESC
               LIMIT $2"#
        ))
        .bind(days)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(vacancies)
    }
}

#[async_trait]
impl VacancyStore for PgVacancyStore {
    async fn find_by_key(&self, external_id: &str, source: &str) -> Result<Option<Vacancy>> {
        let vacancy = sqlx::query_as::<_, Vacancy>(&format!(
            r#"SELECT {VACANCY_COLUMNS} FROM vacancies WHERE external_id = $1 AND source = $2"#
        ))
        .bind(external_id)
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vacancy)
    }

    async fn insert(&self, record: &VacancyRecord) -> Result<Vacancy> {
        let vacancy = sqlx::query_as::<_, Vacancy>(&format!(
            r#"INSERT INTO vacancies (
                   external_id, source, date_posted, company_name, company_address,
                   "position", vacancies_count, salary, contact_person, contact_phone, url
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING {VACANCY_COLUMNS}"#
        ))
        .bind(&record.external_id)
        .bind(&record.source)
        .bind(record.date_posted)
        .bind(&record.company_name)
        .bind(&record.company_address)
        .bind(&record.position)
        .bind(record.vacancies_count.map(|c| c as i32))
        .bind(&record.salary)
        .bind(&record.contact_person)
        .bind(&record.contact_phone)
        .bind(&record.url)
        .fetch_one(&self.pool)
        .await?;
        Ok(vacancy)
    }
}
