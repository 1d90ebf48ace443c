use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::filter::SearchFilter;

/// Read-only lookup of saved search filters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FilterStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SearchFilter>>;
}

#[derive(Clone)]
pub struct PgFilterStore {
    pool: PgPool,
}

impl PgFilterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilterStore for PgFilterStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SearchFilter>> {
        let filter = sqlx::query_as::<_, SearchFilter>(
            r#"SELECT id, user_id, name, profession, city, company_name, is_active, created_at
               FROM filters WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(filter)
    }
}
