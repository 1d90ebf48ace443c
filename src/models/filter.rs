use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A saved search filter owned by a user; monitoring tasks reference one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SearchFilter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub profession: Option<String>,
    pub city: Option<String>,
    pub company_name: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}
