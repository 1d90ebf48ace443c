use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoringTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filter_id: Uuid,
    pub interval_hours: i32,
    pub last_check: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}
