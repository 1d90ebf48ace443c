use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::monitoring::MonitoringTask;

/// Monitoring-task lookups plus the one write the scheduler performs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MonitoringTask>>;
    async fn list_active(&self) -> Result<Vec<MonitoringTask>>;
    async fn update_last_check(&self, id: Uuid) -> Result<()>;
}

const TASK_COLUMNS: &str =
    "id, user_id, filter_id, interval_hours, last_check, is_active, created_at";

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MonitoringTask>> {
        let task = sqlx::query_as::<_, MonitoringTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM monitoring_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn list_active(&self) -> Result<Vec<MonitoringTask>> {
        let tasks = sqlx::query_as::<_, MonitoringTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM monitoring_tasks WHERE is_active = TRUE"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn update_last_check(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE monitoring_tasks SET last_check = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
