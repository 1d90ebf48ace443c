pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod scrape;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::error::Result;
use crate::scrape::GszScraper;
use crate::services::filter_store::PgFilterStore;
use crate::services::monitoring_service::MonitoringScheduler;
use crate::services::notifier::WebhookNotifier;
use crate::services::task_store::PgTaskStore;
use crate::services::user_store::PgUserStore;
use crate::services::vacancy_store::PgVacancyStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub scraper: Arc<GszScraper>,
    pub vacancy_store: Arc<PgVacancyStore>,
    pub scheduler: Arc<MonitoringScheduler>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        let config = crate::config::get_config();

        let scraper = Arc::new(GszScraper::from_config(config)?);
        let vacancy_store = Arc::new(PgVacancyStore::new(pool.clone()));
        let filter_store = Arc::new(PgFilterStore::new(pool.clone()));
        let task_store = Arc::new(PgTaskStore::new(pool.clone()));
        let user_store = Arc::new(PgUserStore::new(pool.clone()));
        let notifier = Arc::new(WebhookNotifier::new(config.bot_webhook_url.clone()));

        let scheduler = Arc::new(MonitoringScheduler::new(
            task_store,
            filter_store,
            user_store,
            vacancy_store.clone(),
            notifier,
            scraper.clone(),
        ));

        Ok(Self {
            pool,
            scraper,
            vacancy_store,
            scheduler,
        })
    }
}
