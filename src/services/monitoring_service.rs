use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::filter::SearchFilter;
use crate::models::user::User;
use crate::scrape::record::VacancyRecord;
use crate::scrape::url::SearchCriteria;
use crate::scrape::{ScrapeOptions, ScrapeRunner};
use crate::services::filter_store::FilterStore;
use crate::services::notifier::NotificationSink;
use crate::services::task_store::TaskStore;
use crate::services::user_store::UserStore;
use crate::services::vacancy_store::VacancyStore;
use crate::utils::format::format_vacancy_message;

/// New vacancies reported with full detail per tick; the rest are rolled up
/// into one summary message to bound chat volume.
const MAX_DETAILED_NOTIFICATIONS: usize = 5;

/// Owns one recurring job per active monitoring task. Each job is a spawned
/// loop around a `tokio` interval, so runs of the same task never overlap and
/// ticks missed while a run is in flight are skipped, not queued.
pub struct MonitoringScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    tasks: Arc<dyn TaskStore>,
    filters: Arc<dyn FilterStore>,
    users: Arc<dyn UserStore>,
    vacancies: Arc<dyn VacancyStore>,
    notifier: Arc<dyn NotificationSink>,
    scraper: Arc<dyn ScrapeRunner>,
    jobs: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl MonitoringScheduler {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        filters: Arc<dyn FilterStore>,
        users: Arc<dyn UserStore>,
        vacancies: Arc<dyn VacancyStore>,
        notifier: Arc<dyn NotificationSink>,
        scraper: Arc<dyn ScrapeRunner>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                tasks,
                filters,
                users,
                vacancies,
                notifier,
                scraper,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers the recurring job and runs the first check right away.
    /// Returns `false` without side effects if the task is unknown, inactive
    /// or already scheduled.
    pub async fn start(&self, task_id: Uuid) -> bool {
        let task = match self.inner.tasks.find_by_id(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                error!(%task_id, "monitoring task not found");
                return false;
            }
            Err(err) => {
                error!(%task_id, error = %err, "failed to load monitoring task");
                return false;
            }
        };
        if !task.is_active {
            warn!(%task_id, "monitoring task is not active");
            return false;
        }

        let interval_hours = task.interval_hours.max(1) as u64;
        let mut jobs = self.inner.jobs.lock().expect("scheduler jobs mutex poisoned");
        if jobs.contains_key(&task_id) {
            warn!(%task_id, "monitoring task is already running");
            return false;
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(interval_hours * 3600));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // first tick completes immediately, so effects show up right away
                ticker.tick().await;
                if !inner.run_check(task_id).await {
                    break;
                }
            }
            inner
                .jobs
                .lock()
                .expect("scheduler jobs mutex poisoned")
                .remove(&task_id);
        });
        jobs.insert(task_id, handle);

        info!(%task_id, interval_hours, "started monitoring task");
        true
    }

    /// Cancels the task's recurring job. Safe to call for a task that is not
    /// running; that case reports `false`.
    pub fn stop(&self, task_id: Uuid) -> bool {
        let handle = self
            .inner
            .jobs
            .lock()
            .expect("scheduler jobs mutex poisoned")
            .remove(&task_id);
        match handle {
            Some(handle) => {
                handle.abort();
                info!(%task_id, "stopped monitoring task");
                true
            }
            None => {
                warn!(%task_id, "monitoring task is not running");
                false
            }
        }
    }

    pub fn is_running(&self, task_id: Uuid) -> bool {
        self.inner
            .jobs
            .lock()
            .expect("scheduler jobs mutex poisoned")
            .contains_key(&task_id)
    }

    /// Runs one check outside the schedule, e.g. for a "check now" action.
    /// Returns `false` when the task's state is gone and monitoring of it
    /// should end.
    pub async fn run_check_now(&self, task_id: Uuid) -> bool {
        self.inner.run_check(task_id).await
    }

    /// Reconstructs one job per task marked active in the store; used on
    /// process start so schedules survive a restart.
    pub async fn restore(&self) -> Result<usize> {
        let tasks = self.inner.tasks.list_active().await?;
        info!(count = tasks.len(), "restoring active monitoring tasks");

        let mut restored = 0;
        for task in tasks {
            if self.start(task.id).await {
                restored += 1;
            }
        }
        Ok(restored)
    }

    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut jobs = self.inner.jobs.lock().expect("scheduler jobs mutex poisoned");
            jobs.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &handles {
            handle.abort();
        }
        info!(stopped = handles.len(), "monitoring scheduler shut down");
    }
}

impl SchedulerInner {
    /// One monitoring tick. Returns `false` when the backing task, filter or
    /// user has vanished or gone inactive, which tells the job loop to end.
    async fn run_check(&self, task_id: Uuid) -> bool {
        let task = match self.tasks.find_by_id(task_id).await {
            Ok(Some(task)) if task.is_active => task,
            Ok(_) => {
                warn!(%task_id, "monitoring task missing or inactive, stopping its job");
                return false;
            }
            Err(err) => {
                error!(%task_id, error = %err, "failed to load monitoring task, will retry next tick");
                return true;
            }
        };

        let filter = match self.filters.find_by_id(task.filter_id).await {
            Ok(Some(filter)) if filter.is_active => filter,
            Ok(_) => {
                warn!(%task_id, filter_id = %task.filter_id, "filter missing or inactive, stopping job");
                return false;
            }
            Err(err) => {
                error!(%task_id, error = %err, "failed to load filter, will retry next tick");
                return true;
            }
        };

        let user = match self.users.find_by_id(task.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(%task_id, user_id = %task.user_id, "user not found, stopping job");
                return false;
            }
            Err(err) => {
                error!(%task_id, error = %err, "failed to load user, will retry next tick");
                return true;
            }
        };

        info!(%task_id, filter = %filter.name, telegram_id = user.telegram_id, "checking for new vacancies");

        let criteria = SearchCriteria {
            profession: filter.profession.clone(),
            city: filter.city.clone(),
            company_name: filter.company_name.clone(),
        };
        let options = ScrapeOptions::monitoring(criteria);

        let records = match self.scraper.run(&options).await {
            Ok(records) => records,
            Err(err) => {
                error!(%task_id, error = %err, "scrape failed during monitoring check");
                return true;
            }
        };

        let mut new_vacancies: Vec<VacancyRecord> = Vec::new();
        let mut skipped_existing = 0usize;

        for record in records {
            match self
                .vacancies
                .find_by_key(&record.external_id, &record.source)
                .await
            {
                Ok(Some(_)) => skipped_existing += 1,
                Ok(None) => match self.vacancies.insert(&record).await {
                    Ok(_) => {
                        info!(
                            position = %record.position,
                            company = %record.company_name,
                            external_id = %record.external_id,
                            "found new vacancy"
                        );
                        new_vacancies.push(record);
                    }
                    // likely lost a create race; treat as already known
                    Err(err) => warn!(
                        external_id = %record.external_id,
                        error = %err,
                        "failed to persist vacancy"
                    ),
                },
                Err(err) => warn!(
                    external_id = %record.external_id,
                    error = %err,
                    "vacancy lookup failed"
                ),
            }
        }

        info!(
            %task_id,
            new = new_vacancies.len(),
            skipped = skipped_existing,
            "monitoring check complete"
        );

        if let Err(err) = self.tasks.update_last_check(task_id).await {
            warn!(%task_id, error = %err, "failed to update last check timestamp");
        }

        if !new_vacancies.is_empty() {
            self.notify(&user, &filter, &new_vacancies).await;
        }

        true
    }

    async fn notify(&self, user: &User, filter: &SearchFilter, vacancies: &[VacancyRecord]) {
        let total = vacancies.len();

        for (index, vacancy) in vacancies.iter().take(MAX_DETAILED_NOTIFICATIONS).enumerate() {
            let header = if total == 1 {
                format!("🔔 <b>Новая вакансия по фильтру \"{}\"</b>\n\n", filter.name)
            } else {
                format!(
                    "🔔 <b>Новая вакансия {}/{} по фильтру \"{}\"</b>\n\n",
                    index + 1,
                    total,
                    filter.name
                )
            };
            let message = header + &format_vacancy_message(vacancy);
            if let Err(err) = self.notifier.deliver(user.telegram_id, &message).await {
                error!(telegram_id = user.telegram_id, error = %err, "failed to deliver notification");
            }
        }

        if total > MAX_DETAILED_NOTIFICATIONS {
            let remaining = total - MAX_DETAILED_NOTIFICATIONS;
            let summary = format!(
                "🔔 <b>И еще {} новых вакансий по фильтру \"{}\"</b>\n\n\
                 Всего найдено: {} новых вакансий\n\
                 Используйте /search для просмотра всех вакансий.",
                remaining, filter.name, total
            );
            if let Err(err) = self.notifier.deliver(user.telegram_id, &summary).await {
                error!(telegram_id = user.telegram_id, error = %err, "failed to deliver summary notification");
            }
        }

        info!(
            telegram_id = user.telegram_id,
            count = total,
            "sent new-vacancy notifications"
        );
    }
}
