use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use uuid::Uuid;

use vacancy_monitor::config::Config;
use vacancy_monitor::error::Result;
use vacancy_monitor::models::filter::SearchFilter;
use vacancy_monitor::models::monitoring::MonitoringTask;
use vacancy_monitor::models::user::User;
use vacancy_monitor::models::vacancy::Vacancy;
use vacancy_monitor::scrape::{GszScraper, VacancyRecord};
use vacancy_monitor::services::filter_store::FilterStore;
use vacancy_monitor::services::monitoring_service::MonitoringScheduler;
use vacancy_monitor::services::notifier::NotificationSink;
use vacancy_monitor::services::task_store::TaskStore;
use vacancy_monitor::services::user_store::UserStore;
use vacancy_monitor::services::vacancy_store::VacancyStore;

fn job_block(id: u32, position: &str) -> String {
    format!(
        r##"<div class="job-block">
            <h4 class="job-title"><a href="/directory/vacancy/{id}/">{position}</a></h4>
            <ul class="job-info">
                <li class="org"><a href="#">ЖЭС №7</a></li>
                <li><span class="address">г. Минск, пр. Независимости, 10</span></li>
            </ul>
        </div>"##
    )
}

#[derive(Clone)]
struct SiteState {
    first_page: Arc<String>,
}

async fn search_handler(
    State(state): State<SiteState>,
    Query(params): Query<HashMap<String, String>>,
) -> String {
    let page: u32 = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    if page == 1 {
        format!("<html><body>{}</body></html>", state.first_page)
    } else {
        "<html><body><p>ничего не найдено</p></body></html>".to_string()
    }
}

async fn spawn_site(first_page: String) -> String {
    let app = Router::new()
        .route("/registration/vacancy-search/", get(search_handler))
        .with_state(SiteState {
            first_page: Arc::new(first_page),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });
    format!("http://{}", addr)
}

fn test_config(base_url: String) -> Config {
    Config {
        database_url: String::new(),
        bot_webhook_url: String::new(),
        source_base_url: base_url,
        request_timeout_secs: 5,
        delay_between_requests: 0.0,
        delay_between_pages: 0.0,
        requests_per_minute: 10000,
        requests_per_hour: 100000,
        default_monitoring_interval_hours: 3,
    }
}

struct StubTasks {
    task: MonitoringTask,
    last_check_updates: AtomicUsize,
}

#[async_trait]
impl TaskStore for StubTasks {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MonitoringTask>> {
        Ok((id == self.task.id).then(|| self.task.clone()))
    }
    async fn list_active(&self) -> Result<Vec<MonitoringTask>> {
        Ok(vec![self.task.clone()])
    }
    async fn update_last_check(&self, _id: Uuid) -> Result<()> {
        self.last_check_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StubFilters {
    filter: SearchFilter,
}

#[async_trait]
impl FilterStore for StubFilters {
    async fn find_by_id(&self, _id: Uuid) -> Result<Option<SearchFilter>> {
        Ok(Some(self.filter.clone()))
    }
}

struct StubUsers {
    user: User,
}

#[async_trait]
impl UserStore for StubUsers {
    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>> {
        Ok(Some(self.user.clone()))
    }
}

#[derive(Default)]
struct MemoryVacancies {
    rows: Mutex<HashMap<(String, String), Vacancy>>,
}

#[async_trait]
impl VacancyStore for MemoryVacancies {
    async fn find_by_key(&self, external_id: &str, source: &str) -> Result<Option<Vacancy>> {
        Ok(self
            .rows
            .lock()
            .expect("rows mutex")
            .get(&(external_id.to_string(), source.to_string()))
            .cloned())
    }
    async fn insert(&self, record: &VacancyRecord) -> Result<Vacancy> {
        let vacancy = Vacancy {
            id: Uuid::new_v4(),
            external_id: record.external_id.clone(),
            source: record.source.clone(),
            date_posted: record.date_posted,
            company_name: record.company_name.clone(),
            company_address: record.company_address.clone(),
            position: record.position.clone(),
            vacancies_count: record.vacancies_count.map(|c| c as i32),
            salary: record.salary.clone(),
            contact_person: record.contact_person.clone(),
            contact_phone: record.contact_phone.clone(),
            url: record.url.clone(),
            created_at: None,
            updated_at: None,
        };
        self.rows.lock().expect("rows mutex").insert(
            (record.external_id.clone(), record.source.clone()),
            vacancy.clone(),
        );
        Ok(vacancy)
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, telegram_id: i64, message: &str) -> Result<()> {
        self.messages
            .lock()
            .expect("messages mutex")
            .push((telegram_id, message.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn monitoring_tick_notifies_only_genuinely_new_vacancies() {
    let first_page = [
        job_block(101, "сантехник"),
        job_block(102, "сантехник"),
        job_block(103, "сантехник"),
    ]
    .concat();
    let base = spawn_site(first_page).await;

    let task_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let filter_id = Uuid::new_v4();

    let tasks = Arc::new(StubTasks {
        task: MonitoringTask {
            id: task_id,
            user_id,
            filter_id,
            interval_hours: 3,
            last_check: None,
            is_active: true,
            created_at: None,
        },
        last_check_updates: AtomicUsize::new(0),
    });
    let vacancies = Arc::new(MemoryVacancies::default());
    let sink = Arc::new(RecordingSink::default());

    let scraper =
        Arc::new(GszScraper::from_config(&test_config(base)).expect("scraper from config"));

    let scheduler = MonitoringScheduler::new(
        tasks.clone(),
        Arc::new(StubFilters {
            filter: SearchFilter {
                id: filter_id,
                user_id,
                name: "plumber-minsk".into(),
                profession: Some("сантехник".into()),
                city: Some("Минск".into()),
                company_name: None,
                is_active: true,
                created_at: None,
            },
        }),
        Arc::new(StubUsers {
            user: User {
                id: user_id,
                telegram_id: 42,
                username: None,
                first_name: "Анна".into(),
                last_name: None,
                is_active: true,
                is_admin: false,
                created_at: None,
                last_activity: None,
            },
        }),
        vacancies.clone(),
        sink.clone(),
        scraper,
    );

    // first tick: empty store, all three listings are new
    assert!(scheduler.run_check_now(task_id).await);
    assert_eq!(vacancies.rows.lock().expect("rows mutex").len(), 3);
    {
        let messages = sink.messages.lock().expect("messages mutex");
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|(chat, _)| *chat == 42));
        assert!(messages[0].1.contains("plumber-minsk"));
        assert!(messages[0].1.contains("сантехник"));
    }
    assert_eq!(tasks.last_check_updates.load(Ordering::SeqCst), 1);

    // second tick over the same listings: nothing new, nothing delivered
    assert!(scheduler.run_check_now(task_id).await);
    assert_eq!(vacancies.rows.lock().expect("rows mutex").len(), 3);
    assert_eq!(sink.messages.lock().expect("messages mutex").len(), 3);
    assert_eq!(tasks.last_check_updates.load(Ordering::SeqCst), 2);
}
