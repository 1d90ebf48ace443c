use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::get;
use axum::Router;

use vacancy_monitor::scrape::{BackoffPolicy, PageFetcher, RateLimiter, RequestThrottler, UserAgentRotator};

struct Scripted {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: &'static str,
}

impl Scripted {
    fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: "",
        }
    }

    fn ok(body: &'static str) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

#[derive(Clone)]
struct ScriptState {
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    hits: Arc<AtomicUsize>,
}

async fn scripted_handler(State(state): State<ScriptState>) -> (StatusCode, HeaderMap, String) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let next = state.responses.lock().expect("script mutex").pop_front();
    match next {
        Some(scripted) => {
            let mut headers = HeaderMap::new();
            for (name, value) in scripted.headers {
                headers.insert(name, HeaderValue::from_static(value));
            }
            (
                StatusCode::from_u16(scripted.status).expect("valid status"),
                headers,
                scripted.body.to_string(),
            )
        }
        None => (StatusCode::OK, HeaderMap::new(), "unscripted".to_string()),
    }
}

async fn spawn_server(script: Vec<Scripted>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = ScriptState {
        responses: Arc::new(Mutex::new(script.into())),
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/", get(scripted_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });

    (format!("http://{}/", addr), hits)
}

fn fetcher() -> PageFetcher {
    fetcher_with_throttler(Arc::new(RequestThrottler::new(1000, 10000)))
}

fn fetcher_with_throttler(throttler: Arc<RequestThrottler>) -> PageFetcher {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client");
    PageFetcher::new(
        client,
        Arc::new(RateLimiter::new(Duration::ZERO, Duration::ZERO, false)),
        throttler,
        Arc::new(UserAgentRotator::new()),
    )
}

#[tokio::test]
async fn ok_body_is_returned_first_try() {
    let (url, hits) = spawn_server(vec![Scripted::ok("hello")]).await;

    let body = fetcher().fetch(&url).await;

    assert_eq!(body.as_deref(), Some("hello"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_after_header_is_obeyed_on_429() {
    let (url, hits) = spawn_server(vec![
        Scripted::status(429).with_header("retry-after", "1"),
        Scripted::ok("recovered"),
    ])
    .await;

    let started = Instant::now();
    let body = fetcher().fetch(&url).await;

    assert_eq!(body.as_deref(), Some("recovered"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn not_found_fails_fast_without_retries() {
    let (url, hits) = spawn_server(vec![Scripted::status(404)]).await;

    let started = Instant::now();
    let body = fetcher().fetch(&url).await;

    assert_eq!(body, None);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn unexpected_statuses_exhaust_the_retry_budget() {
    let (url, hits) = spawn_server(vec![Scripted::status(500), Scripted::status(500)]).await;

    let body = fetcher().fetch_with_retries(&url, 2).await;

    assert_eq!(body, None);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn throttler_veto_is_a_soft_pause() {
    let (url, hits) = spawn_server(vec![Scripted::ok("ok")]).await;

    // zero budget: every fetch starts vetoed
    let fetcher = fetcher_with_throttler(Arc::new(RequestThrottler::new(0, 0)))
        .with_backoff(BackoffPolicy {
            throttle_cooldown: Duration::from_millis(300),
            ..BackoffPolicy::default()
        });

    let started = Instant::now();
    let body = fetcher.fetch(&url).await;

    assert_eq!(body.as_deref(), Some("ok"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_millis(300));
}
