//! Test helpers for integration tests.
//!
//! Provides a scripted mock webhook, a mock sitemap server, feed and
//! notifier doubles, and ledger setup.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;

use article_tracker::notify::ArticleProgress;
use article_tracker::{
    ArticleLedger, Database, DeliveryOutcome, Entry, FeedSource, Notifier, Result, TrackerError,
};

/// Bind an axum router on an ephemeral local port.
async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

// ============================================================================
// Mock webhook
// ============================================================================

#[derive(Default)]
struct WebhookState {
    script: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<Value>>,
}

/// Webhook endpoint answering with scripted statuses, then 204.
pub struct MockWebhook {
    pub addr: SocketAddr,
    state: Arc<WebhookState>,
}

impl MockWebhook {
    /// Start a webhook that replies with `script` in order.
    pub async fn start(script: Vec<(u16, &str)>) -> Self {
        let state = Arc::new(WebhookState {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|(status, body)| (status, body.to_string()))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/webhook", post(webhook_handler))
            .with_state(state.clone());
        let addr = serve(router).await;
        Self { addr, state }
    }

    /// Webhook URL.
    pub fn url(&self) -> String {
        format!("http://{}/webhook", self.addr)
    }

    /// Bodies received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn webhook_handler(State(state): State<Arc<WebhookState>>, Json(body): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(body);
    let next = state.script.lock().unwrap().pop_front();
    match next {
        Some((status, body)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

// ============================================================================
// Mock sitemap server
// ============================================================================

#[derive(Default)]
struct FeedState {
    script: Mutex<VecDeque<(u16, String)>>,
    queries: Mutex<Vec<Option<String>>>,
}

/// Sitemap endpoint answering with scripted responses; the last one repeats.
pub struct MockFeedServer {
    pub addr: SocketAddr,
    state: Arc<FeedState>,
}

impl MockFeedServer {
    /// Start a sitemap server with the given responses.
    pub async fn start(script: Vec<(u16, String)>) -> Self {
        let state = Arc::new(FeedState {
            script: Mutex::new(script.into_iter().collect()),
            queries: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/news-sitemap.xml", get(feed_handler))
            .with_state(state.clone());
        let addr = serve(router).await;
        Self { addr, state }
    }

    /// Sitemap URL.
    pub fn url(&self) -> String {
        format!("http://{}/news-sitemap.xml", self.addr)
    }

    /// Raw query strings seen so far.
    pub fn queries(&self) -> Vec<Option<String>> {
        self.state.queries.lock().unwrap().clone()
    }
}

async fn feed_handler(State(state): State<Arc<FeedState>>, RawQuery(query): RawQuery) -> Response {
    state.queries.lock().unwrap().push(query);
    let mut script = state.script.lock().unwrap();
    let (status, body) = if script.len() > 1 {
        script.pop_front().unwrap_or((404, String::new()))
    } else {
        script.front().cloned().unwrap_or((404, String::new()))
    };
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response()
}

/// Build a news sitemap document. A `None` title omits the news block.
pub fn sitemap_xml(entries: &[(&str, Option<&str>)]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" \
         xmlns:news=\"http://www.google.com/schemas/sitemap-news/0.9\">\n",
    );
    for (url, title) in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", url));
        if let Some(title) = title {
            xml.push_str("    <news:news>\n");
            xml.push_str("      <news:publication_date>2024-05-10T08:00:00+07:00</news:publication_date>\n");
            xml.push_str(&format!("      <news:title>{}</news:title>\n", title));
            xml.push_str("    </news:news>\n");
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

// ============================================================================
// Doubles
// ============================================================================

/// Feed returning scripted results in order, then empty lists.
pub struct ScriptedFeed {
    script: Mutex<VecDeque<std::result::Result<Vec<Entry>, String>>>,
}

impl ScriptedFeed {
    /// Create a feed from scripted results; `Err` becomes a fetch error.
    pub fn new(script: Vec<std::result::Result<Vec<Entry>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// Scripted results not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedSource for ScriptedFeed {
    async fn fetch(&self) -> Result<Vec<Entry>> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(entries)) => Ok(entries),
            Some(Err(e)) => Err(TrackerError::Fetch(e)),
            None => Ok(Vec::new()),
        }
    }
}

/// Notifier that records every call and always reports delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub articles: Mutex<Vec<(Entry, ArticleProgress)>>,
    pub alerts: Mutex<Vec<(String, u32)>>,
}

impl RecordingNotifier {
    pub fn article_count(&self) -> usize {
        self.articles.lock().unwrap().len()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_new_article(&self, entry: &Entry, progress: &ArticleProgress) -> DeliveryOutcome {
        self.articles
            .lock()
            .unwrap()
            .push((entry.clone(), *progress));
        DeliveryOutcome::Delivered {
            attempts: 1,
            rate_limit_waits: 0,
        }
    }

    async fn notify_alert(&self, message: &str, failures: u32) -> DeliveryOutcome {
        self.alerts
            .lock()
            .unwrap()
            .push((message.to_string(), failures));
        DeliveryOutcome::Delivered {
            attempts: 1,
            rate_limit_waits: 0,
        }
    }
}

/// Entries for the given slugs under a fixed host.
pub fn entries(slugs: &[&str]) -> Vec<Entry> {
    slugs
        .iter()
        .map(|slug| Entry::new(format!("https://news.example.com/{}/", slug), *slug))
        .collect()
}

/// Ledger over a fresh in-memory database.
pub async fn memory_ledger() -> (Database, ArticleLedger) {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let ledger = ArticleLedger::new(db.pool().clone());
    (db, ledger)
}
