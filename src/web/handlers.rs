//! Dashboard handlers.
//!
//! Every handler is read-only: the dashboard queries the same ledger the
//! poll cycle writes, and exposes no write surface.

use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::Arc;

use super::error::ApiError;
use crate::config::Config;
use crate::datetime::{format_local, local_date};
use crate::ledger::{ArticleLedger, ArticleRecord, Counters, DailyAggregate};
use crate::notify::progress::{
    daily_remaining, format_usd, progress_percent, render_progress_bar, DEFAULT_BAR_WIDTH,
};

/// Default number of recent articles returned.
pub const DEFAULT_ARTICLE_LIMIT: i64 = 20;

/// Maximum number of recent articles returned.
pub const MAX_ARTICLE_LIMIT: i64 = 100;

/// Default number of days of history returned.
pub const DEFAULT_HISTORY_DAYS: i64 = 30;

/// Maximum number of days of history returned.
pub const MAX_HISTORY_DAYS: i64 = 366;

/// Shared dashboard state.
#[derive(Clone)]
pub struct AppState {
    /// Ledger queried by every handler.
    pub ledger: ArticleLedger,
    /// Timezone for calendar days.
    pub tz: Tz,
    /// Value credited per article, in cents.
    pub value_cents: i64,
    /// Articles per day goal.
    pub daily_target: i64,
    /// Articles per month goal.
    pub monthly_target: i64,
    /// Access key (empty = open).
    pub password: String,
}

impl AppState {
    /// Build dashboard state from configuration.
    pub fn from_config(ledger: ArticleLedger, config: &Config) -> Self {
        Self {
            ledger,
            tz: config.tracker.tz(),
            value_cents: config.tracker.article_value_cents(),
            daily_target: config.tracker.daily_target,
            monthly_target: config.tracker.monthly_target,
            password: config.dashboard.password.clone(),
        }
    }

    /// Check a supplied access key.
    pub fn check_key(&self, key: Option<&str>) -> bool {
        self.password.is_empty() || key == Some(self.password.as_str())
    }
}

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Access key query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct KeyQuery {
    /// Dashboard password.
    pub key: Option<String>,
}

/// Query for `/api/articles`.
#[derive(Debug, Default, Deserialize)]
pub struct ArticlesQuery {
    /// Number of articles to return.
    pub limit: Option<i64>,
}

/// Query for `/api/daily`.
#[derive(Debug, Default, Deserialize)]
pub struct DailyQuery {
    /// Number of days of history to return.
    pub days: Option<i64>,
}

/// Aggregates shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Local time of the snapshot.
    pub now: String,
    pub today_count: i64,
    pub today_earned_cents: i64,
    pub month_count: i64,
    pub month_earned_cents: i64,
    pub total_count: i64,
    pub total_earned_cents: i64,
    pub article_value_cents: i64,
    pub daily_target: i64,
    pub monthly_target: i64,
    pub daily_remaining: i64,
    pub today_pct: u32,
    pub monthly_pct: u32,
    pub streak: u32,
    pub last_publish_date: Option<NaiveDate>,
}

impl StatsResponse {
    fn build(state: &AppState, counters: Counters, streak: u32, last: Option<NaiveDate>, now: DateTime<Utc>) -> Self {
        Self {
            now: format_local(now, state.tz, "%Y-%m-%d %H:%M %Z"),
            today_count: counters.today_count,
            today_earned_cents: counters.today_earned_cents,
            month_count: counters.month_count,
            month_earned_cents: counters.month_earned_cents,
            total_count: counters.total_count,
            total_earned_cents: counters.total_earned_cents,
            article_value_cents: state.value_cents,
            daily_target: state.daily_target,
            monthly_target: state.monthly_target,
            daily_remaining: daily_remaining(counters.today_count, state.daily_target),
            today_pct: progress_percent(counters.today_count, state.daily_target),
            monthly_pct: progress_percent(counters.month_count, state.monthly_target),
            streak,
            last_publish_date: last,
        }
    }
}

async fn load_stats(state: &AppState) -> Result<StatsResponse, ApiError> {
    let now = Utc::now();
    let counters = state.ledger.counters(state.tz, now).await?;
    let streak = state.ledger.get_streak().await?;
    Ok(StatsResponse::build(
        state,
        counters,
        streak.length,
        streak.last_date,
        now,
    ))
}

fn history_since(tz: Tz, days: i64) -> NaiveDate {
    local_date(tz, Utc::now()) - Duration::days(days)
}

/// GET /health - Liveness check.
pub async fn health() -> &'static str {
    "OK"
}

/// GET /api/stats - Current aggregates.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsResponse>>, ApiError> {
    Ok(Json(ApiResponse::new(load_stats(&state).await?)))
}

/// GET /api/articles - Recently detected articles, newest first.
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Json<ApiResponse<Vec<ArticleRecord>>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ARTICLE_LIMIT);
    if limit < 1 {
        return Err(ApiError::bad_request("limit must be at least 1"));
    }
    let articles = state
        .ledger
        .recent_articles(limit.min(MAX_ARTICLE_LIMIT))
        .await?;
    Ok(Json(ApiResponse::new(articles)))
}

/// GET /api/daily - Per-day history, oldest first.
pub async fn daily_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<ApiResponse<Vec<DailyAggregate>>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if days < 0 {
        return Err(ApiError::bad_request("days must not be negative"));
    }
    let since = history_since(state.tz, days.min(MAX_HISTORY_DAYS));
    let history = state.ledger.daily_history(since).await?;
    Ok(Json(ApiResponse::new(history)))
}

/// GET / - HTML dashboard.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let stats = load_stats(&state).await?;
    let articles = state.ledger.recent_articles(DEFAULT_ARTICLE_LIMIT).await?;
    let history = state
        .ledger
        .daily_history(history_since(state.tz, DEFAULT_HISTORY_DAYS))
        .await?;
    Ok(Html(render_dashboard(&state, &stats, &articles, &history)))
}

/// Render the dashboard page. All feed-supplied text is escaped.
pub fn render_dashboard(
    state: &AppState,
    stats: &StatsResponse,
    articles: &[ArticleRecord],
    history: &[DailyAggregate],
) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Article Tracker</title>\n\
         <style>body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
         table{border-collapse:collapse;width:100%}td,th{padding:.25rem .5rem;text-align:left}\
         .bar{font-family:monospace}</style>\n</head>\n<body>\n",
    );

    let _ = writeln!(html, "<h1>Article Tracker</h1>\n<p>{}</p>", html_escape::encode_text(&stats.now));

    let _ = writeln!(
        html,
        "<h2>Earnings</h2>\n<ul>\n<li>Today: <b>{}</b></li>\n<li>This month: <b>{}</b></li>\n\
         <li>All time: <b>{}</b> ({} articles at {})</li>\n</ul>",
        format_usd(stats.today_earned_cents),
        format_usd(stats.month_earned_cents),
        format_usd(stats.total_earned_cents),
        stats.total_count,
        format_usd(state.value_cents),
    );

    let _ = writeln!(
        html,
        "<h2>Progress</h2>\n<p>Today: {} / {}<br><span class=\"bar\">{}</span></p>\n\
         <p>Month: {} / {}<br><span class=\"bar\">{}</span></p>",
        stats.today_count,
        stats.daily_target,
        render_progress_bar(stats.today_count, stats.daily_target, DEFAULT_BAR_WIDTH),
        stats.month_count,
        stats.monthly_target,
        render_progress_bar(stats.month_count, stats.monthly_target, DEFAULT_BAR_WIDTH),
    );

    if stats.daily_remaining > 0 {
        let _ = writeln!(html, "<p>{} more to daily goal</p>", stats.daily_remaining);
    } else {
        html.push_str("<p>Daily goal reached!</p>\n");
    }

    let _ = writeln!(
        html,
        "<h2>Streak</h2>\n<p>{} day{}{}</p>",
        stats.streak,
        if stats.streak == 1 { "" } else { "s" },
        stats
            .last_publish_date
            .map(|d| format!(" (last: {})", d))
            .unwrap_or_default(),
    );

    html.push_str("<h2>Recent articles</h2>\n<table>\n<tr><th>Detected</th><th>Title</th><th>Value</th></tr>\n");
    for article in articles {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}</td></tr>",
            format_local(article.detected_at, state.tz, "%Y-%m-%d %H:%M"),
            html_escape::encode_double_quoted_attribute(&article.url),
            html_escape::encode_text(&article.title),
            format_usd(article.earning_cents),
        );
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Last 30 days</h2>\n<table>\n<tr><th>Date</th><th>Articles</th><th>Earned</th></tr>\n");
    for day in history {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            day.date.format("%b %d"),
            day.article_count,
            format_usd(day.earned_cents),
        );
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[cfg(feature = "sqlite")]
    async fn state(password: &str) -> AppState {
        let db = crate::db::Database::open_in_memory().await.unwrap();
        AppState {
            ledger: ArticleLedger::new(db.pool().clone()),
            tz: Tz::UTC,
            value_cents: 415,
            daily_target: 8,
            monthly_target: 240,
            password: password.to_string(),
        }
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_check_key() {
        let open = state("").await;
        assert!(open.check_key(None));
        assert!(open.check_key(Some("anything")));

        let locked = state("secret").await;
        assert!(!locked.check_key(None));
        assert!(!locked.check_key(Some("wrong")));
        assert!(locked.check_key(Some("secret")));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_render_dashboard_escapes_titles() {
        let state = state("").await;
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let counters = Counters {
            today_count: 5,
            today_earned_cents: 2075,
            month_count: 42,
            month_earned_cents: 17430,
            total_count: 42,
            total_earned_cents: 17430,
        };
        let stats = StatsResponse::build(&state, counters, 3, None, now);
        let articles = vec![ArticleRecord {
            id: 1,
            url: "https://x.example/a?b=1&c=\"2\"".to_string(),
            title: "<script>alert(1)</script>".to_string(),
            published_at: None,
            detected_at: now,
            earning_cents: 415,
        }];

        let html = render_dashboard(&state, &stats, &articles, &[]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&quot;2&quot;"));
        assert!(html.contains("██████░░░░ 62%"));
        assert!(html.contains("3 more to daily goal"));
        assert!(html.contains("$174.30"));
        assert!(html.contains("3 days"));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_stats_response_percentages() {
        let state = state("").await;
        let counters = Counters {
            today_count: 10,
            month_count: 60,
            ..Default::default()
        };
        let stats = StatsResponse::build(&state, counters, 1, None, Utc::now());
        assert_eq!(stats.today_pct, 100);
        assert_eq!(stats.monthly_pct, 25);
        assert_eq!(stats.daily_remaining, 0);
    }
}
