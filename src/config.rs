//! Configuration module for the article tracker.
//!
//! Configuration is read once at startup from a TOML file, then overridden
//! from environment variables. The resulting [`Config`] is immutable and
//! handed to each component's constructor.

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::{Result, TrackerError};

/// Feed source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Sitemap URL to poll.
    #[serde(default)]
    pub url: String,
    /// Total request timeout in seconds.
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
}

fn default_feed_timeout() -> u64 {
    30
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_feed_timeout(),
        }
    }
}

/// Messaging webhook configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL notifications are posted to.
    #[serde(default)]
    pub url: String,
    /// User ID to mention in notifications (empty = no mention).
    #[serde(default)]
    pub mention_user_id: String,
    /// Dashboard URL for the "View Dashboard" button (empty = no button).
    #[serde(default)]
    pub dashboard_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
    /// Maximum delivery attempts per message.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Exponential backoff base; the delay before attempt n+1 is `base^n` seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u32,
}

fn default_webhook_timeout() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u32 {
    2
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            mention_user_id: String::new(),
            dashboard_url: String::new(),
            timeout_secs: default_webhook_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base: default_backoff_base(),
        }
    }
}

/// Earnings and goal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Value credited per published article, in dollars.
    #[serde(default = "default_article_value")]
    pub article_value_usd: f64,
    /// Articles per day goal.
    #[serde(default = "default_daily_target")]
    pub daily_target: i64,
    /// Articles per month goal.
    #[serde(default = "default_monthly_target")]
    pub monthly_target: i64,
    /// Timezone for calendar days (e.g., "Asia/Jakarta", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_article_value() -> f64 {
    4.15
}

fn default_daily_target() -> i64 {
    8
}

fn default_monthly_target() -> i64 {
    240
}

fn default_timezone() -> String {
    "Asia/Jakarta".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            article_value_usd: default_article_value(),
            daily_target: default_daily_target(),
            monthly_target: default_monthly_target(),
            timezone: default_timezone(),
        }
    }
}

impl TrackerConfig {
    /// Per-article value in cents.
    pub fn article_value_cents(&self) -> i64 {
        (self.article_value_usd * 100.0).round() as i64
    }

    /// Parse the configured timezone, falling back to UTC.
    pub fn tz(&self) -> Tz {
        match Tz::from_str(&self.timezone) {
            Ok(tz) => tz,
            Err(_) => {
                tracing::error!("Unknown timezone: {}. Using UTC.", self.timezone);
                Tz::UTC
            }
        }
    }
}

/// Polling schedule configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Consecutive failed cycles before an alert is sent.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u32,
    /// Pause between notifications within one cycle, in milliseconds.
    #[serde(default = "default_notification_gap")]
    pub notification_gap_ms: u64,
}

fn default_poll_interval() -> u64 {
    180
}

fn default_alert_threshold() -> u32 {
    3
}

fn default_notification_gap() -> u64 {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            alert_threshold: default_alert_threshold(),
            notification_gap_ms: default_notification_gap(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    #[serde(default = "default_db_url")]
    pub url: String,
}

fn default_db_url() -> String {
    "sqlite:data/tracker.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; console only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Read-only dashboard configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Serve the dashboard.
    #[serde(default)]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_dashboard_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    /// Access key required as `?key=` (empty = no auth).
    #[serde(default)]
    pub password: String,
}

fn default_dashboard_host() -> String {
    "0.0.0.0".to_string()
}

fn default_dashboard_port() -> u16 {
    8080
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_dashboard_host(),
            port: default_dashboard_port(),
            password: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Feed source.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Messaging webhook.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Earnings and goals.
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Polling schedule.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Database.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Dashboard.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(TrackerError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    ///
    /// A missing file is not an error: defaults are used and the environment
    /// supplies the rest.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| TrackerError::Config(format!("config parse error: {e}")))
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    ///
    /// Supported variables:
    /// - `SITEMAP_URL`, `DISCORD_WEBHOOK_URL`, `DISCORD_USER_ID`, `DASHBOARD_URL`
    /// - `ARTICLE_VALUE_USD`, `DAILY_TARGET`, `MONTHLY_TARGET`
    /// - `POLL_INTERVAL`, `TIMEZONE`, `DATABASE_URL`, `DASHBOARD_PASSWORD`
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SITEMAP_URL") {
            self.feed.url = v;
        }
        if let Some(v) = get("DISCORD_WEBHOOK_URL") {
            self.webhook.url = v;
        }
        if let Some(v) = get("DISCORD_USER_ID") {
            self.webhook.mention_user_id = v;
        }
        if let Some(v) = get("DASHBOARD_URL") {
            self.webhook.dashboard_url = v;
        }
        if let Some(v) = get("ARTICLE_VALUE_USD") {
            self.tracker.article_value_usd = parse_var("ARTICLE_VALUE_USD", &v)?;
        }
        if let Some(v) = get("DAILY_TARGET") {
            self.tracker.daily_target = parse_var("DAILY_TARGET", &v)?;
        }
        if let Some(v) = get("MONTHLY_TARGET") {
            self.tracker.monthly_target = parse_var("MONTHLY_TARGET", &v)?;
        }
        if let Some(v) = get("POLL_INTERVAL") {
            self.scheduler.poll_interval_secs = parse_var("POLL_INTERVAL", &v)?;
        }
        if let Some(v) = get("TIMEZONE") {
            self.tracker.timezone = v;
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get("DASHBOARD_PASSWORD") {
            self.dashboard.password = v;
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The feed URL or webhook URL is missing or not http(s)
    /// - The poll interval, alert threshold or attempt count is zero
    /// - The article value is negative
    pub fn validate(&self) -> Result<()> {
        validate_http_url("feed.url (SITEMAP_URL)", &self.feed.url)?;
        validate_http_url("webhook.url (DISCORD_WEBHOOK_URL)", &self.webhook.url)?;

        if self.scheduler.poll_interval_secs == 0 {
            return Err(TrackerError::Config(
                "scheduler.poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.scheduler.alert_threshold == 0 {
            return Err(TrackerError::Config(
                "scheduler.alert_threshold must be greater than 0".to_string(),
            ));
        }
        if self.webhook.max_attempts == 0 {
            return Err(TrackerError::Config(
                "webhook.max_attempts must be greater than 0".to_string(),
            ));
        }
        if !self.tracker.article_value_usd.is_finite() || self.tracker.article_value_usd < 0.0 {
            return Err(TrackerError::Config(
                "tracker.article_value_usd must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TrackerError::Config(format!("invalid value for {key}: {value}")))
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TrackerError::Config(format!("{name} not set")));
    }
    let parsed = url::Url::parse(value)
        .map_err(|e| TrackerError::Config(format!("{name} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(TrackerError::Config(format!(
            "{name} has unsupported scheme: {scheme}"
        ))),
    }
}
