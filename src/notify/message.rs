//! Notification message rendering.
//!
//! Messages are plain-text `content` rather than rich embeds so that mobile
//! push previews show the text. An optional link button points at the
//! dashboard.

use serde::Serialize;

use super::progress::{
    daily_remaining, format_increment, format_usd, render_progress_bar, DEFAULT_BAR_WIDTH,
};
use crate::feed::Entry;
use crate::ledger::Counters;

/// Separator line between message sections.
const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Maximum error text included in an alert.
pub const MAX_ALERT_ERROR_CHARS: usize = 500;

/// Label on the dashboard link button.
pub const DASHBOARD_BUTTON_LABEL: &str = "📊 View Dashboard";

/// Everything a new-article message reports besides the entry itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleProgress {
    /// Value credited for this article, in cents.
    pub value_cents: i64,
    /// Refreshed aggregates.
    pub counters: Counters,
    /// Current streak length.
    pub streak: u32,
    /// Articles per day goal.
    pub daily_target: i64,
    /// Articles per month goal.
    pub monthly_target: i64,
}

/// JSON body posted to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    /// Plain-text message.
    pub content: String,
    /// Optional action rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ActionRow>>,
}

/// A row of interactive components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<LinkButton>,
}

/// A link button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkButton {
    #[serde(rename = "type")]
    pub kind: u8,
    pub style: u8,
    pub label: String,
    pub url: String,
}

impl WebhookPayload {
    /// Payload with text only.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            components: None,
        }
    }

    /// Attach a dashboard link button when `dashboard_url` is non-empty.
    pub fn with_dashboard(mut self, dashboard_url: Option<&str>) -> Self {
        self.components = dashboard_url
            .filter(|url| !url.is_empty())
            .map(|url| {
                vec![ActionRow {
                    kind: 1,
                    components: vec![LinkButton {
                        kind: 2,
                        style: 5,
                        label: DASHBOARD_BUTTON_LABEL.to_string(),
                        url: url.to_string(),
                    }],
                }]
            });
        self
    }
}

/// Render a mention token, or nothing.
pub fn mention(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) if !id.is_empty() => format!("<@{}>", id),
        _ => String::new(),
    }
}

fn plural_days(n: u32) -> &'static str {
    if n == 1 {
        "Day"
    } else {
        "Days"
    }
}

/// Render the new-article message.
pub fn render_article(entry: &Entry, progress: &ArticleProgress, mention_user: Option<&str>) -> String {
    let c = &progress.counters;
    let remaining = daily_remaining(c.today_count, progress.daily_target);
    let goal_line = if remaining > 0 {
        format!("🎯  {} More To Daily Goal", remaining)
    } else {
        "🎯  ✅ Daily Goal Reached!".to_string()
    };

    let lines = [
        format!("💸  **{}**", format_increment(progress.value_cents)),
        format!("💰  Total This Month: **{}**", format_usd(c.month_earned_cents)),
        format!("📅  Today: **{}**", format_usd(c.today_earned_cents)),
        String::new(),
        RULE.to_string(),
        String::new(),
        "🚀  **ARTICLE PUBLISHED**".to_string(),
        format!("📰  {}", entry.title),
        format!("🔗  {}", entry.url),
        String::new(),
        RULE.to_string(),
        String::new(),
        "📊  **Today**".to_string(),
        format!(
            "`{}`",
            render_progress_bar(c.today_count, progress.daily_target, DEFAULT_BAR_WIDTH)
        ),
        format!("**{} / {}** Articles", c.today_count, progress.daily_target),
        String::new(),
        format!(
            "🔥  **Streak: {} {}**",
            progress.streak,
            plural_days(progress.streak)
        ),
        String::new(),
        goal_line,
        String::new(),
        "📈  **Monthly Progress**".to_string(),
        format!(
            "`{}`",
            render_progress_bar(c.month_count, progress.monthly_target, DEFAULT_BAR_WIDTH)
        ),
        format!("**{} / {}** Articles", c.month_count, progress.monthly_target),
        String::new(),
        mention(mention_user),
    ];

    lines.join("\n").trim().to_string()
}

/// Render the operator alert sent after repeated cycle failures.
pub fn render_alert(error: &str, failures: u32, mention_user: Option<&str>) -> String {
    let error: String = error.chars().take(MAX_ALERT_ERROR_CHARS).collect();
    format!(
        "⚠️  **ARTICLE TRACKER - ERROR**\n\n\
         Polling has failed **{}** consecutive cycles.\n\
         ```\n{}\n```\n\
         Tracker will keep retrying.\n\n{}",
        failures,
        error,
        mention(mention_user)
    )
    .trim()
    .to_string()
}

/// Render the startup message.
pub fn render_startup(summary: &str, mention_user: Option<&str>) -> String {
    format!(
        "✅  **ARTICLE TRACKER - ONLINE**\n\n\
         Tracker is now running and monitoring articles.\n\
         ```\n{}\n```\n\n{}",
        summary,
        mention(mention_user)
    )
    .trim()
    .to_string()
}

/// Sample entry and progress used by the test notification.
pub fn sample_article(value_cents: i64, daily_target: i64, monthly_target: i64) -> (Entry, ArticleProgress) {
    let entry = Entry::new(
        "https://example.com/test-article",
        "🧪 Test Article - Tracker Works!",
    );
    let progress = ArticleProgress {
        value_cents,
        counters: Counters {
            today_count: 3,
            today_earned_cents: 3 * value_cents,
            month_count: 42,
            month_earned_cents: 3750,
            total_count: 42,
            total_earned_cents: 3750,
        },
        streak: 5,
        daily_target,
        monthly_target,
    };
    (entry, progress)
}
