//! Ledger record types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A newly detected article, ready to be recorded.
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Canonical article URL (the identifying key).
    pub url: String,
    /// Display title.
    pub title: String,
    /// Publication time reported by the feed.
    pub published_at: Option<DateTime<Utc>>,
    /// Value credited for this article, in cents.
    pub earning_cents: i64,
}

impl NewArticle {
    /// Create a new article.
    pub fn new(url: impl Into<String>, title: impl Into<String>, earning_cents: i64) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            published_at: None,
            earning_cents,
        }
    }

    /// Set the feed-reported publication time.
    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }
}

/// A recorded article. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    /// Row ID.
    pub id: i64,
    /// Canonical article URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Publication time reported by the feed.
    pub published_at: Option<DateTime<Utc>>,
    /// When the tracker first saw the article.
    pub detected_at: DateTime<Utc>,
    /// Value credited, in cents.
    pub earning_cents: i64,
}

/// Per-day totals in the tracker's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyAggregate {
    /// Calendar date.
    pub date: NaiveDate,
    /// Articles detected that day.
    pub article_count: i64,
    /// Sum of their value, in cents.
    pub earned_cents: i64,
}

/// The publishing streak singleton.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakState {
    /// Consecutive publishing days.
    pub length: u32,
    /// Date of the last detection that advanced or held the streak.
    pub last_date: Option<NaiveDate>,
}

/// Snapshot of every aggregate the notifications and dashboard show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub today_count: i64,
    pub today_earned_cents: i64,
    pub month_count: i64,
    pub month_earned_cents: i64,
    pub total_count: i64,
    pub total_earned_cents: i64,
}

/// What recording a new detection produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Streak length after this detection.
    pub streak: u32,
    /// Aggregates including this detection.
    pub counters: Counters,
}
