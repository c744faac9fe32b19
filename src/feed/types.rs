//! Feed types.

use chrono::{DateTime, Utc};

/// Maximum sitemap size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// One feed item read on a given fetch, not yet known to be new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Canonical article URL.
    pub url: String,
    /// Display title (falls back to a title derived from the URL slug).
    pub title: String,
    /// Publication time, if the feed supplied a parseable one.
    pub published_at: Option<DateTime<Utc>>,
    /// Keywords, if the feed supplied any.
    pub keywords: Vec<String>,
}

impl Entry {
    /// Create an entry with no optional metadata.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            published_at: None,
            keywords: Vec::new(),
        }
    }

    /// Set the publication time.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Set the keyword list.
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}
