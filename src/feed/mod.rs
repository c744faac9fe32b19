//! Feed source for the article tracker.
//!
//! This module fetches the remote news sitemap and turns it into a sequence
//! of candidate [`Entry`] values. It holds no state between fetches.

pub mod fetcher;
pub mod sitemap;
pub mod types;

pub use fetcher::{FeedClient, CACHE_BUST_PARAM};
pub use sitemap::{parse_publication_date, parse_sitemap, title_from_url};
pub use types::{Entry, MAX_FEED_SIZE};

use async_trait::async_trait;

use crate::Result;

/// Source of candidate entries.
///
/// Any transport, status or parse failure is returned as
/// [`TrackerError::Fetch`](crate::TrackerError::Fetch); the caller decides
/// how to escalate.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current entries in document order.
    async fn fetch(&self) -> Result<Vec<Entry>>;
}
