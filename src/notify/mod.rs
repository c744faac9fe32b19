//! Notification dispatch for the article tracker.
//!
//! This module renders progress messages and delivers them to a
//! Discord-compatible webhook with bounded retries and rate-limit handling.
//! Delivery is best-effort: failures are reported as a [`DeliveryOutcome`],
//! never as an error that could fail a poll cycle.

pub mod message;
pub mod progress;
pub mod webhook;

pub use message::{
    render_alert, render_article, render_startup, ArticleProgress, WebhookPayload,
};
pub use progress::{format_increment, format_usd, render_progress_bar};
pub use webhook::{RetryPolicy, WebhookDispatcher};

use async_trait::async_trait;

use crate::feed::Entry;

/// Result of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint accepted the message.
    Delivered {
        /// Attempts used, not counting rate-limit waits.
        attempts: u32,
        /// Rate-limit responses that were waited out.
        rate_limit_waits: u32,
    },
    /// Every attempt failed.
    Failed {
        /// Attempts used.
        attempts: u32,
        /// Rate-limit responses that were waited out.
        rate_limit_waits: u32,
        /// Last failure seen.
        error: String,
    },
}

impl DeliveryOutcome {
    /// Whether the message was delivered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    /// Attempts used.
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts, .. } | DeliveryOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Sink for tracker notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce a newly detected article with refreshed progress.
    async fn notify_new_article(&self, entry: &Entry, progress: &ArticleProgress)
        -> DeliveryOutcome;

    /// Alert the operator after `failures` consecutive failed cycles.
    async fn notify_alert(&self, message: &str, failures: u32) -> DeliveryOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_outcome_accessors() {
        let ok = DeliveryOutcome::Delivered {
            attempts: 2,
            rate_limit_waits: 1,
        };
        assert!(ok.is_delivered());
        assert_eq!(ok.attempts(), 2);

        let failed = DeliveryOutcome::Failed {
            attempts: 3,
            rate_limit_waits: 0,
            error: "HTTP error: 500".to_string(),
        };
        assert!(!failed.is_delivered());
        assert_eq!(failed.attempts(), 3);
    }
}
