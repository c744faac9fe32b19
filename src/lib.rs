//! Article Tracker
//!
//! Watches a news sitemap for newly published articles, records each one
//! exactly once, tracks a calendar publishing streak and running earnings,
//! and pushes a progress notification to a messaging webhook.

pub mod cli;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod logging;
pub mod notify;
pub mod poll;
pub mod streak;
pub mod web;

pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{Result, TrackerError};
pub use feed::{Entry, FeedClient, FeedSource};
pub use ledger::{ArticleLedger, ArticleRecord, Counters, DailyAggregate, NewArticle, StreakState};
pub use notify::{ArticleProgress, DeliveryOutcome, Notifier, RetryPolicy, WebhookDispatcher};
pub use poll::{CycleSettings, PollCycle, Scheduler, SchedulerState, SchedulerSummary};
pub use streak::{next_streak, StreakEngine};
pub use web::DashboardServer;
