//! One fetch, reconcile and notify pass.

use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::feed::{Entry, FeedSource};
use crate::ledger::{ArticleLedger, Detection, NewArticle};
use crate::notify::{ArticleProgress, Notifier};
use crate::Result;

/// Per-cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Between cycles.
    Idle,
    /// Waiting on the feed.
    Fetching,
    /// Comparing entries with the ledger and notifying.
    Reconciling,
}

/// Values a cycle needs from the configuration.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Value credited per article, in cents.
    pub value_cents: i64,
    /// Articles per day goal.
    pub daily_target: i64,
    /// Articles per month goal.
    pub monthly_target: i64,
    /// Timezone for calendar days.
    pub tz: Tz,
    /// Pause between notifications within one cycle.
    pub notification_gap: Duration,
}

impl CycleSettings {
    /// Extract cycle settings from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            value_cents: config.tracker.article_value_cents(),
            daily_target: config.tracker.daily_target,
            monthly_target: config.tracker.monthly_target,
            tz: config.tracker.tz(),
            notification_gap: Duration::from_millis(config.scheduler.notification_gap_ms),
        }
    }
}

/// Orchestrates one poll cycle.
pub struct PollCycle {
    feed: Arc<dyn FeedSource>,
    ledger: ArticleLedger,
    notifier: Arc<dyn Notifier>,
    settings: CycleSettings,
    phase: watch::Sender<CyclePhase>,
}

impl PollCycle {
    /// Create a poll cycle.
    pub fn new(
        feed: Arc<dyn FeedSource>,
        ledger: ArticleLedger,
        notifier: Arc<dyn Notifier>,
        settings: CycleSettings,
    ) -> Self {
        let (phase, _) = watch::channel(CyclePhase::Idle);
        Self {
            feed,
            ledger,
            notifier,
            settings,
            phase,
        }
    }

    /// Watch the cycle phase.
    pub fn subscribe(&self) -> watch::Receiver<CyclePhase> {
        self.phase.subscribe()
    }

    /// The notifier used for article and alert messages.
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// The ledger this cycle records into.
    pub fn ledger(&self) -> &ArticleLedger {
        &self.ledger
    }

    /// Run one cycle and return the number of new articles.
    ///
    /// A fetch or storage failure is returned as an error. Delivery failures
    /// are logged and do not fail the cycle. Cancellation is checked before
    /// each new entry is recorded, so a recorded entry always gets its
    /// notification attempt.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<usize> {
        self.phase.send_replace(CyclePhase::Fetching);
        let entries = match self.feed.fetch().await {
            Ok(entries) => entries,
            Err(e) => {
                self.phase.send_replace(CyclePhase::Idle);
                return Err(e);
            }
        };

        self.phase.send_replace(CyclePhase::Reconciling);
        let result = self.reconcile(entries, cancel).await;
        self.phase.send_replace(CyclePhase::Idle);
        result
    }

    async fn reconcile(&self, entries: Vec<Entry>, cancel: &CancellationToken) -> Result<usize> {
        let mut new_count = 0;

        for entry in entries {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping after {} new article(s)", new_count);
                break;
            }

            if self.ledger.exists(&entry.url).await? {
                continue;
            }

            if new_count > 0 && !self.settings.notification_gap.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Cancellation requested, stopping after {} new article(s)", new_count);
                        break;
                    }
                    _ = tokio::time::sleep(self.settings.notification_gap) => {}
                }
            }

            if self.process_new(&entry).await? {
                new_count += 1;
            }
        }

        Ok(new_count)
    }

    /// Record, advance the streak and notify for one unseen entry.
    ///
    /// Returns `false` if another writer recorded the entry first.
    async fn process_new(&self, entry: &Entry) -> Result<bool> {
        let now = Utc::now();

        info!("New article: {} ({})", entry.title, entry.url);

        let article = NewArticle::new(&entry.url, &entry.title, self.settings.value_cents)
            .with_published_at(entry.published_at);
        let Some(Detection { streak, counters }) = self
            .ledger
            .record_detection(&article, self.settings.tz, now)
            .await?
        else {
            debug!("Article recorded concurrently, skipping: {}", entry.url);
            return Ok(false);
        };

        let progress = ArticleProgress {
            value_cents: self.settings.value_cents,
            counters,
            streak,
            daily_target: self.settings.daily_target,
            monthly_target: self.settings.monthly_target,
        };

        let outcome = self.notifier.notify_new_article(entry, &progress).await;
        if !outcome.is_delivered() {
            warn!("Notification for {} was not delivered: {:?}", entry.url, outcome);
        }

        Ok(true)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::notify::DeliveryOutcome;
    use crate::TrackerError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticFeed(Result<Vec<Entry>>);

    #[async_trait]
    impl FeedSource for StaticFeed {
        async fn fetch(&self) -> Result<Vec<Entry>> {
            match &self.0 {
                Ok(entries) => Ok(entries.clone()),
                Err(e) => Err(TrackerError::Fetch(e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        articles: Mutex<Vec<(String, ArticleProgress)>>,
        delivered: bool,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify_new_article(&self, entry: &Entry, progress: &ArticleProgress) -> DeliveryOutcome {
            self.articles
                .lock()
                .unwrap()
                .push((entry.url.clone(), *progress));
            if self.delivered {
                DeliveryOutcome::Delivered {
                    attempts: 1,
                    rate_limit_waits: 0,
                }
            } else {
                DeliveryOutcome::Failed {
                    attempts: 3,
                    rate_limit_waits: 0,
                    error: "down".to_string(),
                }
            }
        }

        async fn notify_alert(&self, _message: &str, _failures: u32) -> DeliveryOutcome {
            DeliveryOutcome::Delivered {
                attempts: 1,
                rate_limit_waits: 0,
            }
        }
    }

    fn settings() -> CycleSettings {
        CycleSettings {
            value_cents: 415,
            daily_target: 8,
            monthly_target: 240,
            tz: Tz::UTC,
            notification_gap: Duration::ZERO,
        }
    }

    fn entries(slugs: &[&str]) -> Vec<Entry> {
        slugs
            .iter()
            .map(|s| Entry::new(format!("https://x.example/{s}"), *s))
            .collect()
    }

    async fn cycle(feed: Result<Vec<Entry>>, delivered: bool) -> (PollCycle, Arc<Recorder>) {
        let db = Database::open_in_memory().await.unwrap();
        let ledger = ArticleLedger::new(db.pool().clone());
        let recorder = Arc::new(Recorder {
            delivered,
            ..Default::default()
        });
        let cycle = PollCycle::new(
            Arc::new(StaticFeed(feed)),
            ledger,
            recorder.clone(),
            settings(),
        );
        (cycle, recorder)
    }

    #[tokio::test]
    async fn test_new_entries_are_recorded_and_notified() {
        let (cycle, recorder) = cycle(Ok(entries(&["a", "b", "c"])), true).await;
        let cancel = CancellationToken::new();

        assert_eq!(cycle.run(&cancel).await.unwrap(), 3);
        let seen = recorder.articles.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, "https://x.example/a");
        assert_eq!(seen[0].1.counters.today_count, 1);
        assert_eq!(seen[2].1.counters.today_count, 3);
        assert_eq!(seen[2].1.counters.month_earned_cents, 3 * 415);
        assert_eq!(seen[2].1.streak, 1);

        // Second pass finds nothing new
        assert_eq!(cycle.run(&cancel).await.unwrap(), 0);
        assert_eq!(recorder.articles.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_entries_in_one_fetch() {
        let (cycle, recorder) = cycle(Ok(entries(&["a", "a"])), true).await;
        assert_eq!(cycle.run(&CancellationToken::new()).await.unwrap(), 1);
        assert_eq!(recorder.articles.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_error() {
        let (cycle, recorder) =
            cycle(Err(TrackerError::Fetch("HTTP error: 500".into())), true).await;
        let result = cycle.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(TrackerError::Fetch(_))));
        assert!(recorder.articles.lock().unwrap().is_empty());
        assert_eq!(cycle.ledger().total_count().await.unwrap(), 0);
        assert_eq!(*cycle.subscribe().borrow(), CyclePhase::Idle);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_fail_cycle() {
        let (cycle, _recorder) = cycle(Ok(entries(&["a", "b"])), false).await;
        assert_eq!(cycle.run(&CancellationToken::new()).await.unwrap(), 2);
        assert_eq!(cycle.ledger().total_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_records_nothing() {
        let (cycle, recorder) = cycle(Ok(entries(&["a", "b"])), true).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(cycle.run(&cancel).await.unwrap(), 0);
        assert!(recorder.articles.lock().unwrap().is_empty());
        assert_eq!(cycle.ledger().total_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_gap_stops_cleanly() {
        let (mut cycle, recorder) = cycle(Ok(entries(&["a", "b", "c"])), true).await;
        cycle.settings.notification_gap = Duration::from_secs(30);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        assert_eq!(cycle.run(&cancel).await.unwrap(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));

        // Every recorded entry was notified
        assert_eq!(recorder.articles.lock().unwrap().len(), 1);
        assert_eq!(cycle.ledger().total_count().await.unwrap(), 1);
    }
}
