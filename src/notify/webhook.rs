//! Webhook dispatcher with retry and rate-limit handling.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::message::{render_alert, render_article, render_startup, sample_article, WebhookPayload};
use super::{ArticleProgress, DeliveryOutcome, Notifier};
use crate::config::WebhookConfig;
use crate::feed::Entry;
use crate::{Result, TrackerError};

/// Rate-limit delay used when the server gives none.
const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on a single rate-limit wait.
const MAX_RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);

/// Rate-limit waits allowed per delivery.
const MAX_RATE_LIMIT_WAITS: u32 = 5;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60);

/// Body of a 429 response.
#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

/// Retry and backoff settings for one delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before giving up. Rate-limit waits do not count.
    pub max_attempts: u32,
    /// Backoff base; the delay after failed attempt n is `base^n` units.
    pub backoff_base: u32,
    /// Backoff unit.
    pub backoff_unit: Duration,
    /// Rate-limit waits allowed before a 429 counts as a failed attempt.
    pub max_rate_limit_waits: u32,
    /// Upper bound on a single rate-limit wait.
    pub max_rate_limit_delay: Duration,
    /// Upper bound on a single backoff sleep.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2,
            backoff_unit: Duration::from_secs(1),
            max_rate_limit_waits: MAX_RATE_LIMIT_WAITS,
            max_rate_limit_delay: MAX_RATE_LIMIT_DELAY,
            max_backoff: MAX_BACKOFF_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from webhook configuration.
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base,
            ..Default::default()
        }
    }

    /// Delay after failed attempt `attempt` (1-based), capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(self.backoff_base.saturating_pow(attempt))
            .min(self.max_backoff)
    }
}

/// Posts rendered messages to the configured webhook.
pub struct WebhookDispatcher {
    client: Client,
    url: String,
    mention_user_id: Option<String>,
    dashboard_url: Option<String>,
    policy: RetryPolicy,
}

impl WebhookDispatcher {
    /// Create a dispatcher from webhook configuration.
    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TrackerError::Delivery(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            mention_user_id: Some(config.mention_user_id.clone()).filter(|s| !s.is_empty()),
            dashboard_url: Some(config.dashboard_url.clone()).filter(|s| !s.is_empty()),
            policy: RetryPolicy::from_config(config),
        })
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver a payload, retrying per the policy.
    pub async fn deliver(&self, payload: &WebhookPayload) -> DeliveryOutcome {
        let mut attempts = 0;
        let mut rate_limit_waits = 0;
        let mut last_error = String::new();

        while attempts < self.policy.max_attempts {
            let result = self.client.post(&self.url).json(payload).send().await;

            match result {
                Ok(rsp) if rsp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if rate_limit_waits < self.policy.max_rate_limit_waits {
                        let delay = self.rate_limit_delay(rsp).await;
                        rate_limit_waits += 1;
                        warn!("Rate limited. Retrying after {:.1}s", delay.as_secs_f64());
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    attempts += 1;
                    last_error = "rate limited".to_string();
                }
                Ok(rsp) => {
                    attempts += 1;
                    match rsp.error_for_status_ref() {
                        Ok(_) => {
                            info!("Webhook delivered (attempt {})", attempts);
                            return DeliveryOutcome::Delivered {
                                attempts,
                                rate_limit_waits,
                            };
                        }
                        Err(e) => last_error = format!("HTTP error: {}", e),
                    }
                }
                Err(e) => {
                    attempts += 1;
                    last_error = format!("request failed: {}", e);
                }
            }

            warn!(
                "Webhook attempt {}/{} failed: {}",
                attempts, self.policy.max_attempts, last_error
            );
            if attempts < self.policy.max_attempts {
                let delay = self.policy.backoff(attempts);
                debug!("Retrying webhook in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            "Webhook delivery failed after {} attempts: {}",
            attempts, last_error
        );
        DeliveryOutcome::Failed {
            attempts,
            rate_limit_waits,
            error: last_error,
        }
    }

    /// Server-requested delay from a 429 response.
    ///
    /// Prefers `retry_after` in the JSON body, then the `Retry-After` header,
    /// then a default; capped by the policy.
    async fn rate_limit_delay(&self, rsp: Response) -> Duration {
        let header = rsp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok());
        let body = rsp
            .json::<RateLimitBody>()
            .await
            .ok()
            .and_then(|b| b.retry_after);

        let max = self.policy.max_rate_limit_delay;
        body.or(header)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Duration::from_secs_f64(secs.min(max.as_secs_f64())))
            .unwrap_or(DEFAULT_RATE_LIMIT_DELAY)
            .min(max)
    }

    /// Announce that the tracker has started.
    pub async fn notify_startup(&self, summary: &str) -> DeliveryOutcome {
        let payload = WebhookPayload::text(render_startup(summary, self.mention_user_id.as_deref()))
            .with_dashboard(self.dashboard_url.as_deref());
        self.deliver(&payload).await
    }

    /// Send a sample article notification to verify the webhook.
    pub async fn notify_test(
        &self,
        value_cents: i64,
        daily_target: i64,
        monthly_target: i64,
    ) -> DeliveryOutcome {
        let (entry, progress) = sample_article(value_cents, daily_target, monthly_target);
        self.notify_new_article(&entry, &progress).await
    }
}

#[async_trait]
impl Notifier for WebhookDispatcher {
    async fn notify_new_article(
        &self,
        entry: &Entry,
        progress: &ArticleProgress,
    ) -> DeliveryOutcome {
        let payload = WebhookPayload::text(render_article(
            entry,
            progress,
            self.mention_user_id.as_deref(),
        ))
        .with_dashboard(self.dashboard_url.as_deref());
        self.deliver(&payload).await
    }

    async fn notify_alert(&self, message: &str, failures: u32) -> DeliveryOutcome {
        let payload =
            WebhookPayload::text(render_alert(message, failures, self.mention_user_id.as_deref()));
        self.deliver(&payload).await
    }
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("policy", &self.policy)
            .finish()
    }
}
