//! Article ledger.
//!
//! The ledger is the only durable authority in the tracker. It owns the
//! article records, the per-day aggregates and the streak singleton, and
//! answers "have we seen this URL before". Recording is insert-or-ignore on
//! the URL plus an aggregate upsert in one transaction, so repeated or
//! concurrent detection of the same article never double-counts.

mod types;

pub use types::{ArticleRecord, Counters, DailyAggregate, Detection, NewArticle, StreakState};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::datetime::{first_of_month, first_of_next_month, format_date, local_date, parse_date};
use crate::db::{DbConnection, DbPool, DbTransaction};
use crate::streak::advance_state;
use crate::Result;

/// Row type for articles.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    url: String,
    title: String,
    published_at: Option<String>,
    detected_at: String,
    earning_cents: i64,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        ArticleRecord {
            id: row.id,
            url: row.url,
            title: row.title,
            published_at: row.published_at.and_then(|s| parse_datetime(&s)),
            detected_at: parse_datetime(&row.detected_at).unwrap_or_else(Utc::now),
            earning_cents: row.earning_cents,
        }
    }
}

/// Row type for per-day aggregates.
#[derive(Debug, Clone, sqlx::FromRow)]
struct DailyRow {
    date: String,
    article_count: i64,
    earned_cents: i64,
}

/// Durable record of seen articles and their aggregates.
#[derive(Clone)]
pub struct ArticleLedger {
    pool: DbPool,
}

impl ArticleLedger {
    /// Create a ledger over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Check whether an article URL has already been recorded.
    pub async fn exists(&self, url: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM articles WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Record a newly detected article and credit the day it was detected on.
    ///
    /// Returns `false` without touching any aggregate when the URL is already
    /// recorded.
    pub async fn record(&self, article: &NewArticle, tz: Tz, now: DateTime<Utc>) -> Result<bool> {
        let mut tx: DbTransaction = self.pool.begin().await?;

        if !insert_article(&mut tx, article, local_date(tz, now), now).await? {
            tx.rollback().await?;
            debug!("Article already recorded: {}", article.url);
            return Ok(false);
        }

        tx.commit().await?;
        info!("Article recorded: {}", article.title);
        Ok(true)
    }

    /// Record a newly detected article, advance the streak and read the
    /// refreshed aggregates, all in one transaction.
    ///
    /// Returns `None` when the URL is already recorded. On error nothing is
    /// committed, so the article is still new to the next cycle.
    pub async fn record_detection(
        &self,
        article: &NewArticle,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<Option<Detection>> {
        let today = local_date(tz, now);
        let mut tx: DbTransaction = self.pool.begin().await?;

        if !insert_article(&mut tx, article, today, now).await? {
            tx.rollback().await?;
            debug!("Article already recorded: {}", article.url);
            return Ok(None);
        }

        let previous = read_streak(&mut tx).await?;
        let streak = advance_state(previous, today);
        write_streak(&mut tx, streak.length, streak.last_date.unwrap_or(today)).await?;
        let counters = read_counters(&mut tx, today).await?;

        tx.commit().await?;
        info!("Article recorded: {}", article.title);
        debug!("Streak {} -> {}", previous.length, streak.length);
        Ok(Some(Detection {
            streak: streak.length,
            counters,
        }))
    }

    /// Articles detected today.
    pub async fn today_count(&self, tz: Tz, now: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(day_totals(&mut conn, local_date(tz, now)).await?.0)
    }

    /// Cents earned today.
    pub async fn today_earned(&self, tz: Tz, now: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(day_totals(&mut conn, local_date(tz, now)).await?.1)
    }

    /// Articles detected this calendar month.
    pub async fn month_count(&self, tz: Tz, now: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(month_totals(&mut conn, local_date(tz, now)).await?.0)
    }

    /// Cents earned this calendar month.
    pub async fn month_earned(&self, tz: Tz, now: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(month_totals(&mut conn, local_date(tz, now)).await?.1)
    }

    /// All-time article count.
    pub async fn total_count(&self) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(all_time_totals(&mut conn).await?.0)
    }

    /// All-time earnings in cents.
    pub async fn total_earned(&self) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(all_time_totals(&mut conn).await?.1)
    }

    /// Every aggregate at once.
    pub async fn counters(&self, tz: Tz, now: DateTime<Utc>) -> Result<Counters> {
        let mut conn = self.pool.acquire().await?;
        read_counters(&mut conn, local_date(tz, now)).await
    }

    /// Read the streak singleton.
    pub async fn get_streak(&self) -> Result<StreakState> {
        let mut conn = self.pool.acquire().await?;
        read_streak(&mut conn).await
    }

    /// Overwrite the streak singleton.
    pub async fn set_streak(&self, length: u32, date: NaiveDate) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_streak(&mut conn, length, date).await
    }

    /// Most recently detected articles, newest first.
    pub async fn recent_articles(&self, limit: i64) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, url, title, published_at, detected_at, earning_cents
            FROM articles
            ORDER BY detected_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleRecord::from).collect())
    }

    /// Per-day aggregates from `since` onwards, oldest first.
    pub async fn daily_history(&self, since: NaiveDate) -> Result<Vec<DailyAggregate>> {
        let rows = sqlx::query_as::<_, DailyRow>(
            r#"
            SELECT date, article_count, earned_cents
            FROM daily_stats
            WHERE date >= $1
            ORDER BY date ASC
            "#,
        )
        .bind(format_date(since))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                parse_date(&row.date).map(|date| DailyAggregate {
                    date,
                    article_count: row.article_count,
                    earned_cents: row.earned_cents,
                })
            })
            .collect())
    }
}

impl std::fmt::Debug for ArticleLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleLedger").finish()
    }
}

/// Insert an article and credit its day. Returns `false` if the URL exists.
async fn insert_article(
    conn: &mut DbConnection,
    article: &NewArticle,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<bool> {
    let date = format_date(date);
    let published_at = article.published_at.map(|dt| dt.to_rfc3339());

    let inserted = sqlx::query(
        r#"
        INSERT INTO articles (url, title, published_at, detected_at, detected_date, earning_cents)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (url) DO NOTHING
        "#,
    )
    .bind(&article.url)
    .bind(&article.title)
    .bind(&published_at)
    .bind(now.to_rfc3339())
    .bind(&date)
    .bind(article.earning_cents)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        > 0;

    if !inserted {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO daily_stats (date, article_count, earned_cents)
        VALUES ($1, 1, $2)
        ON CONFLICT (date) DO UPDATE
        SET article_count = daily_stats.article_count + 1,
            earned_cents = daily_stats.earned_cents + excluded.earned_cents
        "#,
    )
    .bind(&date)
    .bind(article.earning_cents)
    .execute(&mut *conn)
    .await?;

    Ok(true)
}

async fn read_streak(conn: &mut DbConnection) -> Result<StreakState> {
    let row: Option<(i64, Option<String>)> =
        sqlx::query_as("SELECT current_streak, last_publish_date FROM streak_info WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await?;

    Ok(match row {
        Some((length, last)) => StreakState {
            length: u32::try_from(length).unwrap_or(0),
            last_date: last.as_deref().and_then(parse_date),
        },
        None => StreakState::default(),
    })
}

async fn write_streak(conn: &mut DbConnection, length: u32, date: NaiveDate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO streak_info (id, current_streak, last_publish_date)
        VALUES (1, $1, $2)
        ON CONFLICT (id) DO UPDATE
        SET current_streak = excluded.current_streak,
            last_publish_date = excluded.last_publish_date
        "#,
    )
    .bind(i64::from(length))
    .bind(format_date(date))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn read_counters(conn: &mut DbConnection, today: NaiveDate) -> Result<Counters> {
    let (today_count, today_earned_cents) = day_totals(conn, today).await?;
    let (month_count, month_earned_cents) = month_totals(conn, today).await?;
    let (total_count, total_earned_cents) = all_time_totals(conn).await?;
    Ok(Counters {
        today_count,
        today_earned_cents,
        month_count,
        month_earned_cents,
        total_count,
        total_earned_cents,
    })
}

async fn day_totals(conn: &mut DbConnection, date: NaiveDate) -> Result<(i64, i64)> {
    let row: Option<(i64, i64)> =
        sqlx::query_as("SELECT article_count, earned_cents FROM daily_stats WHERE date = $1")
            .bind(format_date(date))
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.unwrap_or((0, 0)))
}

async fn month_totals(conn: &mut DbConnection, today: NaiveDate) -> Result<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        r#"
        SELECT CAST(COALESCE(SUM(article_count), 0) AS BIGINT),
               CAST(COALESCE(SUM(earned_cents), 0) AS BIGINT)
        FROM daily_stats
        WHERE date >= $1 AND date < $2
        "#,
    )
    .bind(format_date(first_of_month(today)))
    .bind(format_date(first_of_next_month(today)))
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

async fn all_time_totals(conn: &mut DbConnection) -> Result<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT CAST(COUNT(*) AS BIGINT), CAST(COALESCE(SUM(earning_cents), 0) AS BIGINT) FROM articles",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

/// Parse an RFC 3339 timestamp from the store.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
