//! Publishing streak.
//!
//! The streak counts consecutive calendar days, in the tracker's timezone,
//! with at least one new detection. State lives in the ledger and is read
//! fresh on every advance.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::local_date;
use crate::ledger::{ArticleLedger, StreakState};
use crate::Result;

/// Compute the next streak length.
///
/// | last date | gap  | result              |
/// |-----------|------|---------------------|
/// | none      | -    | 1                   |
/// | present   | <= 0 | max(current, 1)     |
/// | present   | 1    | current + 1         |
/// | present   | > 1  | 1                   |
pub fn next_streak(current: u32, last_date: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(last) = last_date else {
        return 1;
    };

    match (today - last).num_days() {
        gap if gap <= 0 => current.max(1),
        1 => current.saturating_add(1),
        _ => 1,
    }
}

/// Apply a detection on `today` to a stored streak.
///
/// The stored date never moves backwards.
pub fn advance_state(state: StreakState, today: NaiveDate) -> StreakState {
    StreakState {
        length: next_streak(state.length, state.last_date, today),
        last_date: Some(state.last_date.map_or(today, |last| last.max(today))),
    }
}

/// Advances the streak stored in the ledger.
pub struct StreakEngine<'a> {
    ledger: &'a ArticleLedger,
}

impl<'a> StreakEngine<'a> {
    /// Create a streak engine over the given ledger.
    pub fn new(ledger: &'a ArticleLedger) -> Self {
        Self { ledger }
    }

    /// Advance the streak for a detection at `now` and persist it.
    ///
    /// Returns the new streak length. The stored date never moves backwards.
    pub async fn advance(&self, tz: Tz, now: DateTime<Utc>) -> Result<u32> {
        let today = local_date(tz, now);
        let state = self.ledger.get_streak().await?;
        let next = advance_state(state, today);
        let date = next.last_date.unwrap_or(today);

        self.ledger.set_streak(next.length, date).await?;
        debug!("Streak {} -> {} ({})", state.length, next.length, date);
        Ok(next.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_streak_yesterday_increments() {
        let today = day(2024, 5, 10);
        assert_eq!(next_streak(5, Some(today - Duration::days(1)), today), 6);
    }

    #[test]
    fn test_next_streak_same_day_holds() {
        let today = day(2024, 5, 10);
        assert_eq!(next_streak(3, Some(today), today), 3);
    }

    #[test]
    fn test_next_streak_same_day_from_zero() {
        let today = day(2024, 5, 10);
        assert_eq!(next_streak(0, Some(today), today), 1);
    }

    #[test]
    fn test_next_streak_gap_resets() {
        let today = day(2024, 5, 10);
        assert_eq!(next_streak(7, Some(today - Duration::days(10)), today), 1);
        assert_eq!(next_streak(7, Some(today - Duration::days(2)), today), 1);
    }

    #[test]
    fn test_next_streak_first_detection() {
        assert_eq!(next_streak(0, None, day(2024, 5, 10)), 1);
        assert_eq!(next_streak(9, None, day(2024, 5, 10)), 1);
    }

    #[test]
    fn test_next_streak_future_date_holds() {
        let today = day(2024, 5, 10);
        assert_eq!(next_streak(4, Some(day(2024, 5, 11)), today), 4);
    }

    #[test]
    fn test_next_streak_across_month_boundary() {
        assert_eq!(next_streak(2, Some(day(2024, 2, 29)), day(2024, 3, 1)), 3);
    }

    #[test]
    fn test_advance_state_keeps_latest_date() {
        let today = day(2024, 5, 10);
        let first = advance_state(StreakState::default(), today);
        assert_eq!(first, StreakState { length: 1, last_date: Some(today) });

        let ahead = StreakState { length: 4, last_date: Some(day(2024, 5, 11)) };
        assert_eq!(advance_state(ahead, today), ahead);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_advance_persists() {
        let db = crate::db::Database::open_in_memory().await.unwrap();
        let ledger = ArticleLedger::new(db.pool().clone());
        let engine = StreakEngine::new(&ledger);

        let monday = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        assert_eq!(engine.advance(Tz::UTC, monday).await.unwrap(), 1);
        assert_eq!(engine.advance(Tz::UTC, monday).await.unwrap(), 1);

        let tuesday = monday + Duration::days(1);
        assert_eq!(engine.advance(Tz::UTC, tuesday).await.unwrap(), 2);

        let state = ledger.get_streak().await.unwrap();
        assert_eq!(state.length, 2);
        assert_eq!(state.last_date, Some(day(2024, 5, 7)));

        let friday = tuesday + Duration::days(3);
        assert_eq!(engine.advance(Tz::UTC, friday).await.unwrap(), 1);
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_advance_does_not_move_date_backwards() {
        let db = crate::db::Database::open_in_memory().await.unwrap();
        let ledger = ArticleLedger::new(db.pool().clone());
        ledger.set_streak(3, day(2024, 5, 11)).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let length = StreakEngine::new(&ledger).advance(Tz::UTC, now).await.unwrap();
        assert_eq!(length, 3);
        assert_eq!(
            ledger.get_streak().await.unwrap().last_date,
            Some(day(2024, 5, 11))
        );
    }
}
