//! Progress bar rendering and money formatting.

/// Glyph for a filled progress cell.
pub const FILLED: char = '█';

/// Glyph for an empty progress cell.
pub const EMPTY: char = '░';

/// Default progress bar width in cells.
pub const DEFAULT_BAR_WIDTH: usize = 10;

/// Render a fixed-width progress bar with a percentage label.
///
/// The filled cell count is `round(min(current / target, 1) * width)` and
/// the label is the floored percentage. A target of zero or less renders
/// fully empty at 0%.
///
/// `render_progress_bar(5, 8, 10)` gives `██████░░░░ 62%`.
pub fn render_progress_bar(current: i64, target: i64, width: usize) -> String {
    if target <= 0 {
        return format!("{} 0%", EMPTY.to_string().repeat(width));
    }

    let ratio = (current.max(0) as f64 / target as f64).min(1.0);
    let filled = ((ratio * width as f64).round() as usize).min(width);
    let percentage = progress_percent(current, target);

    let mut bar = String::with_capacity(width * 3 + 5);
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(width - filled));
    bar.push_str(&format!(" {}%", percentage));
    bar
}

/// Floored percentage of `target` reached, capped at 100.
pub fn progress_percent(current: i64, target: i64) -> u32 {
    if target <= 0 {
        return 0;
    }
    let ratio = (current.max(0) as f64 / target as f64).min(1.0);
    (ratio * 100.0).floor() as u32
}

/// Format cents as dollars with thousands separators: `$1,234.50`.
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Format a per-article increment: `+ $4.15`.
pub fn format_increment(cents: i64) -> String {
    format!("+ {}", format_usd(cents))
}

/// Articles still needed to reach the daily goal.
pub fn daily_remaining(current: i64, target: i64) -> i64 {
    (target - current).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(s: &str, c: char) -> usize {
        s.chars().filter(|&x| x == c).count()
    }

    #[test]
    fn test_progress_bar_partial() {
        let bar = render_progress_bar(5, 8, 10);
        assert_eq!(bar, "██████░░░░ 62%");
        assert_eq!(count(&bar, FILLED), 6);
        assert_eq!(count(&bar, EMPTY), 4);
    }

    #[test]
    fn test_progress_bar_full() {
        assert_eq!(render_progress_bar(8, 8, 10), "██████████ 100%");
    }

    #[test]
    fn test_progress_bar_over_target_clamps() {
        assert_eq!(render_progress_bar(12, 8, 10), "██████████ 100%");
    }

    #[test]
    fn test_progress_bar_zero_target() {
        assert_eq!(render_progress_bar(3, 0, 10), "░░░░░░░░░░ 0%");
        assert_eq!(render_progress_bar(3, -1, 10), "░░░░░░░░░░ 0%");
    }

    #[test]
    fn test_progress_bar_rounds_cells() {
        // 42/240 = 17.5% -> 1.75 cells -> 2
        let bar = render_progress_bar(42, 240, 10);
        assert_eq!(count(&bar, FILLED), 2);
        assert!(bar.ends_with(" 17%"));
    }

    #[test]
    fn test_progress_bar_empty() {
        assert_eq!(render_progress_bar(0, 8, 10), "░░░░░░░░░░ 0%");
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(5, 8), 62);
        assert_eq!(progress_percent(9, 8), 100);
        assert_eq!(progress_percent(1, 0), 0);
        assert_eq!(progress_percent(-2, 8), 0);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(0), "$0.00");
        assert_eq!(format_usd(415), "$4.15");
        assert_eq!(format_usd(3750), "$37.50");
        assert_eq!(format_usd(123_456_789), "$1,234,567.89");
        assert_eq!(format_usd(100_000), "$1,000.00");
        assert_eq!(format_usd(-250), "-$2.50");
    }

    #[test]
    fn test_format_increment() {
        assert_eq!(format_increment(415), "+ $4.15");
    }

    #[test]
    fn test_daily_remaining() {
        assert_eq!(daily_remaining(3, 8), 5);
        assert_eq!(daily_remaining(8, 8), 0);
        assert_eq!(daily_remaining(10, 8), 0);
    }
}
