//! Review eligibility: distinct customers on the review platform today.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::ReviewConfig;
use crate::loader::ReviewRow;

/// Count distinct customer tails redeeming on the review platform on the
/// target day. Empty tails are not customers.
pub fn count_distinct_reviewers(
    rows: &[ReviewRow],
    cfg: &ReviewConfig,
    target_date: NaiveDate,
) -> usize {
    let mut tails: BTreeSet<&str> = BTreeSet::new();
    for row in rows {
        if row.redeemed_at != Some(target_date) || row.platform != cfg.platform {
            continue;
        }
        let tail = row.customer_tail.trim();
        if !tail.is_empty() {
            tails.insert(tail);
        }
    }
    tails.len()
}

/// How many reviews the day's redemptions earn, rounded to nearest.
pub fn reviewable(count: usize, cfg: &ReviewConfig) -> u32 {
    if cfg.divisor == 0 {
        return 0;
    }
    (count as f64 / cfg.divisor as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 5).unwrap()
    }

    fn row(date: Option<NaiveDate>, platform: &str, tail: &str) -> ReviewRow {
        ReviewRow {
            redeemed_at: date,
            platform: platform.to_string(),
            customer_tail: tail.to_string(),
        }
    }

    #[test]
    fn counts_distinct_tails_on_platform_and_day() {
        let cfg = ReviewConfig::default();
        let rows = vec![
            row(Some(day()), "review-site", "1234"),
            row(Some(day()), "review-site", "1234"),
            row(Some(day()), "review-site", "5678"),
            row(Some(day()), "other-site", "9999"),
            row(None, "review-site", "0000"),
            row(Some(day()), "review-site", "  "),
        ];
        assert_eq!(count_distinct_reviewers(&rows, &cfg, day()), 2);
    }

    #[test]
    fn reviewable_rounds_to_nearest() {
        let cfg = ReviewConfig::default();
        assert_eq!(reviewable(0, &cfg), 0);
        assert_eq!(reviewable(1, &cfg), 0);
        assert_eq!(reviewable(2, &cfg), 1);
        assert_eq!(reviewable(4, &cfg), 1);
        assert_eq!(reviewable(5, &cfg), 2);
        assert_eq!(reviewable(9, &cfg), 3);
    }
}
