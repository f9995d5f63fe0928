//! Shapes store aggregates into the dashboard summary.
//!
//! These functions are pure so that the summary can be tested without a store.

use std::{collections::HashMap, ops::RangeInclusive};

use time::{Date, Duration};

use crate::{
    dashboard::{
        fraud::{Cohort, FraudPolicy},
        summary::{DailyBucket, FraudStats, ModeBreakdown, ModeFraud, ScoredTransaction},
    },
    stores::{DayAggregate, ModeAggregate},
    transaction::Transaction,
};

/// The `window_days` days ending on `today`, inclusive.
///
/// `window_days` must be at least one.
pub(super) fn trailing_window(today: Date, window_days: u32) -> RangeInclusive<Date> {
    let start = today.saturating_sub(Duration::days(i64::from(window_days) - 1));
    start..=today
}

/// Builds one bucket per day of `window`, oldest first.
///
/// Days without an aggregate get a zeroed bucket, so the series has no gaps.
pub(super) fn build_daily_series(
    window: &RangeInclusive<Date>,
    days: &[DayAggregate],
    policy: &dyn FraudPolicy,
) -> Vec<DailyBucket> {
    let by_date: HashMap<Date, &DayAggregate> =
        days.iter().map(|aggregate| (aggregate.date, aggregate)).collect();

    let mut series = Vec::new();
    let mut date = *window.start();

    while date <= *window.end() {
        let (count, volume) = by_date
            .get(&date)
            .map_or((0, 0.0), |aggregate| (aggregate.count, aggregate.volume));

        series.push(DailyBucket {
            date,
            count,
            volume,
            fraud_count: policy
                .flagged_in_cohort(Cohort::Day(date), count)
                .min(count),
        });

        date = match date.next_day() {
            Some(next) => next,
            None => break,
        };
    }

    series
}

/// Attaches a fraud count to each payment mode's totals.
pub(super) fn mode_breakdown(
    aggregates: &[ModeAggregate],
    policy: &dyn FraudPolicy,
) -> Vec<ModeBreakdown> {
    aggregates
        .iter()
        .map(|aggregate| ModeBreakdown {
            mode: aggregate.mode,
            count: aggregate.count,
            sum: aggregate.volume,
            fraud_count: policy
                .flagged_in_cohort(Cohort::Mode(aggregate.mode), aggregate.count)
                .min(aggregate.count),
        })
        .collect()
}

/// Attaches a fraud score to each transaction, keeping their order.
pub(super) fn score_recent(
    transactions: Vec<Transaction>,
    policy: &dyn FraudPolicy,
) -> Vec<ScoredTransaction> {
    transactions
        .into_iter()
        .map(|transaction| ScoredTransaction {
            fraud_score: policy.score(&transaction),
            transaction,
        })
        .collect()
}

/// Totals the per-mode fraud counts.
///
/// The percentage is relative to `total_transactions` and is zero when there
/// are no transactions or no flagged transactions.
pub(super) fn fraud_stats(total_transactions: u64, by_mode: &[ModeBreakdown]) -> FraudStats {
    let total: u64 = by_mode.iter().map(|breakdown| breakdown.fraud_count).sum();

    let percentage = if total == 0 || total_transactions == 0 {
        0.0
    } else {
        total as f64 / total_transactions as f64 * 100.0
    };

    FraudStats {
        total,
        percentage,
        by_mode: by_mode
            .iter()
            .map(|breakdown| ModeFraud {
                mode: breakdown.mode,
                count: breakdown.fraud_count,
            })
            .collect(),
    }
}
