//! Runs the dashboard queries against a transaction store and assembles the
//! summary.

use std::{fmt, sync::Arc};

use time::{Date, UtcOffset};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    Error,
    dashboard::{
        aggregation::{
            build_daily_series, fraud_stats, mode_breakdown, score_recent, trailing_window,
        },
        fraud::FraudPolicy,
        summary::{Summary, TransactionStats},
    },
    stores::TransactionStore,
};

/// The largest trailing window, in days, the dashboard accepts.
pub const MAX_WINDOW_DAYS: u32 = 365;
/// The largest number of recent transactions the dashboard accepts.
pub const MAX_RECENT_LIMIT: u32 = 100;

/// Controls the size of the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    /// How many days, ending today, the daily series covers.
    pub window_days: u32,
    /// How many of the most recent transactions to include.
    pub recent_limit: u32,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            window_days: 7,
            recent_limit: 10,
        }
    }
}

impl SummaryOptions {
    /// Check that the window and limit are in range.
    ///
    /// # Errors
    /// Returns [Error::InvalidSummaryOptions] if `window_days` is not in
    /// 1..=[MAX_WINDOW_DAYS] or `recent_limit` is greater than [MAX_RECENT_LIMIT].
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(Error::InvalidSummaryOptions(format!(
                "window days must be between 1 and {MAX_WINDOW_DAYS}, got {}",
                self.window_days
            )));
        }

        if self.recent_limit > MAX_RECENT_LIMIT {
            return Err(Error::InvalidSummaryOptions(format!(
                "recent limit must be at most {MAX_RECENT_LIMIT}, got {}",
                self.recent_limit
            )));
        }

        Ok(())
    }
}

/// Computes dashboard summaries from a [TransactionStore].
#[derive(Clone)]
pub struct TransactionAnalytics {
    store: Arc<dyn TransactionStore>,
    fraud_policy: Arc<dyn FraudPolicy>,
}

impl fmt::Debug for TransactionAnalytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionAnalytics")
            .field("fraud_policy", &self.fraud_policy)
            .finish_non_exhaustive()
    }
}

impl TransactionAnalytics {
    /// Create an aggregator that reads from `store` and flags transactions
    /// with `fraud_policy`.
    pub fn new(store: Arc<dyn TransactionStore>, fraud_policy: Arc<dyn FraudPolicy>) -> Self {
        Self {
            store,
            fraud_policy,
        }
    }

    /// Summarise the store for the dashboard.
    ///
    /// The store queries run concurrently on the blocking thread pool. A query
    /// that fails is logged and its part of the summary falls back to zeros or
    /// an empty list. `today` is the last day of the daily series, and days are
    /// bucketed with `offset`.
    ///
    /// # Errors
    /// - [Error::InvalidSummaryOptions] if `options` are out of range.
    /// - [Error::StoreUnavailable] if every query failed because the store
    ///   could not be reached.
    /// - [Error::DeadlineExceeded] if `deadline` passed before the queries
    ///   finished. Queries still waiting for the store are skipped, and a
    ///   running query is interrupted if the store supports it.
    pub async fn summarize(
        &self,
        options: SummaryOptions,
        today: Date,
        offset: UtcOffset,
        deadline: Option<Instant>,
    ) -> Result<Summary, Error> {
        options.validate()?;

        let window = trailing_window(today, options.window_days);
        let cancel = CancellationToken::new();
        let store = self.store.with_cancellation(cancel.clone());

        let queries = async {
            let recent_limit = options.recent_limit;
            let day_window = window.clone();

            tokio::join!(
                run_query(&store, "transaction count", &cancel, |store| store.count()),
                run_query(&store, "total volume", &cancel, |store| {
                    store.total_volume(None)
                }),
                run_query(&store, "volume by mode", &cancel, |store| {
                    store.group_by_mode()
                }),
                run_query(&store, "recent transactions", &cancel, move |store| {
                    store.find_recent(recent_limit)
                }),
                run_query(&store, "daily activity", &cancel, move |store| {
                    store.group_by_day(day_window, offset)
                }),
            )
        };

        let (total, volume, by_mode, recent, days) = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, queries).await {
                Ok(results) => results,
                Err(_) => {
                    cancel.cancel();
                    tracing::warn!("dashboard queries did not finish before the deadline");
                    return Err(Error::DeadlineExceeded);
                }
            },
            None => queries.await,
        };

        let errors = [
            total.as_ref().err(),
            volume.as_ref().err(),
            by_mode.as_ref().err(),
            recent.as_ref().err(),
            days.as_ref().err(),
        ];

        if errors
            .iter()
            .all(|error| error.is_some_and(Error::is_store_unavailable))
        {
            return Err(Error::StoreUnavailable(
                "every dashboard query failed".to_owned(),
            ));
        }

        let policy = self.fraud_policy.as_ref();
        let total = total.unwrap_or_default();
        let by_mode = mode_breakdown(&by_mode.unwrap_or_default(), policy);
        let fraud = fraud_stats(total, &by_mode);

        Ok(Summary {
            transactions: TransactionStats {
                total,
                volume: volume.unwrap_or_default(),
                by_mode,
                recent: score_recent(recent.unwrap_or_default(), policy),
                chart_data: build_daily_series(&window, &days.unwrap_or_default(), policy),
            },
            fraud,
        })
    }
}

/// Run `query` against `store` on the blocking thread pool unless `cancel`
/// has fired.
async fn run_query<T, F>(
    store: &Arc<dyn TransactionStore>,
    name: &'static str,
    cancel: &CancellationToken,
    query: F,
) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnOnce(&dyn TransactionStore) -> Result<T, Error> + Send + 'static,
{
    let store = store.clone();
    let cancel = cancel.clone();

    tokio::task::spawn_blocking(move || {
        if cancel.is_cancelled() {
            return Err(Error::QueryCancelled);
        }

        query(store.as_ref())
    })
    .await
    .map_err(|error| Error::QueryTaskFailed(error.to_string()))
    .and_then(|result| result)
    .inspect_err(|error| tracing::error!("could not get {name} for the dashboard: {error}"))
}
