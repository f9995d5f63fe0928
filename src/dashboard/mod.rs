//! Dashboard module
//!
//! Summarises the transaction ledger: totals, volume per payment mode, the
//! most recent transactions, a daily activity series and fraud indicators.

mod aggregation;
mod aggregator;
mod fraud;
mod handlers;
mod summary;

pub use aggregator::{MAX_RECENT_LIMIT, MAX_WINDOW_DAYS, SummaryOptions, TransactionAnalytics};
pub use fraud::{Cohort, FraudPolicy, FraudScore, HashedFraudPolicy};
pub use handlers::get_dashboard;
pub use summary::{
    DailyBucket, FraudStats, ModeBreakdown, ModeFraud, ScoredTransaction, Summary,
    TransactionStats,
};
