//! The JSON shape of the dashboard summary.

use serde::Serialize;
use time::Date;

use crate::{
    dashboard::fraud::FraudScore,
    transaction::{Transaction, TransactionMode},
};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Everything the dashboard shows, computed from the transaction store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Transaction totals and breakdowns.
    pub transactions: TransactionStats,
    /// Fraud totals.
    pub fraud: FraudStats,
}

/// Transaction totals and breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    /// The number of transactions in the store.
    pub total: u64,
    /// The sum of all transaction amounts.
    pub volume: f64,
    /// Per payment mode totals, ordered by mode.
    pub by_mode: Vec<ModeBreakdown>,
    /// The most recent transactions, newest first.
    pub recent: Vec<ScoredTransaction>,
    /// One entry per day of the trailing window, oldest first.
    pub chart_data: Vec<DailyBucket>,
}

/// The totals for one payment mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeBreakdown {
    /// The payment mode.
    pub mode: TransactionMode,
    /// How many transactions used the mode.
    pub count: u64,
    /// The summed amount of those transactions.
    pub sum: f64,
    /// How many of those transactions are flagged as fraudulent.
    pub fraud_count: u64,
}

/// A recent transaction with its fraud score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTransaction {
    /// The transaction.
    #[serde(flatten)]
    pub transaction: Transaction,
    /// The risk score of the transaction.
    pub fraud_score: FraudScore,
}

/// The activity on one local day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    /// The local date.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// The number of transactions on the day.
    pub count: u64,
    /// The summed amount of those transactions.
    pub volume: f64,
    /// How many of those transactions are flagged as fraudulent.
    pub fraud_count: u64,
}

/// Fraud totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudStats {
    /// The number of flagged transactions across all modes.
    pub total: u64,
    /// The flagged transactions as a percentage of all transactions.
    pub percentage: f64,
    /// Flagged transactions per payment mode.
    pub by_mode: Vec<ModeFraud>,
}

/// The flagged transaction count of one payment mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeFraud {
    /// The payment mode.
    pub mode: TransactionMode,
    /// How many transactions of the mode are flagged.
    pub count: u64,
}
