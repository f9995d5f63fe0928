//! Defines the transaction store trait.

use std::{ops::RangeInclusive, sync::Arc};

use time::{Date, UtcOffset};
use tokio_util::sync::CancellationToken;

use crate::{
    Error,
    transaction::{Transaction, TransactionMode},
};

/// The number and summed amount of transactions sent with one payment mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeAggregate {
    /// The payment mode.
    pub mode: TransactionMode,
    /// How many transactions used the mode.
    pub count: u64,
    /// The summed amount of those transactions.
    pub volume: f64,
}

/// The number and summed amount of transactions on one local day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayAggregate {
    /// The local day.
    pub date: Date,
    /// How many transactions happened on the day.
    pub count: u64,
    /// The summed amount of those transactions.
    pub volume: f64,
}

/// Read-only queries over the transaction ledger.
///
/// Implementations normalize their raw data before returning it: missing sums
/// are zero, missing modes are [TransactionMode::Other], and each mode or
/// day appears at most once.
///
/// Implementations should return [Error::StoreUnavailable] when the backing
/// store cannot be reached, so that callers can tell an unreachable store
/// apart from an empty one.
pub trait TransactionStore: Send + Sync {
    /// The total number of transactions.
    fn count(&self) -> Result<u64, Error>;

    /// The summed amount of all transactions, or only those sent with `mode`.
    fn total_volume(&self, mode: Option<TransactionMode>) -> Result<f64, Error>;

    /// The count and volume for each mode that has at least one transaction,
    /// ordered by mode.
    fn group_by_mode(&self) -> Result<Vec<ModeAggregate>, Error>;

    /// Up to `limit` transactions, newest first.
    fn find_recent(&self, limit: u32) -> Result<Vec<Transaction>, Error>;

    /// The count and volume for each day in `window` that has at least one
    /// transaction, ordered by date.
    ///
    /// Every day in the window is bucketed with the same `offset`. If the
    /// local timezone changed its offset inside the window (daylight saving),
    /// transactions within that change of midnight land on the neighbouring
    /// day.
    fn group_by_day(
        &self,
        window: RangeInclusive<Date>,
        offset: UtcOffset,
    ) -> Result<Vec<DayAggregate>, Error>;

    /// A handle to the same data whose queries give up once `cancel` fires.
    ///
    /// A query still waiting for the store when `cancel` fires returns
    /// [Error::QueryCancelled] without running. A query already running is
    /// stopped if the store can interrupt it.
    fn with_cancellation(&self, cancel: CancellationToken) -> Arc<dyn TransactionStore>;
}
