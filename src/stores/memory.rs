//! An in-memory transaction store for tests, with per-query failure injection.

use std::{
    collections::BTreeMap,
    ops::RangeInclusive,
    sync::Arc,
    thread,
    time::Duration,
};

use time::{Date, UtcOffset};
use tokio_util::sync::CancellationToken;

use crate::{
    Error,
    stores::{DayAggregate, ModeAggregate, TransactionStore},
    transaction::{Transaction, TransactionMode},
};

/// Identifies one of the [TransactionStore] queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Query {
    Count,
    TotalVolume,
    GroupByMode,
    FindRecent,
    GroupByDay,
}

impl Query {
    const ALL: [Query; 5] = [
        Query::Count,
        Query::TotalVolume,
        Query::GroupByMode,
        Query::FindRecent,
        Query::GroupByDay,
    ];
}

#[derive(Debug, Default, Clone)]
pub(crate) struct MemoryTransactionStore {
    transactions: Vec<Transaction>,
    failing: Vec<Query>,
    unreachable: Vec<Query>,
    delay: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl MemoryTransactionStore {
    pub(crate) fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            ..Default::default()
        }
    }

    /// Make `query` fail with a SQL error while the other queries succeed.
    pub(crate) fn fail(mut self, query: Query) -> Self {
        self.failing.push(query);
        self
    }

    /// Make every query fail as if the store cannot be reached.
    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = Query::ALL.to_vec();
        self
    }

    /// Make `query` fail as if the store cannot be reached while the other
    /// queries succeed.
    pub(crate) fn unreachable_for(mut self, query: Query) -> Self {
        self.unreachable.push(query);
        self
    }

    /// Make every query block the calling thread for `delay`, as if waiting
    /// for the connection.
    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn check(&self, query: Query) -> Result<(), Error> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        if self
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(Error::QueryCancelled);
        }

        if self.unreachable.contains(&query) {
            return Err(Error::StoreUnavailable("connection refused".to_owned()));
        }

        if self.failing.contains(&query) {
            return Err(Error::SqlError(rusqlite::Error::InvalidQuery));
        }

        Ok(())
    }
}

impl TransactionStore for MemoryTransactionStore {
    fn count(&self) -> Result<u64, Error> {
        self.check(Query::Count)?;
        Ok(self.transactions.len() as u64)
    }

    fn total_volume(&self, mode: Option<TransactionMode>) -> Result<f64, Error> {
        self.check(Query::TotalVolume)?;
        Ok(self
            .transactions
            .iter()
            .filter(|transaction| mode.is_none_or(|mode| transaction.mode == mode))
            .map(|transaction| transaction.amount)
            .sum())
    }

    fn group_by_mode(&self) -> Result<Vec<ModeAggregate>, Error> {
        self.check(Query::GroupByMode)?;

        let mut by_mode: BTreeMap<TransactionMode, ModeAggregate> = BTreeMap::new();
        for transaction in &self.transactions {
            let aggregate = by_mode.entry(transaction.mode).or_insert(ModeAggregate {
                mode: transaction.mode,
                count: 0,
                volume: 0.0,
            });
            aggregate.count += 1;
            aggregate.volume += transaction.amount;
        }

        Ok(by_mode.into_values().collect())
    }

    fn find_recent(&self, limit: u32) -> Result<Vec<Transaction>, Error> {
        self.check(Query::FindRecent)?;

        let mut transactions = self.transactions.clone();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        transactions.truncate(limit as usize);

        Ok(transactions)
    }

    fn group_by_day(
        &self,
        window: RangeInclusive<Date>,
        offset: UtcOffset,
    ) -> Result<Vec<DayAggregate>, Error> {
        self.check(Query::GroupByDay)?;

        let mut by_day: BTreeMap<Date, DayAggregate> = BTreeMap::new();
        for transaction in &self.transactions {
            let date = transaction.timestamp.to_offset(offset).date();
            if !window.contains(&date) {
                continue;
            }

            let aggregate = by_day.entry(date).or_insert(DayAggregate {
                date,
                count: 0,
                volume: 0.0,
            });
            aggregate.count += 1;
            aggregate.volume += transaction.amount;
        }

        Ok(by_day.into_values().collect())
    }

    fn with_cancellation(&self, cancel: CancellationToken) -> Arc<dyn TransactionStore> {
        Arc::new(Self {
            cancel: Some(cancel),
            ..self.clone()
        })
    }
}
