//! Implements a SQLite backed transaction store.

use std::{
    collections::BTreeMap,
    ops::RangeInclusive,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::{Connection, params_from_iter};
use time::{Date, UtcOffset};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{
    Error,
    stores::{DayAggregate, ModeAggregate, TransactionStore},
    transaction::{Transaction, TransactionMode, get_count, map_transaction_row, mode_condition},
};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Queries transactions in a SQLite database.
///
/// The connection is shared with the rest of the application, so each query
/// holds the connection lock only while it runs.
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
    cancel: Option<CancellationToken>,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            connection,
            cancel: None,
        }
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }

    /// Run `query` while holding the connection lock.
    ///
    /// If the store has a cancellation token, a query whose token fired while
    /// it waited for the lock is skipped, and a running statement is
    /// interrupted as soon as the token fires.
    fn run<T>(&self, query: impl FnOnce(&Connection) -> Result<T, Error>) -> Result<T, Error> {
        let connection = self.connection()?;

        let Some(cancel) = &self.cancel else {
            return query(&connection);
        };

        if cancel.is_cancelled() {
            return Err(Error::QueryCancelled);
        }

        // Without a runtime there is nothing to watch the token, so the
        // statement runs to completion.
        let watcher = Handle::try_current().ok().map(|runtime| {
            let cancel = cancel.clone();
            let interrupt = connection.get_interrupt_handle();

            runtime.spawn(async move {
                cancel.cancelled().await;
                interrupt.interrupt();
            })
        });

        let result = query(&connection);

        if let Some(watcher) = watcher {
            watcher.abort();
        }

        result
    }
}

impl TransactionStore for SQLiteTransactionStore {
    fn count(&self) -> Result<u64, Error> {
        self.run(|connection| {
            connection
                .query_row("SELECT COUNT(id) FROM \"transaction\"", [], |row| {
                    get_count(row, 0)
                })
                .map_err(|error| error.into())
        })
    }

    fn total_volume(&self, mode: Option<TransactionMode>) -> Result<f64, Error> {
        let (where_clause, param) = match mode {
            Some(mode) => {
                let (condition, param) = mode_condition(mode, 1);
                (format!("WHERE {condition}"), param)
            }
            None => (String::new(), None),
        };

        self.run(|connection| {
            connection
                .query_row(
                    &format!("SELECT COALESCE(SUM(amount), 0.0) FROM \"transaction\" {where_clause}"),
                    params_from_iter(param),
                    |row| row.get(0),
                )
                .map_err(|error| error.into())
        })
    }

    /// Rows with a missing or unrecognised mode are merged into a single
    /// [TransactionMode::Other] entry.
    fn group_by_mode(&self) -> Result<Vec<ModeAggregate>, Error> {
        let rows = self.run(|connection| {
            let mut stmt = connection.prepare(
                "SELECT mode, COUNT(id), COALESCE(SUM(amount), 0.0)
                FROM \"transaction\"
                GROUP BY mode",
            )?;

            stmt.query_map([], |row| {
                Ok(ModeAggregate {
                    mode: row.get(0)?,
                    count: get_count(row, 1)?,
                    volume: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()
            .map_err(Error::from)
        })?;

        let mut by_mode: BTreeMap<TransactionMode, ModeAggregate> = BTreeMap::new();

        for row in rows {
            by_mode
                .entry(row.mode)
                .and_modify(|aggregate| {
                    aggregate.count += row.count;
                    aggregate.volume += row.volume;
                })
                .or_insert(row);
        }

        Ok(by_mode.into_values().collect())
    }

    fn find_recent(&self, limit: u32) -> Result<Vec<Transaction>, Error> {
        self.run(|connection| {
            let mut stmt = connection.prepare(
                "SELECT id, amount, timestamp, mode, sender_account_number, receiver_account_number
                FROM \"transaction\"
                ORDER BY timestamp DESC, id DESC
                LIMIT ?1",
            )?;

            stmt.query_map([limit], map_transaction_row)?
                .collect::<Result<Vec<_>, rusqlite::Error>>()
                .map_err(Error::from)
        })
    }

    /// Days are bucketed by shifting each timestamp by `offset` in SQL, so a
    /// daylight saving change inside the window moves transactions near
    /// midnight by up to the size of the change.
    fn group_by_day(
        &self,
        window: RangeInclusive<Date>,
        offset: UtcOffset,
    ) -> Result<Vec<DayAggregate>, Error> {
        let window_start = window.start().midnight().assume_offset(offset).unix_timestamp();
        let window_end =
            window.end().midnight().assume_offset(offset).unix_timestamp() + SECONDS_PER_DAY;
        let offset_seconds = i64::from(offset.whole_seconds());

        self.run(|connection| {
            let mut stmt = connection.prepare(
                "SELECT date(timestamp + ?3, 'unixepoch') AS day, COUNT(id), COALESCE(SUM(amount), 0.0)
                FROM \"transaction\"
                WHERE timestamp >= ?1 AND timestamp < ?2
                GROUP BY day
                ORDER BY day ASC",
            )?;

            stmt.query_map((window_start, window_end, offset_seconds), |row| {
                Ok(DayAggregate {
                    date: row.get(0)?,
                    count: get_count(row, 1)?,
                    volume: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()
            .map_err(Error::from)
        })
    }

    fn with_cancellation(&self, cancel: CancellationToken) -> Arc<dyn TransactionStore> {
        Arc::new(Self {
            connection: self.connection.clone(),
            cancel: Some(cancel),
        })
    }
}
