//! Contains the read-only query interface that the dashboard aggregates over
//! and its implementations.

mod sqlite;
mod transaction;

#[cfg(test)]
pub(crate) mod memory;

pub use sqlite::SQLiteTransactionStore;
pub use transaction::{DayAggregate, ModeAggregate, TransactionStore};
