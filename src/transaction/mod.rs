//! Transaction management for the ledger.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, querying, and managing transactions
//! - JSON endpoints for listing, creating, fetching and deleting transactions

mod core;
mod create_endpoint;
mod delete_endpoint;
mod get_endpoint;
mod list_endpoint;
mod query;

pub use core::{
    Transaction, TransactionBuilder, TransactionMode, UNKNOWN_ACCOUNT, count_transactions,
    create_transaction, create_transaction_table, map_transaction_row,
};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::delete_transaction_endpoint;
pub use get_endpoint::get_transaction_endpoint;
pub use list_endpoint::list_transactions_endpoint;

pub(crate) use core::{get_count, mode_condition};
