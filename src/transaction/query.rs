//! Database query helpers for listing transactions a page at a time.

use rusqlite::{Connection, params_from_iter, types::Value};
use serde::Deserialize;

use crate::{
    Error,
    pagination::PageRequest,
    transaction::{
        Transaction, TransactionMode,
        core::{TRANSACTION_COLUMNS, map_transaction_row, mode_condition},
    },
};

/// The field to sort a transaction listing by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SortField {
    /// When the transaction happened.
    #[default]
    #[serde(rename = "transactionDateTime")]
    Timestamp,
    /// The amount transferred.
    #[serde(rename = "amount")]
    Amount,
    /// The payment mode.
    #[serde(rename = "transactionMode")]
    Mode,
}

impl SortField {
    fn order_expression(self) -> &'static str {
        match self {
            SortField::Timestamp => "timestamp",
            SortField::Amount => "amount",
            SortField::Mode => "UPPER(TRIM(mode))",
        }
    }
}

/// The order to sort transactions in a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SortOrder {
    /// Sort in order of increasing value.
    #[serde(rename = "asc")]
    Ascending,
    /// Sort in order of decreasing value.
    #[default]
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Which transactions to list and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionQuery {
    /// Only list transactions with this mode.
    pub mode: Option<TransactionMode>,
    /// The field to sort by.
    pub sort_by: SortField,
    /// The direction to sort in.
    pub sort_order: SortOrder,
    /// The page of results to return.
    pub page: PageRequest,
}

/// Get one page of transactions.
///
/// Transactions with equal sort keys are ordered by ID in the same direction
/// so that pages do not overlap.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn query_transactions(
    query: &TransactionQuery,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut params = Vec::new();

    let where_clause = match query.mode {
        Some(mode) => {
            let (condition, param) = mode_condition(mode, 1);
            params.extend(param.map(|mode| Value::Text(mode.to_owned())));
            format!("WHERE {condition}")
        }
        None => String::new(),
    };

    let limit_placeholder = params.len() + 1;
    params.push(Value::Integer(to_sql_integer(query.page.limit)));
    params.push(Value::Integer(to_sql_integer(query.page.offset())));

    let direction = query.sort_order.keyword();
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" {where_clause} \
        ORDER BY {} {direction}, id {direction} \
        LIMIT ?{} OFFSET ?{}",
        query.sort_by.order_expression(),
        limit_placeholder,
        limit_placeholder + 1,
    );

    connection
        .prepare(&sql)?
        .query_map(params_from_iter(params), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}

fn to_sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
