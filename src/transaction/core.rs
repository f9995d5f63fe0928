//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::TransactionId};

/// The account reference used when a record has no sender or receiver account.
pub const UNKNOWN_ACCOUNT: &str = "Unknown";

// ============================================================================
// MODELS
// ============================================================================

/// The payment rail a transaction was sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionMode {
    /// National Electronic Funds Transfer.
    Neft,
    /// Unified Payments Interface.
    Upi,
    /// Immediate Payment Service.
    Imps,
    /// Real Time Gross Settlement.
    Rtgs,
    /// Records with a missing or unrecognised mode.
    Other,
}

impl TransactionMode {
    /// Every mode, in display order.
    pub const ALL: [TransactionMode; 5] = [
        TransactionMode::Neft,
        TransactionMode::Upi,
        TransactionMode::Imps,
        TransactionMode::Rtgs,
        TransactionMode::Other,
    ];

    /// The canonical upper case name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMode::Neft => "NEFT",
            TransactionMode::Upi => "UPI",
            TransactionMode::Imps => "IMPS",
            TransactionMode::Rtgs => "RTGS",
            TransactionMode::Other => "OTHER",
        }
    }

    /// Map a raw mode to a [TransactionMode], falling back to
    /// [TransactionMode::Other] for missing or unrecognised values.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::parse::<TransactionMode>) {
            Some(Ok(mode)) => mode,
            Some(Err(_)) => {
                tracing::warn!(
                    "unrecognised transaction mode {:?}, using {}",
                    raw.unwrap_or_default(),
                    TransactionMode::Other
                );
                TransactionMode::Other
            }
            None => {
                tracing::warn!("transaction has no mode, using {}", TransactionMode::Other);
                TransactionMode::Other
            }
        }
    }
}

impl Display for TransactionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionMode {
    type Err = Error;

    /// Parse a mode name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();

        TransactionMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == name)
            .ok_or_else(|| Error::InvalidTransactionMode(s.to_owned()))
    }
}

impl ToSql for TransactionMode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(TransactionMode::normalize(None)),
            ValueRef::Text(text) => {
                let text =
                    std::str::from_utf8(text).map_err(|error| FromSqlError::Other(Box::new(error)))?;
                Ok(TransactionMode::normalize(Some(text)))
            }
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A transfer of money from a sender account to a receiver account.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money transferred, never negative.
    pub amount: f64,
    /// When the transaction happened.
    #[serde(rename = "transactionDateTime", with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// The payment rail used for the transfer.
    #[serde(rename = "transactionMode")]
    pub mode: TransactionMode,
    /// The account the money was sent from.
    pub sender_account_number: String,
    /// The account the money was sent to.
    pub receiver_account_number: String,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(amount: f64, timestamp: OffsetDateTime, mode: TransactionMode) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            timestamp,
            mode,
            sender_account_number: UNKNOWN_ACCOUNT.to_owned(),
            receiver_account_number: UNKNOWN_ACCOUNT.to_owned(),
            import_id: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// # Examples
///
/// ```ignore
/// use time::macros::datetime;
///
/// use crate::transaction::{Transaction, TransactionMode};
///
/// let transaction = Transaction::build(250.0, datetime!(2025-01-15 10:30 UTC), TransactionMode::Upi)
///     .sender("ACC-1001")
///     .receiver("ACC-2002");
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The amount of money transferred.
    ///
    /// Must be finite and not negative.
    pub amount: f64,

    /// When the transfer happened. Must not be in the future.
    pub timestamp: OffsetDateTime,

    /// The payment rail used for the transfer.
    pub mode: TransactionMode,

    /// The account the money was sent from.
    pub sender_account_number: String,

    /// The account the money was sent to.
    pub receiver_account_number: String,

    /// Optional unique identifier for imported transactions.
    ///
    /// The database enforces uniqueness on this field so that importing the
    /// same CSV file twice does not duplicate transactions.
    pub import_id: Option<i64>,
}

impl TransactionBuilder {
    /// Set the sender account for the transaction.
    pub fn sender(mut self, account_number: &str) -> Self {
        self.sender_account_number = account_number.to_owned();
        self
    }

    /// Set the receiver account for the transaction.
    pub fn receiver(mut self, account_number: &str) -> Self {
        self.receiver_account_number = account_number.to_owned();
        self
    }

    /// Set the import ID for the transaction.
    pub fn import_id(mut self, import_id: Option<i64>) -> Self {
        self.import_id = import_id;
        self
    }

    /// Check the amount and timestamp against the ledger rules.
    ///
    /// # Errors
    /// Returns [Error::InvalidAmount] if the amount is negative or not finite,
    /// or [Error::FutureDate] if the timestamp is after `now`.
    pub fn validate(&self, now: OffsetDateTime) -> Result<(), Error> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(Error::InvalidAmount(self.amount.to_string()));
        }

        if self.timestamp > now {
            return Err(Error::FutureDate(self.timestamp));
        }

        Ok(())
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, amount, timestamp, mode, sender_account_number, receiver_account_number";

/// Create a new transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] or [Error::FutureDate] if the builder fails validation,
/// - [Error::DuplicateImportId] if a transaction with the specified import ID already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    builder.validate(OffsetDateTime::now_utc())?;

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (amount, timestamp, mode, sender_account_number, receiver_account_number, import_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                builder.amount,
                builder.timestamp.unix_timestamp(),
                builder.mode,
                builder.sender_account_number,
                builder.receiver_account_number,
                builder.import_id,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)?;

    Ok(transaction)
}

type RowsAffected = usize;

/// Delete the transaction with `id`, returning the number of deleted rows.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "DELETE FROM \"transaction\" WHERE id = :id",
            &[(":id", &id)],
        )
        .map_err(|err| err.into())
}

/// Get the number of transactions in the database, optionally only those with `mode`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(
    mode: Option<TransactionMode>,
    connection: &Connection,
) -> Result<u64, Error> {
    let (condition, param) = match mode {
        Some(mode) => {
            let (condition, param) = mode_condition(mode, 1);
            (format!("WHERE {condition}"), param)
        }
        None => (String::new(), None),
    };

    connection
        .query_row(
            &format!("SELECT COUNT(id) FROM \"transaction\" {condition}"),
            rusqlite::params_from_iter(param),
            |row| get_count(row, 0),
        )
        .map_err(|error| error.into())
}

/// Read a `COUNT(...)` column.
pub(crate) fn get_count(row: &Row, index: usize) -> Result<u64, rusqlite::Error> {
    let count: i64 = row.get(index)?;

    u64::try_from(count).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(error))
    })
}

/// Build the SQL condition that selects transactions with `mode`.
///
/// Raw mode values are compared after trimming and upper casing so that the
/// filter agrees with [TransactionMode::normalize]. [TransactionMode::Other]
/// matches missing and unrecognised modes and takes no parameter, otherwise
/// the condition uses the positional parameter `?{placeholder}`.
pub(crate) fn mode_condition(
    mode: TransactionMode,
    placeholder: usize,
) -> (String, Option<&'static str>) {
    match mode {
        TransactionMode::Other => {
            let known_modes = TransactionMode::ALL
                .iter()
                .filter(|mode| **mode != TransactionMode::Other)
                .map(|mode| format!("'{}'", mode.as_str()))
                .collect::<Vec<_>>()
                .join(", ");

            (
                format!("(mode IS NULL OR UPPER(TRIM(mode)) NOT IN ({known_modes}))"),
                None,
            )
        }
        mode => (
            format!("UPPER(TRIM(mode)) = ?{placeholder}"),
            Some(mode.as_str()),
        ),
    }
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL CHECK (amount >= 0),
                timestamp INTEGER NOT NULL,
                mode TEXT,
                sender_account_number TEXT,
                receiver_account_number TEXT,
                import_id INTEGER UNIQUE
                )",
        (),
    )?;

    // The dashboard reads recent transactions and daily buckets by timestamp.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_timestamp ON \"transaction\"(timestamp);",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_mode ON \"transaction\"(mode);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
///
/// Expects the columns `id, amount, timestamp, mode, sender_account_number,
/// receiver_account_number` in that order. Missing modes and account numbers
/// are normalized rather than rejected.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let timestamp = OffsetDateTime::from_unix_timestamp(row.get(2)?)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(error)))?;
    let mode = row.get(3)?;
    let sender_account_number = account_or_unknown(row.get(4)?);
    let receiver_account_number = account_or_unknown(row.get(5)?);

    Ok(Transaction {
        id,
        amount,
        timestamp,
        mode,
        sender_account_number,
        receiver_account_number,
    })
}

fn account_or_unknown(account_number: Option<String>) -> String {
    match account_number {
        Some(account_number) if !account_number.trim().is_empty() => account_number,
        _ => UNKNOWN_ACCOUNT.to_owned(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
