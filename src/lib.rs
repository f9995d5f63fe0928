//! Paywatch is a web service for a ledger of payments between accounts.
//!
//! This library provides a JSON API for managing transactions and a dashboard
//! endpoint that summarises the ledger: totals, volume per payment mode, the
//! most recent transactions, a daily activity series and fraud indicators.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use rusqlite::ErrorCode;
use serde_json::json;
use time::OffsetDateTime;
use tokio::signal;

mod app_state;
mod config;
mod csv_import;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
mod health;
mod logging;
mod not_found;
mod pagination;
mod routing;
mod stores;
mod timezone;
mod transaction;

pub use app_state::AppState;
pub use config::DashboardConfig;
pub use csv_import::{ImportFailure, ImportReport, import_csv};
pub use dashboard::{
    Cohort, FraudPolicy, FraudScore, HashedFraudPolicy, Summary, SummaryOptions,
    TransactionAnalytics,
};
pub use database_id::{DatabaseId, TransactionId};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use stores::{DayAggregate, ModeAggregate, SQLiteTransactionStore, TransactionStore};
pub use timezone::{get_local_offset, local_today};
pub use transaction::{
    Transaction, TransactionBuilder, TransactionMode, UNKNOWN_ACCOUNT, create_transaction,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A transaction amount was negative, not a number, or not finite.
    #[error("invalid amount {0}, amounts must be a number no less than zero")]
    InvalidAmount(String),

    /// A timestamp in the future was used to create a transaction.
    ///
    /// Transactions record transfers that have already happened, therefore
    /// future timestamps are not allowed.
    #[error("{0} is in the future, which is not allowed")]
    FutureDate(OffsetDateTime),

    /// The text did not name a known payment mode.
    #[error("unknown transaction mode \"{0}\"")]
    InvalidTransactionMode(String),

    /// A request to create a transaction was missing required fields.
    #[error("missing required fields: {0}")]
    MissingFields(String),

    /// A query string parameter had an invalid value.
    #[error("invalid query parameter: {0}")]
    InvalidQuery(String),

    /// A request body was not valid JSON or had fields of the wrong type.
    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),

    /// The dashboard window or recent transaction limit was out of range.
    #[error("invalid summary options: {0}")]
    InvalidSummaryOptions(String),

    /// The specified import ID already exists in the database.
    ///
    /// When importing transactions from a CSV file, an import ID is used to
    /// uniquely identify each transaction so the same file can be imported
    /// more than once without duplicating transactions.
    #[error("the import ID already exists in the database")]
    DuplicateImportId,

    /// The CSV had issues that prevented it from being parsed.
    #[error("Could not parse the CSV file: {0}")]
    InvalidCSV(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// The transaction store could not be reached at all.
    ///
    /// This is distinct from an empty store: callers should tell the client
    /// that data is unavailable rather than show zeros.
    #[error("the transaction store is unavailable: {0}")]
    StoreUnavailable(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The caller's deadline passed before the dashboard queries finished.
    #[error("the dashboard queries did not finish before the deadline")]
    DeadlineExceeded,

    /// A store query was skipped because its request was cancelled.
    #[error("the query was cancelled")]
    QueryCancelled,

    /// A store query panicked or its task was aborted.
    #[error("the query task failed: {0}")]
    QueryTaskFailed(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl Error {
    /// Whether the error means the store could not be reached, as opposed to
    /// a single query failing.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::DatabaseLockError)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("transaction.import_id") =>
            {
                Error::DuplicateImportId
            }
            rusqlite::Error::SqliteFailure(sql_error, ref desc)
                if matches!(
                    sql_error.code,
                    ErrorCode::CannotOpen
                        | ErrorCode::NotADatabase
                        | ErrorCode::DatabaseCorrupt
                        | ErrorCode::SystemIoFailure
                        | ErrorCode::PermissionDenied
                ) =>
            {
                let description = desc.clone().unwrap_or_else(|| sql_error.to_string());
                tracing::error!("could not reach the database: {description}");
                Error::StoreUnavailable(description)
            }
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == ErrorCode::OperationInterrupted =>
            {
                Error::QueryCancelled
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::InvalidAmount(_)
            | Error::FutureDate(_)
            | Error::InvalidTransactionMode(_)
            | Error::MissingFields(_)
            | Error::InvalidQuery(_)
            | Error::InvalidRequestBody(_)
            | Error::InvalidSummaryOptions(_)
            | Error::InvalidCSV(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::DuplicateImportId => (StatusCode::CONFLICT, self.to_string()),
            Error::NotFound => (StatusCode::NOT_FOUND, "not found".to_owned()),
            Error::StoreUnavailable(_) | Error::DatabaseLockError => {
                tracing::error!("The transaction store is unavailable: {}", self);
                (StatusCode::SERVICE_UNAVAILABLE, "data unavailable".to_owned())
            }
            Error::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_owned(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
