//! Defines the endpoint for creating a new transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    transaction::{Transaction, TransactionMode, core::create_transaction},
};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// An amount sent either as a JSON number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    /// A JSON number.
    Number(f64),
    /// A string such as `"125.50"`.
    Text(String),
}

impl AmountInput {
    fn parse(&self) -> Result<f64, Error> {
        match self {
            AmountInput::Number(amount) => Ok(*amount),
            AmountInput::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| Error::InvalidAmount(text.clone())),
        }
    }
}

/// The JSON body for creating a transaction.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    /// The account the money was sent from.
    pub sender_account_number: Option<String>,
    /// The account the money was sent to.
    pub receiver_account_number: Option<String>,
    /// The amount of money transferred.
    pub amount: Option<AmountInput>,
    /// The payment mode name, e.g. "UPI".
    pub transaction_mode: Option<String>,
    /// When the transaction happened, defaults to now.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub transaction_date_time: Option<OffsetDateTime>,
}

/// A route handler for creating a new transaction, responds with the created
/// transaction.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let Json(request) = body.map_err(|rejection| Error::InvalidRequestBody(rejection.body_text()))?;

    let sender = non_empty(request.sender_account_number);
    let receiver = non_empty(request.receiver_account_number);
    let mode = non_empty(request.transaction_mode);

    let missing: Vec<&str> = [
        ("senderAccountNumber", sender.is_none()),
        ("receiverAccountNumber", receiver.is_none()),
        ("amount", request.amount.is_none()),
        ("transactionMode", mode.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, is_missing)| is_missing.then_some(field))
    .collect();

    let (Some(sender), Some(receiver), Some(amount), Some(mode)) =
        (sender, receiver, request.amount, mode)
    else {
        return Err(Error::MissingFields(missing.join(", ")));
    };

    // OTHER only labels records whose mode was missing or unrecognised.
    let mode = match mode.parse()? {
        TransactionMode::Other => return Err(Error::InvalidTransactionMode(mode)),
        mode => mode,
    };
    let amount = amount.parse()?;
    let timestamp = request
        .transaction_date_time
        .unwrap_or_else(OffsetDateTime::now_utc);

    let builder = Transaction::build(amount, timestamp, mode)
        .sender(&sender)
        .receiver(&receiver);

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = create_transaction(builder, &connection)
        .inspect_err(|error| tracing::error!("could not create transaction: {error}"))?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
