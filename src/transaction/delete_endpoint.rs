use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error, database_id::TransactionId, transaction::core::delete_transaction,
};

/// The state needed to delete a transaction.
#[derive(Debug, Clone)]
pub struct DeleteTransactionState {
    /// The database connection for managing transactions.
    db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Confirms that a transaction was deleted.
#[derive(Debug, Serialize)]
pub struct DeletedTransaction {
    /// A human readable confirmation.
    pub message: &'static str,
    /// The ID of the deleted transaction.
    pub id: TransactionId,
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<DeleteTransactionState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<DeletedTransaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    match delete_transaction(transaction_id, &connection) {
        Ok(0) => Err(Error::NotFound),
        Ok(_) => Ok(Json(DeletedTransaction {
            message: "Transaction deleted successfully",
            id: transaction_id,
        })),
        Err(error) => {
            tracing::error!("Could not delete transaction {transaction_id}: {error}");
            Err(error)
        }
    }
}
