//! A health check that proves the service can reach its database.

use axum::{
    Json,
    extract::{FromRef, State},
};
use serde::Serialize;

use crate::{
    AppState, Error,
    stores::{SQLiteTransactionStore, TransactionStore},
};

/// The state needed for the health check.
#[derive(Debug, Clone)]
pub struct HealthState {
    store: SQLiteTransactionStore,
}

impl FromRef<AppState> for HealthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: SQLiteTransactionStore::new(state.db_connection.clone()),
        }
    }
}

/// The health of the service.
#[derive(Debug, PartialEq, Serialize)]
pub struct Health {
    /// Always "ok" when the database answered.
    pub status: &'static str,
    /// The number of transactions in the ledger.
    pub transactions: u64,
}

/// Count the transactions to check that the database is reachable.
///
/// Responds with 503 if the database cannot be reached.
pub async fn get_health(State(state): State<HealthState>) -> Result<Json<Health>, Error> {
    let transactions = tokio::task::spawn_blocking(move || state.store.count())
        .await
        .map_err(|error| Error::QueryTaskFailed(error.to_string()))??;

    Ok(Json(Health {
        status: "ok",
        transactions,
    }))
}
