//! Defines the endpoint for listing transactions a page at a time.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State, rejection::QueryRejection},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    pagination::{PageRequest, Pagination, PaginationConfig},
    transaction::{
        Transaction, TransactionMode,
        core::count_transactions,
        query::{SortField, SortOrder, TransactionQuery, query_transactions},
    },
};

/// The state needed to list transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls page sizes.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query string for listing transactions.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsQuery {
    /// The page number, starting from one.
    pub page: Option<u64>,
    /// The number of transactions per page.
    pub limit: Option<u64>,
    /// Only list transactions with this payment mode.
    pub transaction_mode: Option<String>,
    /// The field to sort by.
    pub sort_by: Option<SortField>,
    /// The direction to sort in.
    pub sort_order: Option<SortOrder>,
}

/// A page of transactions.
#[derive(Debug, Serialize)]
pub struct TransactionPage {
    /// The transactions on the page.
    pub transactions: Vec<Transaction>,
    /// Where the page sits in the full listing.
    pub pagination: Pagination,
}

/// A route handler for listing transactions.
pub async fn list_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    query: Result<Query<ListTransactionsQuery>, QueryRejection>,
) -> Result<Json<TransactionPage>, Error> {
    let Query(query) = query.map_err(|rejection| Error::InvalidQuery(rejection.body_text()))?;

    let mode = query
        .transaction_mode
        .as_deref()
        .filter(|mode| !mode.trim().is_empty())
        .map(str::parse::<TransactionMode>)
        .transpose()?;

    let transaction_query = TransactionQuery {
        mode,
        sort_by: query.sort_by.unwrap_or_default(),
        sort_order: query.sort_order.unwrap_or_default(),
        page: PageRequest::resolve(query.page, query.limit, &state.pagination_config)?,
    };

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let total = count_transactions(mode, &connection)?;
    let transactions = query_transactions(&transaction_query, &connection)?;

    Ok(Json(TransactionPage {
        transactions,
        pagination: Pagination::new(total, transaction_query.page),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use time::{Duration, macros::datetime};

    use crate::{
        db::initialize,
        endpoints,
        pagination::PaginationConfig,
        transaction::{Transaction, TransactionMode, create_transaction},
    };

    use super::{ListTransactionsState, list_transactions_endpoint};

    fn get_test_server(transactions: &[(f64, TransactionMode)]) -> TestServer {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let start = datetime!(2025-04-01 12:00 UTC);
        for (i, (amount, mode)) in transactions.iter().enumerate() {
            create_transaction(
                Transaction::build(*amount, start + Duration::minutes(i as i64), *mode),
                &connection,
            )
            .unwrap();
        }

        let state = ListTransactionsState {
            db_connection: Arc::new(Mutex::new(connection)),
            pagination_config: PaginationConfig::default(),
        };
        let app = Router::new()
            .route(endpoints::TRANSACTIONS_API, get(list_transactions_endpoint))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn lists_first_page_newest_first() {
        let transactions: Vec<_> = (1..=12)
            .map(|i| (i as f64, TransactionMode::Neft))
            .collect();
        let server = get_test_server(&transactions);

        let response = server.get(endpoints::TRANSACTIONS_API).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        let page = body["transactions"].as_array().unwrap();
        assert_eq!(page.len(), 10);
        assert_eq!(page[0]["amount"], json!(12.0));
        assert_eq!(
            body["pagination"],
            json!({ "total": 12, "page": 1, "limit": 10, "totalPages": 2 })
        );
    }

    #[tokio::test]
    async fn filters_sorts_and_pages() {
        let server = get_test_server(&[
            (5.0, TransactionMode::Upi),
            (1.0, TransactionMode::Upi),
            (3.0, TransactionMode::Imps),
            (4.0, TransactionMode::Upi),
        ]);

        let response = server
            .get(endpoints::TRANSACTIONS_API)
            .add_query_param("transactionMode", "upi")
            .add_query_param("sortBy", "amount")
            .add_query_param("sortOrder", "asc")
            .add_query_param("page", 2)
            .add_query_param("limit", 2)
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
        assert_eq!(body["transactions"][0]["amount"], json!(5.0));
        assert_eq!(
            body["pagination"],
            json!({ "total": 3, "page": 2, "limit": 2, "totalPages": 2 })
        );
    }

    #[tokio::test]
    async fn empty_mode_filter_lists_everything() {
        let server = get_test_server(&[(1.0, TransactionMode::Upi), (2.0, TransactionMode::Rtgs)]);

        let response = server
            .get(endpoints::TRANSACTIONS_API)
            .add_query_param("transactionMode", "")
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["pagination"]["total"], json!(2));
    }

    #[tokio::test]
    async fn unknown_mode_is_bad_request() {
        let server = get_test_server(&[]);

        server
            .get(endpoints::TRANSACTIONS_API)
            .add_query_param("transactionMode", "CHEQUE")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_sort_field_is_bad_request() {
        let server = get_test_server(&[]);

        server
            .get(endpoints::TRANSACTIONS_API)
            .add_query_param("sortBy", "id; DROP TABLE transaction")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn page_zero_is_bad_request() {
        let server = get_test_server(&[]);

        server
            .get(endpoints::TRANSACTIONS_API)
            .add_query_param("page", 0)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
