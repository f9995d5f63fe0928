//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error, config::DashboardConfig, dashboard::FraudPolicy, db::initialize,
    pagination::PaginationConfig,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,

    /// The config that controls the dashboard summary.
    pub dashboard_config: DashboardConfig,

    /// The config that controls how to return pages of data.
    pub pagination_config: PaginationConfig,

    /// Flags transactions on the dashboard.
    pub fraud_policy: Arc<dyn FraudPolicy>,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the transaction table.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Asia/Kolkata".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        local_timezone: &str,
        dashboard_config: DashboardConfig,
        pagination_config: PaginationConfig,
        fraud_policy: Arc<dyn FraudPolicy>,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            local_timezone: local_timezone.to_owned(),
            dashboard_config,
            pagination_config,
            fraud_policy,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}
