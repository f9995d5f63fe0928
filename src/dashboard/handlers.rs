//! Dashboard HTTP handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use tokio::time::Instant;

use crate::{
    AppState, Error,
    config::DashboardConfig,
    dashboard::{
        aggregator::{SummaryOptions, TransactionAnalytics},
        summary::Summary,
    },
    stores::SQLiteTransactionStore,
    timezone::{get_local_offset, local_today},
};

/// The state needed for the dashboard summary.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// Computes the summary from the transaction store.
    pub analytics: TransactionAnalytics,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
    /// The defaults and deadline for the summary.
    pub config: DashboardConfig,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            analytics: TransactionAnalytics::new(
                Arc::new(SQLiteTransactionStore::new(state.db_connection.clone())),
                state.fraud_policy.clone(),
            ),
            local_timezone: state.local_timezone.clone(),
            config: state.dashboard_config.clone(),
        }
    }
}

/// Overrides for the dashboard defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    /// The length of the daily series, in days.
    pub window_days: Option<u32>,
    /// The number of recent transactions.
    pub recent_limit: Option<u32>,
}

/// Summarise the ledger for the dashboard.
pub async fn get_dashboard(
    State(state): State<DashboardState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Result<Json<Summary>, Error> {
    let Query(query) = query.map_err(|rejection| Error::InvalidQuery(rejection.body_text()))?;

    let local_offset = get_local_offset(&state.local_timezone).ok_or_else(|| {
        tracing::error!("Could not get local offset for {}", state.local_timezone);
        Error::InvalidTimezoneError(state.local_timezone.clone())
    })?;

    let options = SummaryOptions {
        window_days: query.window_days.unwrap_or(state.config.window_days),
        recent_limit: query.recent_limit.unwrap_or(state.config.recent_limit),
    };
    let deadline = Instant::now() + state.config.timeout;

    let summary = state
        .analytics
        .summarize(
            options,
            local_today(local_offset),
            local_offset,
            Some(deadline),
        )
        .await?;

    Ok(Json(summary))
}
