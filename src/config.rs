//! Settings for the dashboard that the server can override.

use std::time::Duration;

use crate::{Error, dashboard::SummaryOptions};

/// Controls the dashboard summary when a request does not say otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// The default length of the daily series, in days.
    pub window_days: u32,
    /// The default number of recent transactions.
    pub recent_limit: u32,
    /// How long the dashboard queries may run before the request fails.
    pub timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let options = SummaryOptions::default();

        Self {
            window_days: options.window_days,
            recent_limit: options.recent_limit,
            timeout: Duration::from_millis(5000),
        }
    }
}

impl DashboardConfig {
    /// Check the defaults against the same bounds as a request's query.
    ///
    /// # Errors
    /// Returns [Error::InvalidSummaryOptions] if the window or recent limit is
    /// out of range, or if the timeout is zero.
    pub fn validate(&self) -> Result<(), Error> {
        SummaryOptions {
            window_days: self.window_days,
            recent_limit: self.recent_limit,
        }
        .validate()?;

        if self.timeout.is_zero() {
            return Err(Error::InvalidSummaryOptions(
                "dashboard timeout must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}
