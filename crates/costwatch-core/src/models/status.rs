//! Status payload returned by the dashboard endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::billing::CostReading;

/// Snapshot of one cost check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Always `Running`
    pub status: String,
    /// `<currency> <amount>` with two decimals, or an error marker
    pub current_cost_mtd: String,
    /// Raw month-to-date cost
    pub cost_value: f64,
    /// Configured alert threshold
    pub threshold_usd: f64,
    /// Whether an alert was delivered during this check
    pub alert_triggered_now: bool,
    /// Whether the cost strictly exceeded the threshold
    pub threshold_breached: bool,
    /// Check time, ISO-8601 UTC with a trailing `Z`
    pub last_checked_utc: String,
    /// `Subscription: <id>`
    pub scope: String,
}

impl StatusResponse {
    /// Project a completed check into the response body
    pub fn new(
        reading: &CostReading,
        threshold: f64,
        threshold_breached: bool,
        alert_triggered_now: bool,
        subscription_id: Option<&str>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: "Running".to_string(),
            current_cost_mtd: reading.to_string(),
            cost_value: reading.amount(),
            threshold_usd: threshold,
            alert_triggered_now,
            threshold_breached,
            last_checked_utc: format_utc(checked_at),
            scope: format!("Subscription: {}", subscription_id.unwrap_or("None")),
        }
    }
}

/// `YYYY-MM-DDTHH:MM:SS.ffffffZ`
pub fn format_utc(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}
