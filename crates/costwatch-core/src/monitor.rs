//! Cost check workflow: fetch, compare, maybe alert, report

use chrono::Utc;
use tracing::info;

use crate::alerting::AlertDispatcher;
use crate::billing::{self, CostFetcher};
use crate::config::Config;
use crate::models::StatusResponse;

/// True when `cost` strictly exceeds `threshold`
pub fn is_breached(cost: f64, threshold: f64) -> bool {
    cost > threshold
}

/// Runs one cost check per call. Holds no per-request state.
pub struct CostMonitor {
    fetcher: CostFetcher,
    dispatcher: AlertDispatcher,
    threshold: f64,
}

impl CostMonitor {
    /// Assemble a monitor from its parts
    pub fn new(fetcher: CostFetcher, dispatcher: AlertDispatcher, threshold: f64) -> Self {
        Self {
            fetcher,
            dispatcher,
            threshold,
        }
    }

    /// Build the billing client and SMTP dispatcher from configuration
    pub fn from_config(config: &Config) -> Self {
        let source = billing::init_cost_source(config);
        Self::new(
            CostFetcher::from_config(source, config),
            AlertDispatcher::from_config(config),
            config.threshold,
        )
    }

    /// Fetch the month-to-date cost, alert on breach and summarize.
    ///
    /// Every call is a full cycle; repeated breaches send repeated alerts.
    pub async fn check(&self) -> StatusResponse {
        let reading = self.fetcher.fetch_current_cost().await;
        let cost = reading.amount();
        let threshold_breached = is_breached(cost, self.threshold);

        let alert_triggered_now = if threshold_breached {
            info!(
                cost = %format!("{cost:.2}"),
                threshold = %format!("{:.2}", self.threshold),
                "Threshold breached, attempting to send alert"
            );
            self.dispatcher.send_alert(cost).await.is_success()
        } else {
            info!(
                cost = %format!("{cost:.2}"),
                threshold = %format!("{:.2}", self.threshold),
                "Cost is below threshold"
            );
            false
        };

        StatusResponse::new(
            &reading,
            self.threshold,
            threshold_breached,
            alert_triggered_now,
            self.fetcher.subscription_id(),
            Utc::now(),
        )
    }
}
