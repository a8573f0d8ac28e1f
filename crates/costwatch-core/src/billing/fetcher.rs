//! Month-to-date cost fetcher

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, warn};

use super::query::QueryDefinition;
use super::{CostReading, CostSource};
use crate::config::Config;

/// Fetches the subscription's month-to-date actual cost
pub struct CostFetcher {
    source: Option<Arc<dyn CostSource>>,
    subscription_id: Option<String>,
}

impl CostFetcher {
    /// Create a fetcher. Either argument may be absent.
    pub fn new(source: Option<Arc<dyn CostSource>>, subscription_id: Option<String>) -> Self {
        Self {
            source,
            subscription_id,
        }
    }

    /// Create a fetcher for the configured subscription
    pub fn from_config(source: Option<Arc<dyn CostSource>>, config: &Config) -> Self {
        Self::new(source, config.azure.subscription_id.clone())
    }

    /// Subscription this fetcher queries
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription_id.as_deref()
    }

    /// Month-to-date cost as of the current UTC date
    pub async fn fetch_current_cost(&self) -> CostReading {
        self.fetch_for_date(Utc::now().date_naive()).await
    }

    /// Month-to-date cost as of `today`. Never fails; errors become readings.
    pub async fn fetch_for_date(&self, today: NaiveDate) -> CostReading {
        let (source, subscription_id) = match (&self.source, &self.subscription_id) {
            (Some(source), Some(subscription_id)) => (source, subscription_id),
            (None, _) => {
                error!("Cost client is not configured");
                return CostReading::Unconfigured("cost client unavailable".to_string());
            }
            (_, None) => {
                error!("Subscription id is not configured");
                return CostReading::Unconfigured("missing subscription id".to_string());
            }
        };

        let scope = format!("/subscriptions/{subscription_id}");
        let definition = QueryDefinition::month_to_date_actual_cost(today);

        let row = source
            .query(&scope, &definition)
            .await
            .and_then(|result| result.first_cost());

        match row {
            Ok(Some((amount, currency))) => {
                debug!(amount, currency = %currency, "Fetched month-to-date cost");
                CostReading::Amount { amount, currency }
            }
            Ok(None) => {
                warn!(scope = %scope, "Cost Management returned no rows");
                CostReading::NoData
            }
            Err(e) => {
                error!(error = %e, scope = %scope, "Error fetching Azure cost, check credentials and role assignment");
                CostReading::Error(e.to_string())
            }
        }
    }
}
