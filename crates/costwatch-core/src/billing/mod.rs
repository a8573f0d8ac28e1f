//! Billing integration for Costwatch
//!
//! Builds the Cost Management client at startup and turns month-to-date
//! queries into a [`CostReading`].

mod client;
mod credential;
mod fetcher;
pub mod query;

pub use client::CostManagementClient;
pub use credential::{AccessToken, ClientSecretCredential};
pub use fetcher::CostFetcher;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::Config;
use query::{QueryDefinition, QueryResult};

/// Currency reported when the API returns no rows
pub const DEFAULT_CURRENCY: &str = "USD";

/// Anything that can answer a Cost Management query
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Run `definition` against `scope` (e.g. `/subscriptions/{id}`)
    async fn query(
        &self,
        scope: &str,
        definition: &QueryDefinition,
    ) -> Result<QueryResult, BillingError>;
}

/// Billing errors
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Missing or invalid credential settings
    #[error("Credential error: {0}")]
    Credential(String),

    /// Token endpoint rejected the credential
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Request never produced a response
    #[error("HTTP error: {0}")]
    Http(String),

    /// Cost Management answered with a non-success status
    #[error("Cost API returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// `code: message` from the error body, or the raw body
        message: String,
    },

    /// Response body could not be interpreted
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Outcome of a month-to-date cost fetch
#[derive(Debug, Clone, PartialEq)]
pub enum CostReading {
    /// The API returned a cost row
    Amount {
        /// Month-to-date cost
        amount: f64,
        /// Currency code from the result row
        currency: String,
    },
    /// The API returned no rows; nothing has been spent yet
    NoData,
    /// No usable client or no subscription id
    Unconfigured(String),
    /// The query failed
    Error(String),
}

impl CostReading {
    /// Cost value, zero for everything but [`CostReading::Amount`]
    pub fn amount(&self) -> f64 {
        match self {
            Self::Amount { amount, .. } => *amount,
            Self::NoData | Self::Unconfigured(_) | Self::Error(_) => 0.0,
        }
    }

    /// Currency code, or a marker describing why there is none
    pub fn currency_label(&self) -> String {
        match self {
            Self::Amount { currency, .. } => currency.clone(),
            Self::NoData => DEFAULT_CURRENCY.to_string(),
            Self::Unconfigured(reason) => format!("Not configured: {reason}"),
            Self::Error(reason) => format!("API Error: {reason}"),
        }
    }
}

impl fmt::Display for CostReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency_label(), self.amount())
    }
}

/// Build the billing client from configuration.
///
/// Logs the outcome once. `None` leaves every later fetch reporting
/// [`CostReading::Unconfigured`].
pub fn init_cost_source(config: &Config) -> Option<Arc<dyn CostSource>> {
    let built = ClientSecretCredential::new(
        config.azure.tenant_id.as_deref(),
        config.azure.client_id.as_deref(),
        config.azure.client_secret.as_deref(),
    )
    .and_then(|credential| {
        let tenant_id = credential.tenant_id().to_string();
        CostManagementClient::new(credential, &config.endpoints).map(|client| (client, tenant_id))
    });

    match built {
        Ok((client, tenant_id)) => {
            info!(%tenant_id, "Azure client secret credential established");
            Some(Arc::new(client))
        }
        Err(e) => {
            error!(error = %e, "Error establishing Azure credential, check tenant and client ids");
            None
        }
    }
}
