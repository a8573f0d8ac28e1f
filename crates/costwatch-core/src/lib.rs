//! # Costwatch
//!
//! Month-to-date Azure spend monitor.
//!
//! Every request to the HTTP endpoint queries the Cost Management API for the
//! subscription's spend since the first of the month, compares it with the
//! configured threshold, and emails an alert when the threshold is exceeded.
//!
//! ## Architecture
//!
//! - **Billing**: service principal credential and Cost Management client
//! - **Alerting**: breach email over an implicit-TLS SMTP relay
//! - **Monitor**: the fetch, compare, alert workflow
//! - **API**: a single JSON status endpoint
//!
//! ## Quick Start
//!
//! ```bash
//! # Serve the status endpoint
//! costwatch serve
//!
//! # Run one check and print the result
//! costwatch check
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod billing;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;

pub use crate::config::Config;
pub use crate::error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertDispatcher, AlertOutcome, MailTransport};
    pub use crate::billing::{CostFetcher, CostReading, CostSource};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::monitor::CostMonitor;
}
