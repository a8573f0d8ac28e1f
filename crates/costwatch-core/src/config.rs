//! Configuration management for Costwatch
//!
//! Everything is read once from the process environment at startup. Missing
//! secrets are not an error: the billing and mail paths degrade to no-ops.

use ::config::{Environment, Map};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Alert threshold used when `THRESHOLD` is unset
pub const DEFAULT_THRESHOLD: f64 = 5.0;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Azure identity and scope
    pub azure: AzureConfig,

    /// Azure endpoint configuration
    pub endpoints: EndpointConfig,

    /// Alert email identity
    pub email: EmailConfig,

    /// SMTP relay configuration
    pub smtp: SmtpConfig,

    /// Month-to-date spend above which an alert is sent
    pub threshold: f64,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            azure: AzureConfig::default(),
            endpoints: EndpointConfig::default(),
            email: EmailConfig::default(),
            smtp: SmtpConfig::default(),
            threshold: DEFAULT_THRESHOLD,
            logging: LoggingConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Azure service principal and subscription
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Directory (tenant) id
    pub tenant_id: Option<String>,
    /// Application (client) id
    pub client_id: Option<String>,
    /// Client secret
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    /// Subscription whose spend is monitored
    pub subscription_id: Option<String>,
}

/// Azure endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Identity platform authority
    pub authority_host: String,
    /// Resource manager host
    pub management_host: String,
    /// Cost Management API version
    pub api_version: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            authority_host: "https://login.microsoftonline.com".to_string(),
            management_host: "https://management.azure.com".to_string(),
            api_version: "2023-03-01".to_string(),
        }
    }
}

/// Sender and receiver of alert mail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address, also the SMTP login
    pub sender: Option<String>,
    /// SMTP password (an app password for Gmail)
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Receiver address
    pub receiver: Option<String>,
}

impl EmailConfig {
    /// True when sender, password and receiver are all present
    pub fn is_complete(&self) -> bool {
        self.sender.is_some() && self.password.is_some() && self.receiver.is_some()
    }
}

/// SMTP relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host
    pub host: String,
    /// Implicit-TLS port
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Flat view of the environment. The config crate lowercases variable names.
#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    subscription_id: Option<String>,
    email_sender: Option<String>,
    email_password: Option<String>,
    email_receiver: Option<String>,
    threshold: Option<f64>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    azure_authority_host: Option<String>,
    azure_management_host: Option<String>,
    cost_api_version: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    log_format: Option<String>,
    rust_log: Option<String>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::default())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::default().source(Some(map)))
    }

    fn load(env: Environment) -> Result<Self> {
        let raw: RawEnv = ::config::Config::builder()
            .add_source(env.ignore_empty(true))
            .build()?
            .try_deserialize()
            .map_err(|e| Error::config(format!("invalid environment: {e}")))?;

        let threshold = raw.threshold.unwrap_or(DEFAULT_THRESHOLD);
        if !threshold.is_finite() {
            return Err(Error::config("THRESHOLD must be a finite number"));
        }

        let defaults = Self::default();

        Ok(Self {
            server: ServerConfig {
                host: non_empty(raw.host).unwrap_or(defaults.server.host),
                port: raw.port.unwrap_or(defaults.server.port),
            },
            azure: AzureConfig {
                tenant_id: non_empty(raw.tenant_id),
                client_id: non_empty(raw.client_id),
                client_secret: non_empty(raw.client_secret),
                subscription_id: non_empty(raw.subscription_id),
            },
            endpoints: EndpointConfig {
                authority_host: non_empty(raw.azure_authority_host)
                    .unwrap_or(defaults.endpoints.authority_host),
                management_host: non_empty(raw.azure_management_host)
                    .unwrap_or(defaults.endpoints.management_host),
                api_version: non_empty(raw.cost_api_version)
                    .unwrap_or(defaults.endpoints.api_version),
            },
            email: EmailConfig {
                sender: non_empty(raw.email_sender),
                password: non_empty(raw.email_password),
                receiver: non_empty(raw.email_receiver),
            },
            smtp: SmtpConfig {
                host: non_empty(raw.smtp_host).unwrap_or(defaults.smtp.host),
                port: raw.smtp_port.unwrap_or(defaults.smtp.port),
            },
            threshold,
            logging: LoggingConfig {
                level: non_empty(raw.rust_log).unwrap_or(defaults.logging.level),
                format: non_empty(raw.log_format).unwrap_or(defaults.logging.format),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
