//! Cost Management HTTP client

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use super::credential::ClientSecretCredential;
use super::query::{QueryDefinition, QueryResponse, QueryResult};
use super::{BillingError, CostSource};
use crate::config::EndpointConfig;

/// Tokens are renewed this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Queries the Cost Management API on behalf of a service principal.
///
/// The bearer token is cached and shared by all queries until shortly
/// before it expires.
pub struct CostManagementClient {
    http: Client,
    credential: ClientSecretCredential,
    authority_host: String,
    management_host: Url,
    api_version: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl CostManagementClient {
    /// Create a client for the given endpoints
    pub fn new(
        credential: ClientSecretCredential,
        endpoints: &EndpointConfig,
    ) -> Result<Self, BillingError> {
        let management_host = Url::parse(&endpoints.management_host).map_err(|e| {
            BillingError::Credential(format!(
                "invalid management host {}: {e}",
                endpoints.management_host
            ))
        })?;

        let http = Client::builder()
            .user_agent(concat!("costwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BillingError::Http(e.to_string()))?;

        Ok(Self {
            http,
            credential,
            authority_host: endpoints.authority_host.clone(),
            management_host,
            api_version: endpoints.api_version.clone(),
            token: Mutex::new(None),
        })
    }

    /// Cached bearer token, fetching a new one when missing or near expiry.
    ///
    /// The lock is held across the fetch so concurrent checks share one
    /// token request.
    async fn bearer_token(&self) -> Result<String, BillingError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let fresh = self
            .credential
            .get_token(&self.http, &self.authority_host)
            .await?;
        let refresh_at = Instant::now() + fresh.expires_in.saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: fresh.token.clone(),
            refresh_at,
        });

        Ok(fresh.token)
    }

    fn query_url(&self, scope: &str) -> Result<Url, BillingError> {
        let path = format!(
            "{}/providers/Microsoft.CostManagement/query",
            scope.trim_matches('/')
        );
        let mut url = self
            .management_host
            .join(&path)
            .map_err(|e| BillingError::Credential(format!("invalid scope {scope}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }
}

#[async_trait]
impl CostSource for CostManagementClient {
    async fn query(
        &self,
        scope: &str,
        definition: &QueryDefinition,
    ) -> Result<QueryResult, BillingError> {
        let token = self.bearer_token().await?;
        let url = self.query_url(scope)?;

        debug!(%url, from = %definition.time_period.from, to = %definition.time_period.to, "Querying cost");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(definition)
            .send()
            .await
            .map_err(|e| BillingError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ApiErrorBody>(&body);
            let message = match parsed {
                Ok(ApiErrorBody { error }) => match (error.code, error.message) {
                    (Some(code), Some(message)) => format!("{code}: {message}"),
                    (code, message) => message.or(code).unwrap_or(body),
                },
                Err(_) => body,
            };
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Malformed(e.to_string()))?;

        Ok(body.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CostManagementClient {
        let endpoints = EndpointConfig {
            authority_host: server.uri(),
            management_host: server.uri(),
            api_version: "2023-03-01".to_string(),
        };
        let credential =
            ClientSecretCredential::new(Some("tenant-1"), Some("app-1"), Some("secret-1")).unwrap();
        CostManagementClient::new(credential, &endpoints).unwrap()
    }

    async fn mount_token(server: &MockServer) {
        mount_token_lasting(server, 3599, 1).await;
    }

    async fn mount_token_lasting(server: &MockServer, expires_in: u64, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": expires_in,
                "access_token": "token-abc"
            })))
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn mount_cost(server: &MockServer, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/subscriptions/sub-1/providers/Microsoft.CostManagement/query"))
            .and(header("authorization", "Bearer token-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": { "rows": [[7.5, "USD"]] }
            })))
            .expect(calls)
            .mount(server)
            .await;
    }

    fn definition() -> QueryDefinition {
        QueryDefinition::month_to_date_actual_cost(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap())
    }

    #[tokio::test]
    async fn test_query_sends_bearer_token_and_definition() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/subscriptions/sub-1/providers/Microsoft.CostManagement/query"))
            .and(query_param("api-version", "2023-03-01"))
            .and(header("authorization", "Bearer token-abc"))
            .and(body_partial_json(json!({
                "type": "ActualCost",
                "timePeriod": { "from": "2024-06-01T00:00:00Z", "to": "2024-06-15T00:00:00Z" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "query-id",
                "properties": {
                    "nextLink": null,
                    "columns": [
                        { "name": "Cost", "type": "Number" },
                        { "name": "Currency", "type": "String" }
                    ],
                    "rows": [[42.5, "USD"]]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.query("/subscriptions/sub-1", &definition()).await.unwrap();

        assert_eq!(result.first_cost().unwrap(), Some((42.5, "USD".to_string())));
    }

    #[tokio::test]
    async fn test_token_rejection_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .query("/subscriptions/sub-1", &definition())
            .await
            .unwrap_err();

        match err {
            BillingError::Auth(message) => assert!(message.contains("AADSTS7000215")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_error_carries_code_and_message() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("POST"))
            .and(path("/subscriptions/sub-1/providers/Microsoft.CostManagement/query"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": "AuthorizationFailed",
                    "message": "The client does not have authorization"
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .query("/subscriptions/sub-1", &definition())
            .await
            .unwrap_err();

        match err {
            BillingError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.starts_with("AuthorizationFailed"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_is_reused_across_queries() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        mount_cost(&server, 3).await;

        let client = client_for(&server);
        for _ in 0..3 {
            let result = client.query("/subscriptions/sub-1", &definition()).await.unwrap();
            assert_eq!(result.first_cost().unwrap(), Some((7.5, "USD".to_string())));
        }
    }

    #[tokio::test]
    async fn test_token_near_expiry_is_refreshed() {
        let server = MockServer::start().await;
        // Shorter than the refresh margin, so it is never reused
        mount_token_lasting(&server, 60, 2).await;
        mount_cost(&server, 2).await;

        let client = client_for(&server);
        client.query("/subscriptions/sub-1", &definition()).await.unwrap();
        client.query("/subscriptions/sub-1", &definition()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_token_request_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        mount_token(&server).await;
        mount_cost(&server, 1).await;

        let client = client_for(&server);
        assert!(client.query("/subscriptions/sub-1", &definition()).await.is_err());
        client.query("/subscriptions/sub-1", &definition()).await.unwrap();
    }
}
