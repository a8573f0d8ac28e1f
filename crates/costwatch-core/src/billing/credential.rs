//! Service principal credential (OAuth2 client-credentials grant)

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::BillingError;

/// Token scope for Azure Resource Manager
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Bearer token issued by the token endpoint
#[derive(Clone)]
pub struct AccessToken {
    /// Raw bearer token
    pub token: String,
    /// Validity as reported at issue time
    pub expires_in: Duration,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Tenant, client id and secret for a service principal
#[derive(Clone)]
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ClientSecretCredential {
    /// Validate and build a credential
    pub fn new(
        tenant_id: Option<&str>,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<Self, BillingError> {
        let tenant_id = required("tenant id", tenant_id)?;
        let client_id = required("client id", client_id)?;
        let client_secret = required("client secret", client_secret)?;

        if !tenant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(BillingError::Credential(format!(
                "invalid tenant id: {tenant_id}"
            )));
        }

        Ok(Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Tenant this credential authenticates against
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Request a bearer token for Azure Resource Manager
    pub async fn get_token(
        &self,
        http: &Client,
        authority_host: &str,
    ) -> Result<AccessToken, BillingError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_host.trim_end_matches('/'),
            self.tenant_id
        );

        let response = http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| BillingError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(body);
            return Err(BillingError::Auth(format!("token endpoint returned {status}: {detail}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BillingError::Malformed(format!("token response: {e}")))?;

        debug!(expires_in = ?token.expires_in, "Acquired management token");
        Ok(AccessToken {
            token: token.access_token,
            expires_in: token
                .expires_in
                .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs),
        })
    }
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, BillingError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BillingError::Credential(format!("missing {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_valid_credential() {
        let credential =
            ClientSecretCredential::new(Some("contoso.onmicrosoft.com"), Some("app"), Some("s3cret"))
                .unwrap();
        assert_eq!(credential.tenant_id(), "contoso.onmicrosoft.com");
    }

    #[rstest]
    #[case(None, Some("app"), Some("secret"))]
    #[case(Some("tenant"), None, Some("secret"))]
    #[case(Some("tenant"), Some("app"), Some(""))]
    #[case(Some("ten/ant"), Some("app"), Some("secret"))]
    fn test_invalid_credential(
        #[case] tenant: Option<&str>,
        #[case] client: Option<&str>,
        #[case] secret: Option<&str>,
    ) {
        let result = ClientSecretCredential::new(tenant, client, secret);
        assert!(matches!(result, Err(BillingError::Credential(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credential =
            ClientSecretCredential::new(Some("tenant"), Some("app"), Some("s3cret")).unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("s3cret"));
    }
}
