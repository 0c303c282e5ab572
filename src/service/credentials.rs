use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProviderError;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com/v1";
const IMPERSONATED_TOKEN_LIFETIME: &str = "3600s";

/// Bearer credential for provider API calls, valid for one reconciliation
/// run.
#[derive(Clone)]
pub struct Credential {
    pub access_token: String,
    pub principal: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("principal", &self.principal)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: fmt::Debug + Send + Sync {
    /// Credential for provider inventory calls, impersonating `principal`
    /// when one is given.
    async fn get_credential(&self, principal: Option<&str>) -> Result<Credential, ProviderError>;

    /// Short-lived token presented to cluster API servers.
    async fn get_access_token(&self) -> Result<String, ProviderError>;
}

/// Hands out one preconfigured token, for local runs and tests.
#[derive(Clone)]
pub struct StaticCredentialProvider {
    token: String,
}

impl StaticCredentialProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialProvider").finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get_credential(&self, principal: Option<&str>) -> Result<Credential, ProviderError> {
        Ok(Credential {
            access_token: self.token.clone(),
            principal: principal.map(str::to_string),
            expires_at: None,
        })
    }

    async fn get_access_token(&self) -> Result<String, ProviderError> {
        Ok(self.token.clone())
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenRequest<'a> {
    scope: Vec<&'a str>,
    lifetime: &'a str,
    delegates: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
    expire_time: DateTime<Utc>,
}

/// Source credentials from the GCE metadata server, optionally exchanged
/// for an impersonated service account token through the IAM credentials
/// API.
#[derive(Debug, Default)]
pub struct GoogleCredentialProvider {
    client: reqwest::Client,
}

impl GoogleCredentialProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn source_token(&self) -> Result<(String, DateTime<Utc>), ProviderError> {
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| ProviderError::CredentialUnavailable(err.to_string()))?;

        let token: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::CredentialUnavailable(err.to_string()))?;

        Ok((
            token.access_token,
            Utc::now() + Duration::seconds(token.expires_in),
        ))
    }

    async fn impersonate(
        &self,
        source_token: &str,
        principal: &str,
    ) -> Result<GenerateAccessTokenResponse, ProviderError> {
        let url = format!(
            "{IAM_CREDENTIALS_URL}/projects/-/serviceAccounts/{principal}:generateAccessToken"
        );
        let request = GenerateAccessTokenRequest {
            scope: vec![CLOUD_PLATFORM_SCOPE],
            lifetime: IMPERSONATED_TOKEN_LIFETIME,
            delegates: vec![],
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(source_token)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| {
                ProviderError::CredentialUnavailable(format!("impersonating {principal}: {err}"))
            })?;

        response
            .json()
            .await
            .map_err(|err| ProviderError::CredentialUnavailable(err.to_string()))
    }
}

#[async_trait]
impl CredentialProvider for GoogleCredentialProvider {
    #[tracing::instrument(name = "credentials::google::get_credential", skip(self))]
    async fn get_credential(&self, principal: Option<&str>) -> Result<Credential, ProviderError> {
        let (source_token, source_expires_at) = self.source_token().await?;

        let principal = match principal {
            Some(principal) => principal,
            None => {
                return Ok(Credential {
                    access_token: source_token,
                    principal: None,
                    expires_at: Some(source_expires_at),
                })
            }
        };

        let impersonated = self.impersonate(&source_token, principal).await?;

        Ok(Credential {
            access_token: impersonated.access_token,
            principal: Some(principal.to_string()),
            expires_at: Some(impersonated.expire_time),
        })
    }

    #[tracing::instrument(name = "credentials::google::get_access_token", skip(self))]
    async fn get_access_token(&self) -> Result<String, ProviderError> {
        let (source_token, _) = self.source_token().await?;

        Ok(source_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_carries_principal() {
        let credentials = StaticCredentialProvider::new("token");

        let credential = credentials
            .get_credential(Some("scanner@my-project.iam.gserviceaccount.com"))
            .await
            .unwrap();

        assert_eq!(credential.access_token, "token");
        assert_eq!(
            credential.principal.as_deref(),
            Some("scanner@my-project.iam.gserviceaccount.com")
        );
        assert_eq!(credentials.get_access_token().await.unwrap(), "token");
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential {
            access_token: "secret".to_string(),
            principal: None,
            expires_at: None,
        };

        assert!(!format!("{credential:?}").contains("secret"));
    }
}
