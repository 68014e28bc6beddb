use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::config::ClientConfig;
use crate::errors::ClientError;

const REFRESH_PATH: &str = "/api/auth/refresh-token";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// `{statusCode, data}` body returned by the identity service.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// Exchanges a refresh token for a new pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync + 'static {
    /// # Errors
    /// * `RefreshFailed` - The server refused the refresh token
    /// * `Http` / `Status` - Transport failure or unexpected response
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ClientError>;
}

pub struct HttpTokenRefresher {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpTokenRefresher {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            endpoint: config.url(REFRESH_PATH),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("Refresh request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => {
                let body: Envelope<RefreshedTokens> = response.json().await.map_err(|e| {
                    ClientError::Http(format!("Failed to parse refresh response: {}", e))
                })?;
                Ok(body.data)
            }
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => {
                tracing::debug!(status = response.status().as_u16(), "Refresh token refused");
                Err(ClientError::RefreshFailed)
            }
            status => Err(ClientError::Status(status.as_u16())),
        }
    }
}
