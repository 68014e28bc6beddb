use std::sync::Arc;

use reqwest::Method;
use reqwest::Response;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::errors::ClientError;
use crate::refresher::Envelope;
use crate::refresher::HttpTokenRefresher;
use crate::refresher::TokenRefresher;
use crate::session::ClientSession;
use crate::session::SessionTokens;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    session_id: String,
    access_token: String,
    refresh_token: String,
}

/// HTTP client for the identity service that keeps its session alive.
///
/// A request that comes back 401 is retried once with a refreshed access
/// token. Token-issuing endpoints (see [`ClientConfig::is_excluded`]) are
/// passed through untouched.
pub struct ApiClient<R: TokenRefresher = HttpTokenRefresher> {
    http: reqwest::Client,
    config: ClientConfig,
    coordinator: RefreshCoordinator<R>,
}

impl ApiClient<HttpTokenRefresher> {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Http(e.to_string()))?;
        let refresher = HttpTokenRefresher::new(http.clone(), &config);
        Ok(Self::with_refresher(http, config, refresher))
    }
}

impl<R: TokenRefresher> ApiClient<R> {
    pub fn with_refresher(http: reqwest::Client, config: ClientConfig, refresher: R) -> Self {
        let coordinator = RefreshCoordinator::new(
            Arc::new(ClientSession::new()),
            refresher,
            config.refresh_wait_timeout,
            config.refresh_timeout,
        );
        Self {
            http,
            config,
            coordinator,
        }
    }

    pub fn session(&self) -> &Arc<ClientSession> {
        self.coordinator.session()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<R> {
        &self.coordinator
    }

    /// Log in and keep the issued pair for subsequent requests.
    ///
    /// # Errors
    /// * `Status` - Login refused (401 wrong credentials, 429 locked)
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .post(
                "/api/auth/login",
                &json!({ "identifier": identifier, "password": password }),
            )
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let body: Envelope<LoginData> = response.json().await?;
        self.session().establish(SessionTokens {
            access_token: body.data.access_token,
            refresh_token: body.data.refresh_token,
            session_id: Some(body.data.session_id),
        });
        tracing::debug!("Logged in");
        Ok(())
    }

    /// End the session on the server and forget the tokens locally.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.send(Method::POST, "/api/auth/logout", None).await;
        self.session().clear();

        match result {
            Ok(response)
                if response.status().is_success()
                    || response.status() == StatusCode::UNAUTHORIZED =>
            {
                Ok(())
            }
            Ok(response) => Err(ClientError::Status(response.status().as_u16())),
            Err(ClientError::NotAuthenticated) | Err(ClientError::RefreshFailed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response, ClientError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Send a request, refreshing and retrying once if it is rejected with 401.
    ///
    /// # Errors
    /// * `NotAuthenticated` - No session for a protected path
    /// * `RefreshFailed` - Session could not be refreshed and was ended
    /// * `Timeout` - Waited too long for a concurrent refresh
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ClientError> {
        if self.config.is_excluded(path) {
            return Ok(self.request(method, path, body, None).send().await?);
        }

        let access_token = self
            .session()
            .access_token()
            .ok_or(ClientError::NotAuthenticated)?;

        let response = self
            .request(method.clone(), path, body, Some(&access_token))
            .send()
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(path, "Access token rejected, refreshing");
        let fresh = self.coordinator.fresh_access_token(&access_token).await?;

        // Retried once; a second 401 is the caller's to handle
        Ok(self
            .request(method, path, body, Some(&fresh))
            .send()
            .await?)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, self.config.url(path));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
    }
}
