use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use identity_service::auth::errors::NotificationError;
use identity_service::auth::issuer::TokenIssuer;
use identity_service::auth::models::AuthSettings;
use identity_service::auth::models::NotificationTemplate;
use identity_service::auth::ports::NotificationDispatcher;
use identity_service::auth::service::AuthPorts;
use identity_service::auth::service::AuthService;
use identity_service::credential::models::LockoutPolicy;
use identity_service::inbound::http::router::create_router;
use identity_service::repositories::InMemorySessionRepository;
use identity_service::repositories::InMemoryUserRepository;
use identity_service::repositories::InMemoryVerificationTokenRepository;
use serde_json::json;
use serde_json::Value;

pub const MAX_ATTEMPTS: u32 = 3;

/// Notifications captured instead of delivered
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient: String,
    pub template: NotificationTemplate,
    pub payload: Value,
}

#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentNotification>>,
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        payload: Value,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(SentNotification {
            recipient: recipient.to_string(),
            template,
            payload,
        });
        Ok(())
    }
}

/// Test application that spawns a real server on in-memory storage
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub outbox: Arc<RecordingDispatcher>,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let users = Arc::new(InMemoryUserRepository::new());
        let outbox = Arc::new(RecordingDispatcher::default());
        let ports = AuthPorts {
            users: Arc::clone(&users),
            credentials: Arc::clone(&users),
            sessions: Arc::new(InMemorySessionRepository::new()),
            verification_tokens: Arc::new(InMemoryVerificationTokenRepository::new()),
            user_settings: users,
            dispatcher: Arc::clone(&outbox),
        };
        let settings = AuthSettings {
            lockout: LockoutPolicy {
                max_attempts: MAX_ATTEMPTS,
                cooldown: chrono::Duration::minutes(15),
            },
            ..AuthSettings::default()
        };
        let issuer = TokenIssuer::new(
            b"test-secret-key-for-jwt-signing-at-least-32-bytes",
            &settings,
        );

        let router = create_router(Arc::new(AuthService::new(ports, issuer, settings)));

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            api_client: reqwest::Client::new(),
            outbox,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make POST request with Bearer token
    pub fn post_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(token)
    }

    /// Register `username` with `<username>@example.com`
    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.post("/api/auth/register")
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, identifier: &str, password: &str) -> reqwest::Response {
        self.post("/api/auth/login")
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Log in and return the response data
    pub async fn login_ok(&self, identifier: &str, password: &str) -> Value {
        let response = self.login(identifier, password).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"].clone()
    }

    /// Token from the most recent notification of `template`
    pub fn last_token(&self, template: NotificationTemplate) -> String {
        self.outbox
            .sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|sent| sent.template == template)
            .and_then(|sent| sent.payload["token"].as_str().map(str::to_string))
            .expect("No notification sent")
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.outbox.sent.lock().unwrap().clone()
    }
}
