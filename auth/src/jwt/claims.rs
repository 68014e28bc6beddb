use chrono::Duration;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

/// Purpose a signed token was minted for.
///
/// Checked on decode so a refresh token can never be presented as an access
/// token (and vice versa).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    RefreshPair,
}

/// Claims carried by every token the identity service signs.
///
/// Standard RFC 7519 fields plus the session binding (`sid`) and the token
/// purpose (`kind`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,

    /// Session the token belongs to
    pub sid: String,

    /// Unique token identifier
    pub jti: String,

    /// Token purpose
    pub kind: TokenKind,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Role names granted to the subject
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Display username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Claims {
    /// Create short-lived access claims.
    ///
    /// # Arguments
    /// * `user_id` - Subject of the token
    /// * `session_id` - Session the token is bound to
    /// * `ttl_minutes` - Minutes until the token expires
    pub fn access(user_id: impl ToString, session_id: impl ToString, ttl_minutes: i64) -> Self {
        Self::build(user_id, session_id, TokenKind::Access, Duration::minutes(ttl_minutes))
    }

    /// Create long-lived refresh claims.
    ///
    /// The generated `jti` is the refresh token id the session must be bound
    /// to for the token to be honoured.
    pub fn refresh(user_id: impl ToString, session_id: impl ToString, ttl_days: i64) -> Self {
        Self::build(user_id, session_id, TokenKind::RefreshPair, Duration::days(ttl_days))
    }

    fn build(
        user_id: impl ToString,
        session_id: impl ToString,
        kind: TokenKind,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            jti: new_token_id(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            roles: Vec::new(),
            username: None,
        }
    }

    /// Set roles.
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Set username.
    pub fn with_username(mut self, username: impl ToString) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Set the token identifier (`jti`).
    pub fn with_token_id(mut self, jti: impl Into<String>) -> Self {
        self.jti = jti.into();
        self
    }
}

fn new_token_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}
