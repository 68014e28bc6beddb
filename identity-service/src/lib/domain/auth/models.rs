use std::time::Duration as StdDuration;

use auth::PasswordPolicy;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::credential::models::LockoutPolicy;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::SettingsSnapshot;

/// Lifetimes and limits used by the auth service.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime; sessions are extended by the same amount
    pub refresh_ttl_days: i64,
    pub lockout: LockoutPolicy,
    pub password_policy: PasswordPolicy,
    pub email_verify_ttl: Duration,
    pub password_reset_ttl: Duration,
    pub invite_ttl: Duration,
    /// Upper bound for each storage call
    pub operation_timeout: StdDuration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
            lockout: LockoutPolicy::default(),
            password_policy: PasswordPolicy::default(),
            email_verify_ttl: Duration::hours(24),
            password_reset_ttl: Duration::hours(1),
            invite_ttl: Duration::hours(72),
            operation_timeout: StdDuration::from_secs(5),
        }
    }
}

/// Freshly minted access/refresh pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
}

/// Verified content of an access token.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub username: Option<String>,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// Verified content of a refresh token.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshClaims {
    pub user_id: UserId,
    pub session_id: SessionId,
    /// Raw secret of the refresh binding the session must still hold
    pub token_id: String,
}

/// Internal reason a login failed. Logged, never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailureReason {
    InvalidCredentials,
    UserNotFound,
    Locked,
}

/// Outcome of a login attempt.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub success: bool,
    pub session_id: Option<SessionId>,
    pub tokens: Option<TokenPair>,
    pub user: Option<User>,
    pub settings: SettingsSnapshot,
    pub failure_reason: Option<LoginFailureReason>,
    pub attempt_count: u32,
    /// Too many attempts: the account is locked
    pub to_many: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LoginResult {
    pub fn succeeded(
        session_id: SessionId,
        tokens: TokenPair,
        user: User,
        settings: SettingsSnapshot,
    ) -> Self {
        Self {
            success: true,
            session_id: Some(session_id),
            tokens: Some(tokens),
            user: Some(user),
            settings,
            failure_reason: None,
            attempt_count: 0,
            to_many: false,
            locked_until: None,
        }
    }

    pub fn failed(reason: LoginFailureReason, attempt_count: u32) -> Self {
        Self {
            success: false,
            session_id: None,
            tokens: None,
            user: None,
            settings: SettingsSnapshot::new(),
            failure_reason: Some(reason),
            attempt_count,
            to_many: false,
            locked_until: None,
        }
    }

    pub fn locked(until: DateTime<Utc>, attempt_count: u32) -> Self {
        Self {
            to_many: true,
            locked_until: Some(until),
            ..Self::failed(LoginFailureReason::Locked, attempt_count)
        }
    }
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub session_id: SessionId,
    pub tokens: TokenPair,
    pub user: User,
}

/// Self-registration request.
#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Base URL the verification link points at
    pub website: Option<String>,
}

/// Accepting an invitation registers a new, already verified account.
#[derive(Debug, Clone)]
pub struct AcceptInviteCommand {
    pub token: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RegistrationResult {
    pub user: User,
    /// An email verification link was issued
    pub verification_required: bool,
}

/// Kinds of message the notification pipeline knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    EmailVerification,
    PasswordReset,
    Invite,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::EmailVerification => "email_verification",
            NotificationTemplate::PasswordReset => "password_reset",
            NotificationTemplate::Invite => "invite",
        }
    }
}

/// Link embedded in an outgoing notification, e.g.
/// `https://portal.example.com/reset-password?token=...`.
pub fn notification_link(website: Option<&str>, path: &str, token: &str) -> Option<String> {
    website
        .map(|base| base.trim_end_matches('/'))
        .filter(|base| !base.is_empty())
        .map(|base| format!("{}/{}?token={}", base, path, token))
}
