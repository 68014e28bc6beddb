use async_trait::async_trait;
use serde_json::Value;

use crate::auth::errors::AuthError;
use crate::auth::errors::NotificationError;
use crate::domain::auth::models::AcceptInviteCommand;
use crate::domain::auth::models::AccessClaims;
use crate::domain::auth::models::LoginResult;
use crate::domain::auth::models::NotificationTemplate;
use crate::domain::auth::models::RefreshResult;
use crate::domain::auth::models::RegisterCommand;
use crate::domain::auth::models::RegistrationResult;
use crate::domain::session::models::RevokeOutcome;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;

/// Authentication operations exposed to the inbound adapters.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Authenticate with a username or email and a password.
    ///
    /// Wrong credentials and lockout are reported in the result, not as
    /// errors.
    ///
    /// # Arguments
    /// * `identifier` - Username or email address
    /// * `password` - Plaintext password
    ///
    /// # Returns
    /// Session, token pair, user and settings on success; failure reason and
    /// lockout window otherwise
    ///
    /// # Errors
    /// * `Storage` / `Timeout` - Infrastructure failure
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Exchange a refresh token for a new pair, rotating the session binding.
    ///
    /// # Arguments
    /// * `refresh_token` - Refresh token of the current pair
    ///
    /// # Returns
    /// The session, its new pair and the user
    ///
    /// # Errors
    /// * `InvalidToken` - Token is forged, expired, or was already rotated
    /// * `SessionExpired` - Session ended (revoked, logged out, or expired)
    /// * `RefreshFailed` - Account behind the session no longer exists
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthError>;

    /// End one session and revoke its refresh binding.
    ///
    /// # Arguments
    /// * `session_id` - Session to end
    ///
    /// # Returns
    /// `AlreadyRevoked` when the session had ended before; not an error
    ///
    /// # Errors
    /// * `InvalidToken` - Session does not exist
    async fn logout(&self, session_id: &SessionId) -> Result<RevokeOutcome, AuthError>;

    /// End every session of a user.
    ///
    /// # Arguments
    /// * `user_id` - Owner of the sessions
    ///
    /// # Returns
    /// Number of sessions ended by this call
    async fn logout_all(&self, user_id: &UserId) -> Result<u64, AuthError>;

    /// Create an unverified account and send the verification link.
    ///
    /// An account whose verification token cannot be issued is removed again.
    ///
    /// # Arguments
    /// * `command` - Username, email, password and the site to link back to
    ///
    /// # Returns
    /// The created user; verification is always required
    ///
    /// # Errors
    /// * `Validation` - Malformed username, email, or password
    /// * `RegistrationFailed` - Username or email already registered
    async fn register(&self, command: RegisterCommand) -> Result<RegistrationResult, AuthError>;

    /// Redeem an email verification token.
    ///
    /// # Arguments
    /// * `token` - Secret from the verification link
    ///
    /// # Returns
    /// `true` once the address is verified
    ///
    /// # Errors
    /// * `VerificationFailed` - Token is invalid, expired, or already used
    async fn verify_email(&self, token: &str) -> Result<bool, AuthError>;

    /// Send a reset link if the account exists. Unknown accounts succeed
    /// silently.
    ///
    /// # Arguments
    /// * `email_or_username` - Account identifier
    /// * `website` - Base URL for the link in the email
    async fn initiate_password_reset(
        &self,
        email_or_username: &str,
        website: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Set a new password, clear lockout and end every session.
    ///
    /// # Arguments
    /// * `token` - Secret from the reset link
    /// * `new_password` - Replacement password
    ///
    /// # Errors
    /// * `Validation` - New password violates the password policy
    /// * `VerificationFailed` - Token is invalid, expired, or already used
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError>;

    /// Invite an email address to register.
    ///
    /// # Arguments
    /// * `inviter` - Authenticated user sending the invite
    /// * `email` - Address to invite
    /// * `website` - Base URL for the link in the email
    ///
    /// # Errors
    /// * `Validation` - Malformed email address
    /// * `RegistrationFailed` - Address already belongs to an account
    async fn send_invite(
        &self,
        inviter: &UserId,
        email: &str,
        website: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Create a verified account for the invited address.
    ///
    /// The invite is only used up once the account exists.
    ///
    /// # Arguments
    /// * `command` - Invite secret, chosen username and password
    ///
    /// # Returns
    /// The created user, already verified
    ///
    /// # Errors
    /// * `VerificationFailed` - Invite is invalid, expired, or already used
    /// * `Validation` / `RegistrationFailed` - As for [`register`](Self::register)
    async fn accept_invite(
        &self,
        command: AcceptInviteCommand,
    ) -> Result<RegistrationResult, AuthError>;

    /// Verify an access token and require its session to be usable.
    ///
    /// # Arguments
    /// * `access_token` - Signed access token presented by the caller
    ///
    /// # Returns
    /// Claims of the token
    ///
    /// # Errors
    /// * `InvalidToken` - Token is forged, expired, or malformed
    /// * `SessionExpired` - Session behind the token has ended
    async fn authorize(&self, access_token: &str) -> Result<AccessClaims, AuthError>;

    /// Verify an access token and resolve its session, which may have ended.
    ///
    /// Lets a caller end a session its token names even after the session
    /// was already revoked.
    ///
    /// # Arguments
    /// * `access_token` - Signed access token presented by the caller
    ///
    /// # Returns
    /// Claims of the token
    ///
    /// # Errors
    /// * `InvalidToken` - Token is forged, expired, malformed, or names an unknown session
    async fn identify(&self, access_token: &str) -> Result<AccessClaims, AuthError>;

    /// Retrieve the account behind an authenticated caller.
    ///
    /// # Arguments
    /// * `user_id` - User ID from the access token
    ///
    /// # Errors
    /// * `UserNotFound` - Account does not exist
    async fn current_user(&self, user_id: &UserId) -> Result<User, AuthError>;
}

/// Outbound delivery of emails carrying verification links.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    /// Hand one message to the delivery pipeline.
    ///
    /// # Arguments
    /// * `recipient` - Email address of the recipient
    /// * `template` - Message kind to render
    /// * `payload` - Template variables
    async fn send(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        payload: Value,
    ) -> Result<(), NotificationError>;
}

#[async_trait]
impl NotificationDispatcher for Box<dyn NotificationDispatcher> {
    async fn send(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        payload: Value,
    ) -> Result<(), NotificationError> {
        (**self).send(recipient, template, payload).await
    }
}
