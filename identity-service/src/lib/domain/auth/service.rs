use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use auth::PasswordHasher;
use chrono::Duration;
use chrono::Utc;
use serde_json::json;
use serde_json::Value;

use crate::auth::errors::AuthError;
use crate::auth::errors::RegistrationFailure;
use crate::auth::errors::VerificationFailure;
use crate::auth::ports::AuthServicePort;
use crate::auth::ports::NotificationDispatcher;
use crate::credential::ports::CredentialRepository;
use crate::credential::service::CredentialValidator;
use crate::domain::auth::issuer::TokenIssuer;
use crate::domain::auth::models::notification_link;
use crate::domain::auth::models::AcceptInviteCommand;
use crate::domain::auth::models::AccessClaims;
use crate::domain::auth::models::AuthSettings;
use crate::domain::auth::models::LoginFailureReason;
use crate::domain::auth::models::LoginResult;
use crate::domain::auth::models::NotificationTemplate;
use crate::domain::auth::models::RefreshResult;
use crate::domain::auth::models::RegisterCommand;
use crate::domain::auth::models::RegistrationResult;
use crate::domain::auth::models::TokenPair;
use crate::domain::credential::models::CredentialOutcome;
use crate::domain::session::models::RevokeOutcome;
use crate::domain::session::models::Session;
use crate::domain::session::models::SessionEnd;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Identifier;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::verification::models::OwnerRef;
use crate::domain::verification::models::VerificationKind;
use crate::domain::verification::models::VerificationToken;
use crate::domain::verification::models::VerificationTokenId;
use crate::session::ports::SessionRepository;
use crate::session::service::SessionStore;
use crate::user::ports::SettingsRepository;
use crate::user::ports::UserRepository;
use crate::verification::errors::VerificationError;
use crate::verification::ports::VerificationTokenRepository;
use crate::verification::service::VerificationTokenManager;

/// Adapters the auth service is wired with.
pub struct AuthPorts<UR, CR, SR, VR, ST, ND> {
    pub users: Arc<UR>,
    pub credentials: Arc<CR>,
    pub sessions: Arc<SR>,
    pub verification_tokens: Arc<VR>,
    pub user_settings: Arc<ST>,
    pub dispatcher: Arc<ND>,
}

/// Domain service implementation of [`AuthServicePort`].
///
/// Composes credential validation, the session store, verification tokens
/// and the token issuer. Every storage call is bounded by
/// `settings.operation_timeout`.
pub struct AuthService<UR, CR, SR, VR, ST, ND>
where
    UR: UserRepository,
    CR: CredentialRepository,
    SR: SessionRepository,
    VR: VerificationTokenRepository,
    ST: SettingsRepository,
    ND: NotificationDispatcher,
{
    users: Arc<UR>,
    user_settings: Arc<ST>,
    credentials: CredentialValidator<CR>,
    sessions: SessionStore<SR>,
    verification_tokens: VerificationTokenManager<VR>,
    dispatcher: Arc<ND>,
    issuer: TokenIssuer,
    password_hasher: PasswordHasher,
    settings: AuthSettings,
}

impl<UR, CR, SR, VR, ST, ND> AuthService<UR, CR, SR, VR, ST, ND>
where
    UR: UserRepository,
    CR: CredentialRepository,
    SR: SessionRepository,
    VR: VerificationTokenRepository,
    ST: SettingsRepository,
    ND: NotificationDispatcher,
{
    /// Create a new auth service with injected dependencies.
    ///
    /// # Arguments
    /// * `ports` - Persistence and notification adapters
    /// * `issuer` - Signs and verifies the token pair
    /// * `settings` - Lifetimes, lockout policy and timeouts
    pub fn new(
        ports: AuthPorts<UR, CR, SR, VR, ST, ND>,
        issuer: TokenIssuer,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users: ports.users,
            user_settings: ports.user_settings,
            credentials: CredentialValidator::new(ports.credentials, settings.lockout),
            sessions: SessionStore::new(ports.sessions, Duration::days(settings.refresh_ttl_days)),
            verification_tokens: VerificationTokenManager::new(ports.verification_tokens),
            dispatcher: ports.dispatcher,
            issuer,
            password_hasher: PasswordHasher::new(),
            settings,
        }
    }

    /// Run `future` under the operation timeout.
    async fn within<F, T>(&self, operation: &'static str, future: F) -> Result<T, AuthError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.settings.operation_timeout, future)
            .await
            .map_err(|_| {
                tracing::error!(operation, "Storage operation timed out");
                AuthError::Timeout
            })
    }

    /// Bind a fresh refresh secret to the session and sign a pair for it.
    ///
    /// `expected` is the binding the session must still hold; the swap fails
    /// if the session ended in the meantime.
    async fn bind_new_pair(
        &self,
        user: &User,
        session_id: &SessionId,
        expected: Option<VerificationTokenId>,
    ) -> Result<TokenPair, AuthError> {
        let binding = self
            .within(
                "issue_refresh_binding",
                self.verification_tokens.issue(
                    OwnerRef::from(session_id),
                    VerificationKind::RefreshPair,
                    Duration::days(self.settings.refresh_ttl_days),
                ),
            )
            .await??;

        let tokens = self.issuer.issue(user, session_id, &binding.token)?;

        self.within(
            "rotate_session",
            self.sessions
                .rotate(session_id, expected.as_ref(), &binding.record.id),
        )
        .await?
        .map_err(|e| {
            tracing::info!(session_id = %session_id, "Session rotation refused: {}", e);
            AuthError::from(e)
        })?;

        Ok(tokens)
    }

    async fn find_by_identifier(&self, raw: &str) -> Result<Option<User>, AuthError> {
        let user = match Identifier::parse(raw) {
            Some(Identifier::Username(username)) => {
                self.within("find_user", self.users.find_by_username(&username))
                    .await??
            }
            Some(Identifier::Email(email)) => {
                self.within("find_user", self.users.find_by_email(&email))
                    .await??
            }
            None => None,
        };
        Ok(user)
    }

    async fn peek_token(
        &self,
        token: &str,
        kind: VerificationKind,
    ) -> Result<VerificationToken, AuthError> {
        self.within("peek_token", self.verification_tokens.peek(token, kind))
            .await?
            .map_err(|e| rejected(kind, e))
    }

    async fn consume_token(
        &self,
        token: &str,
        kind: VerificationKind,
    ) -> Result<OwnerRef, AuthError> {
        self.within("consume_token", self.verification_tokens.consume(token, kind))
            .await?
            .map_err(|e| rejected(kind, e))
    }

    async fn issue_token(
        &self,
        owner: OwnerRef,
        kind: VerificationKind,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let issued = self
            .within("issue_token", self.verification_tokens.issue(owner, kind, ttl))
            .await??;
        Ok(issued.token)
    }

    /// Dispatch a notification; failures are logged and swallowed.
    async fn notify(&self, recipient: &EmailAddress, template: NotificationTemplate, payload: Value) {
        let sent = self
            .within(
                "send_notification",
                self.dispatcher.send(recipient.as_str(), template, payload),
            )
            .await;

        match sent {
            Ok(Ok(())) => {
                tracing::debug!(template = template.as_str(), "Notification dispatched")
            }
            Ok(Err(e)) => tracing::error!(
                template = template.as_str(),
                "Failed to dispatch notification: {}",
                e
            ),
            Err(_) => {}
        }
    }

    /// Verify an access token and load the session it names, usable or not.
    async fn session_of(&self, access_token: &str) -> Result<(AccessClaims, Session), AuthError> {
        let claims = self.issuer.verify_access(access_token)?;

        let session = self
            .within("find_session", self.sessions.get(&claims.session_id))
            .await??;
        if session.user_id != claims.user_id {
            return Err(AuthError::InvalidToken);
        }
        Ok((claims, session))
    }

    /// Map a refused refresh binding.
    ///
    /// A binding revoked because its session ended reports the end of the
    /// session; otherwise the token was rotated away or replayed.
    async fn binding_rejected(&self, session_id: &SessionId, error: VerificationError) -> AuthError {
        let error = match error {
            VerificationError::DatabaseError(e) => return AuthError::Storage(e),
            other => other,
        };

        let ended = matches!(
            self.within("find_session", self.sessions.get(session_id)).await,
            Ok(Ok(session)) if !session.is_usable(Utc::now())
        );
        if ended {
            tracing::info!(session_id = %session_id, "Refresh rejected: session ended meanwhile");
            AuthError::SessionExpired
        } else {
            tracing::warn!(session_id = %session_id, "Refresh token replay rejected: {}", error);
            AuthError::InvalidToken
        }
    }

    /// Remove an account whose registration could not be completed.
    async fn discard_user(&self, user_id: &UserId) {
        match self.within("delete_user", self.users.delete(user_id)).await {
            Ok(Ok(())) => tracing::info!(user_id = %user_id, "Incomplete registration rolled back"),
            Ok(Err(e)) => tracing::error!(
                user_id = %user_id,
                "Failed to roll back incomplete registration: {}",
                e
            ),
            Err(_) => {}
        }
    }

    fn parse_new_account(
        &self,
        username: String,
        email: String,
        password: &str,
    ) -> Result<(Username, EmailAddress), AuthError> {
        let username = Username::new(username).map_err(|e| AuthError::Validation(e.to_string()))?;
        let email = EmailAddress::new(email).map_err(|e| AuthError::Validation(e.to_string()))?;
        self.settings.password_policy.check(password)?;
        Ok((username, email))
    }
}

fn rejected(kind: VerificationKind, error: VerificationError) -> AuthError {
    if !matches!(error, VerificationError::DatabaseError(_)) {
        tracing::info!(kind = %kind, "Verification token rejected: {}", error);
    }
    AuthError::from(error)
}

fn owner_user_id(owner: &OwnerRef) -> Result<UserId, AuthError> {
    UserId::from_string(owner.as_str())
        .map_err(|_| AuthError::VerificationFailed(VerificationFailure::Invalid))
}

#[async_trait]
impl<UR, CR, SR, VR, ST, ND> AuthServicePort for AuthService<UR, CR, SR, VR, ST, ND>
where
    UR: UserRepository,
    CR: CredentialRepository,
    SR: SessionRepository,
    VR: VerificationTokenRepository,
    ST: SettingsRepository,
    ND: NotificationDispatcher,
{
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResult, AuthError> {
        let outcome = self
            .within(
                "validate_credentials",
                self.credentials.validate(identifier, password),
            )
            .await??;

        let user_id = match outcome {
            CredentialOutcome::Valid(user_id) => user_id,
            CredentialOutcome::InvalidCredentials { attempts } => {
                tracing::info!(attempts, "Login rejected: wrong password");
                return Ok(LoginResult::failed(
                    LoginFailureReason::InvalidCredentials,
                    attempts,
                ));
            }
            CredentialOutcome::UserNotFound => {
                tracing::info!("Login rejected: unknown account");
                return Ok(LoginResult::failed(LoginFailureReason::UserNotFound, 0));
            }
            CredentialOutcome::Locked { until, attempts } => {
                tracing::warn!(%until, attempts, "Login rejected: account locked");
                return Ok(LoginResult::locked(until, attempts));
            }
        };

        let Some(user) = self
            .within("find_user", self.users.find_by_id(&user_id))
            .await??
        else {
            tracing::warn!(user_id = %user_id, "Credential has no matching user");
            return Ok(LoginResult::failed(LoginFailureReason::UserNotFound, 0));
        };

        let settings = self
            .within("load_settings", self.user_settings.snapshot(&user.id))
            .await??;
        let session = self
            .within("create_session", self.sessions.create(&user.id))
            .await??;
        let tokens = self.bind_new_pair(&user, &session.id, None).await?;

        tracing::info!(user_id = %user.id, session_id = %session.id, "User logged in");
        Ok(LoginResult::succeeded(session.id, tokens, user, settings))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthError> {
        let claims = self.issuer.verify_refresh(refresh_token)?;

        let session = self
            .within("find_session", self.sessions.get(&claims.session_id))
            .await??;
        if session.user_id != claims.user_id {
            return Err(AuthError::InvalidToken);
        }
        if !session.is_usable(Utc::now()) {
            tracing::info!(session_id = %session.id, "Refresh rejected: session has ended");
            return Err(AuthError::SessionExpired);
        }

        let binding = match self
            .within(
                "peek_refresh_binding",
                self.verification_tokens
                    .peek(&claims.token_id, VerificationKind::RefreshPair),
            )
            .await?
        {
            Ok(binding) => binding,
            Err(e) => return Err(self.binding_rejected(&session.id, e).await),
        };
        if binding.owner != OwnerRef::from(&session.id)
            || session.verification_token != Some(binding.id)
        {
            tracing::warn!(session_id = %session.id, "Refresh token is not bound to its session");
            return Err(AuthError::InvalidToken);
        }

        if let Err(e) = self
            .within(
                "consume_refresh_binding",
                self.verification_tokens
                    .consume(&claims.token_id, VerificationKind::RefreshPair),
            )
            .await?
        {
            return Err(self.binding_rejected(&session.id, e).await);
        }

        let user = self
            .within("find_user", self.users.find_by_id(&claims.user_id))
            .await??
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.user_id, "Refresh for a deleted account");
                AuthError::RefreshFailed
            })?;

        let tokens = self
            .bind_new_pair(&user, &session.id, Some(binding.id))
            .await?;

        tracing::debug!(user_id = %user.id, session_id = %session.id, "Session refreshed");
        Ok(RefreshResult {
            session_id: session.id,
            tokens,
            user,
        })
    }

    async fn logout(&self, session_id: &SessionId) -> Result<RevokeOutcome, AuthError> {
        let outcome = self
            .within(
                "revoke_session",
                self.sessions.revoke(session_id, SessionEnd::LoggedOut),
            )
            .await??;

        if outcome == RevokeOutcome::Revoked {
            self.within(
                "revoke_refresh_binding",
                self.verification_tokens
                    .revoke_outstanding(&OwnerRef::from(session_id), VerificationKind::RefreshPair),
            )
            .await??;
            tracing::info!(session_id = %session_id, "User logged out");
        }

        Ok(outcome)
    }

    async fn logout_all(&self, user_id: &UserId) -> Result<u64, AuthError> {
        Ok(self
            .within("revoke_all_sessions", self.sessions.revoke_all(user_id))
            .await??)
    }

    async fn register(&self, command: RegisterCommand) -> Result<RegistrationResult, AuthError> {
        let (username, email) =
            self.parse_new_account(command.username, command.email, &command.password)?;
        let password_hash = self.password_hasher.hash(&command.password)?;

        let user = self
            .within(
                "create_user",
                self.users
                    .create(User::register(username, email, password_hash, false)),
            )
            .await?
            .map_err(|e| {
                tracing::info!("Registration refused: {}", e);
                AuthError::from(e)
            })?;

        let issued = self
            .issue_token(
                OwnerRef::from(&user.id),
                VerificationKind::EmailVerify,
                self.settings.email_verify_ttl,
            )
            .await;
        let token = match issued {
            Ok(token) => token,
            Err(e) => {
                self.discard_user(&user.id).await;
                return Err(e);
            }
        };
        self.notify(
            &user.email,
            NotificationTemplate::EmailVerification,
            json!({
                "username": user.username.as_str(),
                "token": token,
                "link": notification_link(command.website.as_deref(), "verify-user", &token),
            }),
        )
        .await;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(RegistrationResult {
            user,
            verification_required: true,
        })
    }

    async fn verify_email(&self, token: &str) -> Result<bool, AuthError> {
        let owner = self
            .consume_token(token, VerificationKind::EmailVerify)
            .await?;
        let user_id = owner_user_id(&owner)?;

        self.within("mark_email_verified", self.users.mark_email_verified(&user_id))
            .await??;

        tracing::info!(user_id = %user_id, "Email address verified");
        Ok(true)
    }

    async fn initiate_password_reset(
        &self,
        email_or_username: &str,
        website: Option<&str>,
    ) -> Result<(), AuthError> {
        let Some(user) = self.find_by_identifier(email_or_username).await? else {
            tracing::info!("Password reset requested for unknown account");
            return Ok(());
        };

        let token = self
            .issue_token(
                OwnerRef::from(&user.id),
                VerificationKind::PasswordReset,
                self.settings.password_reset_ttl,
            )
            .await?;
        self.notify(
            &user.email,
            NotificationTemplate::PasswordReset,
            json!({
                "username": user.username.as_str(),
                "token": token,
                "link": notification_link(website, "reset-password", &token),
            }),
        )
        .await;

        tracing::info!(user_id = %user.id, "Password reset initiated");
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.settings.password_policy.check(new_password)?;
        let password_hash = self.password_hasher.hash(new_password)?;

        let owner = self
            .consume_token(token, VerificationKind::PasswordReset)
            .await?;
        let user_id = owner_user_id(&owner)?;

        self.within(
            "update_password",
            self.users.update_password(&user_id, &password_hash),
        )
        .await??;
        self.within("reset_failures", self.credentials.reset(&user_id))
            .await??;
        let revoked = self
            .within("revoke_all_sessions", self.sessions.revoke_all(&user_id))
            .await??;

        tracing::info!(user_id = %user_id, revoked, "Password reset completed");
        Ok(())
    }

    async fn send_invite(
        &self,
        inviter: &UserId,
        email: &str,
        website: Option<&str>,
    ) -> Result<(), AuthError> {
        let email = EmailAddress::new(email.to_string())
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        let inviter = self
            .within("find_user", self.users.find_by_id(inviter))
            .await??
            .ok_or(AuthError::UserNotFound)?;

        if self
            .within("find_user", self.users.find_by_email(&email))
            .await??
            .is_some()
        {
            return Err(AuthError::RegistrationFailed(RegistrationFailure::EmailTaken));
        }

        let token = self
            .issue_token(
                OwnerRef::from(&email),
                VerificationKind::Invite,
                self.settings.invite_ttl,
            )
            .await?;
        self.notify(
            &email,
            NotificationTemplate::Invite,
            json!({
                "invitedBy": inviter.username.as_str(),
                "token": token,
                "link": notification_link(website, "accept-invite", &token),
            }),
        )
        .await;

        tracing::info!(inviter = %inviter.id, "Invite sent");
        Ok(())
    }

    async fn accept_invite(
        &self,
        command: AcceptInviteCommand,
    ) -> Result<RegistrationResult, AuthError> {
        let invite = self
            .peek_token(&command.token, VerificationKind::Invite)
            .await?;
        let (username, email) = self.parse_new_account(
            command.username,
            invite.owner.as_str().to_string(),
            &command.password,
        )?;

        // Refuse before the invite is burned
        if self
            .within("find_user", self.users.find_by_username(&username))
            .await??
            .is_some()
        {
            return Err(AuthError::RegistrationFailed(
                RegistrationFailure::UsernameTaken,
            ));
        }
        let password_hash = self.password_hasher.hash(&command.password)?;

        // The unique email keeps concurrent accepts of one invite to a single account
        let user = self
            .within(
                "create_user",
                self.users
                    .create(User::register(username, email, password_hash, true)),
            )
            .await??;
        if let Err(e) = self
            .consume_token(&command.token, VerificationKind::Invite)
            .await
        {
            self.discard_user(&user.id).await;
            return Err(e);
        }

        tracing::info!(user_id = %user.id, "Invite accepted");
        Ok(RegistrationResult {
            user,
            verification_required: false,
        })
    }

    async fn authorize(&self, access_token: &str) -> Result<AccessClaims, AuthError> {
        let (claims, session) = self.session_of(access_token).await?;
        session.ensure_usable(Utc::now())?;

        Ok(claims)
    }

    async fn identify(&self, access_token: &str) -> Result<AccessClaims, AuthError> {
        let (claims, _) = self.session_of(access_token).await?;
        Ok(claims)
    }

    async fn current_user(&self, user_id: &UserId) -> Result<User, AuthError> {
        self.within("find_user", self.users.find_by_id(user_id))
            .await??
            .ok_or(AuthError::UserNotFound)
    }
}
