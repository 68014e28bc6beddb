use std::sync::Arc;

use auth::PasswordHasher;
use chrono::Utc;

use crate::credential::errors::CredentialError;
use crate::credential::ports::CredentialRepository;
use crate::domain::credential::models::CredentialOutcome;
use crate::domain::credential::models::LockoutPolicy;
use crate::domain::user::models::Identifier;
use crate::domain::user::models::UserId;

/// Checks identifier/password pairs and applies the lockout policy.
pub struct CredentialValidator<CR>
where
    CR: CredentialRepository,
{
    repository: Arc<CR>,
    password_hasher: PasswordHasher,
    policy: LockoutPolicy,
}

impl<CR> CredentialValidator<CR>
where
    CR: CredentialRepository,
{
    pub fn new(repository: Arc<CR>, policy: LockoutPolicy) -> Self {
        Self {
            repository,
            password_hasher: PasswordHasher::new(),
            policy,
        }
    }

    /// Validate an identifier (username or email) and password.
    ///
    /// A locked account fails fast without looking at the password. Unknown
    /// identifiers still pay for one Argon2 verification.
    ///
    /// # Errors
    /// * `DatabaseError` - Credential storage failed
    /// * `CorruptHash` - Stored hash could not be parsed
    pub async fn validate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<CredentialOutcome, CredentialError> {
        let credential = match Identifier::parse(identifier) {
            Some(identifier) => self.repository.find_by_identifier(&identifier).await?,
            None => None,
        };

        let Some(credential) = credential else {
            let _ = self.password_hasher.verify_or_decoy(password, None);
            return Ok(CredentialOutcome::UserNotFound);
        };

        let now = Utc::now();
        let state = credential.attempt_state();
        if let Some(until) = state.lockout_until.filter(|_| state.is_locked(now)) {
            return Ok(CredentialOutcome::Locked {
                until,
                attempts: state.failed_attempts,
            });
        }

        let matches = self
            .password_hasher
            .verify(password, &credential.password_hash)
            .map_err(|e| CredentialError::CorruptHash(e.to_string()))?;

        if matches {
            if state.failed_attempts > 0 || state.lockout_until.is_some() {
                self.repository.reset_failures(&credential.user_id).await?;
            }
            return Ok(CredentialOutcome::Valid(credential.user_id));
        }

        let state = self
            .repository
            .record_failure(&credential.user_id, &self.policy, now)
            .await?;

        match state.lockout_until.filter(|_| state.is_locked(now)) {
            Some(until) => {
                tracing::warn!(
                    user_id = %credential.user_id,
                    attempts = state.failed_attempts,
                    "Account locked after repeated login failures"
                );
                Ok(CredentialOutcome::Locked {
                    until,
                    attempts: state.failed_attempts,
                })
            }
            None => Ok(CredentialOutcome::InvalidCredentials {
                attempts: state.failed_attempts,
            }),
        }
    }

    /// Clear failures, e.g. after a successful password reset.
    pub async fn reset(&self, user_id: &UserId) -> Result<(), CredentialError> {
        self.repository.reset_failures(user_id).await
    }
}
