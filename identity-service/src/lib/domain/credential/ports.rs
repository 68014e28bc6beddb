use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::credential::errors::CredentialError;
use crate::domain::credential::models::AttemptState;
use crate::domain::credential::models::Credential;
use crate::domain::credential::models::LockoutPolicy;
use crate::domain::user::models::Identifier;
use crate::domain::user::models::UserId;

/// Storage of password hashes and per-account failure counters.
///
/// Counter updates are atomic per user: concurrent failures never lose an
/// increment and never skip the lockout transition.
#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    /// Look up the credential behind a username or email.
    ///
    /// # Arguments
    /// * `identifier` - Parsed username or email address
    ///
    /// # Returns
    /// Optional credential with its failure counters (None if no such account)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<Credential>, CredentialError>;

    /// Atomically apply [`AttemptState::register_failure`] to the stored state.
    ///
    /// # Arguments
    /// * `user_id` - Account that failed to authenticate
    /// * `policy` - Threshold and cooldown to apply
    /// * `now` - Time of the failed attempt
    ///
    /// # Returns
    /// The state after the update
    ///
    /// # Errors
    /// * `NotFound` - No credential for this user
    /// * `DatabaseError` - Database operation failed
    async fn record_failure(
        &self,
        user_id: &UserId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<AttemptState, CredentialError>;

    /// Clear the failure counter and any lockout window.
    ///
    /// # Arguments
    /// * `user_id` - Account to reset
    ///
    /// # Errors
    /// * `NotFound` - No credential for this user
    /// * `DatabaseError` - Database operation failed
    async fn reset_failures(&self, user_id: &UserId) -> Result<(), CredentialError>;
}
