use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::verification::models::OwnerRef;
use crate::domain::verification::models::VerificationKind;
use crate::domain::verification::models::VerificationToken;
use crate::domain::verification::models::VerificationTokenId;
use crate::verification::errors::VerificationError;

/// Persistence operations for verification tokens.
#[async_trait]
pub trait VerificationTokenRepository: Send + Sync + 'static {
    /// Persist a new token record.
    ///
    /// # Arguments
    /// * `token` - Record holding the digest of the secret, never the secret
    ///
    /// # Returns
    /// Persisted record
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn insert(&self, token: VerificationToken)
        -> Result<VerificationToken, VerificationError>;

    /// Retrieve a token by the digest of its secret.
    ///
    /// # Arguments
    /// * `token_hash` - Hex SHA-256 digest of the presented secret
    ///
    /// # Returns
    /// Optional record (None if no token has this digest), whatever its state
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, VerificationError>;

    /// Atomically flip a pending, unexpired, unrevoked token to completed.
    ///
    /// # Arguments
    /// * `id` - Token record ID
    /// * `now` - Time the expiry is checked against
    ///
    /// # Returns
    /// `true` for exactly one caller per token, `false` for everyone else
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn complete(
        &self,
        id: &VerificationTokenId,
        now: DateTime<Utc>,
    ) -> Result<bool, VerificationError>;

    /// Revoke every still-pending token of `kind` owned by `owner`.
    ///
    /// # Arguments
    /// * `owner` - User, session, or invited email the tokens belong to
    /// * `kind` - Purpose of the tokens to revoke
    /// * `now` - Time of the revocation
    ///
    /// # Returns
    /// Number of tokens revoked
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn revoke_outstanding(
        &self,
        owner: &OwnerRef,
        kind: VerificationKind,
        now: DateTime<Utc>,
    ) -> Result<u64, VerificationError>;
}
