use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::session::models::RevokeOutcome;
use crate::domain::session::models::Session;
use crate::domain::session::models::SessionEnd;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::UserId;
use crate::domain::verification::models::VerificationTokenId;
use crate::session::errors::SessionError;

/// Persistence operations for sessions.
///
/// Every mutating call is a single atomic step per session id: the usability
/// check and the write happen together, so a revoke is never overwritten by
/// an extension that read the session earlier.
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Persist a new session.
    ///
    /// # Arguments
    /// * `session` - Freshly opened session
    ///
    /// # Returns
    /// Persisted session
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn insert(&self, session: Session) -> Result<Session, SessionError>;

    /// Retrieve a session by identifier.
    ///
    /// # Arguments
    /// * `id` - Session ID
    ///
    /// # Returns
    /// Optional session (None if not found), whatever its status
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find(&self, id: &SessionId) -> Result<Option<Session>, SessionError>;

    /// Move the expiry of a usable session.
    ///
    /// # Arguments
    /// * `id` - Session ID
    /// * `new_expiry` - Expiry to set
    /// * `now` - Time the usability check is made against
    ///
    /// # Returns
    /// Updated session
    ///
    /// # Errors
    /// * `NotFound` - Session does not exist
    /// * `Expired` / `Revoked` - Session is no longer usable
    /// * `DatabaseError` - Database operation failed
    async fn extend(
        &self,
        id: &SessionId,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError>;

    /// Compare-and-set the bound refresh token and extend the expiry.
    ///
    /// # Arguments
    /// * `id` - Session ID
    /// * `expected` - Binding the session must currently hold (None right after login)
    /// * `next` - Binding to install
    /// * `new_expiry` - Expiry to set
    /// * `now` - Time the usability check is made against
    ///
    /// # Returns
    /// Updated session
    ///
    /// # Errors
    /// * `NotFound` - Session does not exist
    /// * `Expired` / `Revoked` - Session is no longer usable
    /// * `TokenMismatch` - Session is bound to a different refresh token
    /// * `DatabaseError` - Database operation failed
    async fn rotate(
        &self,
        id: &SessionId,
        expected: Option<&VerificationTokenId>,
        next: &VerificationTokenId,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Session, SessionError>;

    /// End a session. Idempotent.
    ///
    /// # Arguments
    /// * `id` - Session ID
    /// * `end` - Why the session ends
    /// * `now` - Time recorded as the end of the session
    ///
    /// # Returns
    /// `Revoked` for the call that ended it, `AlreadyRevoked` afterwards
    ///
    /// # Errors
    /// * `NotFound` - Session does not exist
    /// * `DatabaseError` - Database operation failed
    async fn revoke(
        &self,
        id: &SessionId,
        end: SessionEnd,
        now: DateTime<Utc>,
    ) -> Result<RevokeOutcome, SessionError>;

    /// Revoke every live session of a user.
    ///
    /// # Arguments
    /// * `user_id` - Owner of the sessions
    /// * `now` - Time recorded as the end of each session
    ///
    /// # Returns
    /// Number of sessions that were revoked by this call
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn revoke_all(&self, user_id: &UserId, now: DateTime<Utc>)
        -> Result<u64, SessionError>;
}
