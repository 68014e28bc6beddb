use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::user::models::UserId;
use crate::domain::verification::models::VerificationTokenId;
use crate::session::errors::SessionError;

/// Server-side record of one login.
///
/// Sessions are never deleted; they end by being revoked or by expiring.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    /// Refresh token currently bound to the session
    pub verification_token: Option<VerificationTokenId>,
    pub expires_at: DateTime<Utc>,
    /// Set when the owner logged out
    pub complete: bool,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle position of a session at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Expired,
    Revoked,
    LoggedOut,
}

/// How a session was ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The owner logged out of this session
    LoggedOut,
    /// Ended on the owner's behalf (logout everywhere, password reset)
    Revoked,
}

/// Result of a revoke call; revoking twice is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
}

impl Session {
    pub fn open(user_id: UserId, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            verification_token: None,
            expires_at,
            complete: false,
            revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.complete {
            SessionStatus::LoggedOut
        } else if self.revoked {
            SessionStatus::Revoked
        } else if now >= self.expires_at {
            SessionStatus::Expired
        } else {
            SessionStatus::Active
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == SessionStatus::Active
    }

    /// Error describing why this session refused an update, if it did.
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.status(now) {
            SessionStatus::Active => Ok(()),
            SessionStatus::Expired => Err(SessionError::Expired(self.id.to_string())),
            SessionStatus::Revoked | SessionStatus::LoggedOut => {
                Err(SessionError::Revoked(self.id.to_string()))
            }
        }
    }

    /// Apply a rotation if the session is usable and still bound to
    /// `expected`.
    ///
    /// Repositories call this while holding the per-session lock.
    pub fn apply_rotation(
        &mut self,
        expected: Option<&VerificationTokenId>,
        next: &VerificationTokenId,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.ensure_usable(now)?;
        if self.verification_token.as_ref() != expected {
            return Err(SessionError::TokenMismatch(self.id.to_string()));
        }
        self.verification_token = Some(*next);
        self.expires_at = new_expiry;
        self.updated_at = now;
        Ok(())
    }

    /// Apply an end-of-session transition; a no-op when already ended.
    pub fn apply_end(&mut self, end: SessionEnd, now: DateTime<Utc>) -> RevokeOutcome {
        if self.revoked {
            return RevokeOutcome::AlreadyRevoked;
        }
        self.revoked = true;
        self.complete = end == SessionEnd::LoggedOut;
        self.updated_at = now;
        RevokeOutcome::Revoked
    }
}

/// Session unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// # Errors
    /// * `NotFound` - Not a valid session identifier (cannot exist)
    pub fn from_string(s: &str) -> Result<Self, SessionError> {
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|_| SessionError::NotFound(s.to_string()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn active_session() -> Session {
        Session::open(UserId::new(), Utc::now() + Duration::hours(1))
    }

    #[test]
    fn test_status_transitions() {
        let now = Utc::now();
        let mut session = active_session();
        assert_eq!(session.status(now), SessionStatus::Active);
        assert_eq!(
            session.status(session.expires_at),
            SessionStatus::Expired
        );

        assert_eq!(session.apply_end(SessionEnd::LoggedOut, now), RevokeOutcome::Revoked);
        assert_eq!(session.status(now), SessionStatus::LoggedOut);
        assert_eq!(
            session.apply_end(SessionEnd::LoggedOut, now),
            RevokeOutcome::AlreadyRevoked
        );
    }

    #[test]
    fn test_rotation_requires_expected_binding() {
        let now = Utc::now();
        let mut session = active_session();
        let first = VerificationTokenId::new();
        let second = VerificationTokenId::new();

        session
            .apply_rotation(None, &first, now + Duration::hours(2), now)
            .unwrap();
        assert_eq!(session.verification_token, Some(first));

        let replay = session.apply_rotation(None, &second, now + Duration::hours(2), now);
        assert!(matches!(replay, Err(SessionError::TokenMismatch(_))));
        assert_eq!(session.verification_token, Some(first));
    }

    #[test]
    fn test_rotation_refused_after_revoke() {
        let now = Utc::now();
        let mut session = active_session();
        let expires_at = session.expires_at;
        session.apply_end(SessionEnd::Revoked, now);

        let result =
            session.apply_rotation(None, &VerificationTokenId::new(), now + Duration::days(1), now);
        assert!(matches!(result, Err(SessionError::Revoked(_))));
        assert_eq!(session.expires_at, expires_at);
    }
}
