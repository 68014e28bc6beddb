use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::session::models::SessionId;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::UserId;
use crate::verification::errors::VerificationError;

/// Single-use token record. Only the SHA-256 digest of the secret is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationToken {
    pub id: VerificationTokenId,
    pub owner: OwnerRef,
    pub kind: VerificationKind,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub completed: bool,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Classify the token at `now`.
    ///
    /// A consumed token reports `AlreadyUsed` even past its expiry.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), VerificationError> {
        if self.completed {
            Err(VerificationError::AlreadyUsed)
        } else if self.revoked {
            Err(VerificationError::Invalid)
        } else if now >= self.expires_at {
            Err(VerificationError::Expired)
        } else {
            Ok(())
        }
    }

    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.check(now).is_ok()
    }

    /// Compare-and-set `completed`; returns whether this call won.
    ///
    /// Repositories call this while holding the per-token lock.
    pub fn try_complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_pending(now) {
            self.completed = true;
            true
        } else {
            false
        }
    }
}

/// Verification token unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerificationTokenId(pub Uuid);

impl VerificationTokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VerificationTokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VerificationTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Flow a verification token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationKind {
    EmailVerify,
    PasswordReset,
    Invite,
    /// Binding between a session and its current refresh token
    RefreshPair,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::EmailVerify => "email_verify",
            VerificationKind::PasswordReset => "password_reset",
            VerificationKind::Invite => "invite",
            VerificationKind::RefreshPair => "refresh_pair",
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationKind {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_verify" => Ok(VerificationKind::EmailVerify),
            "password_reset" => Ok(VerificationKind::PasswordReset),
            "invite" => Ok(VerificationKind::Invite),
            "refresh_pair" => Ok(VerificationKind::RefreshPair),
            other => Err(VerificationError::DatabaseError(format!(
                "unknown verification kind: {}",
                other
            ))),
        }
    }
}

/// Opaque reference to whatever a token was issued for: a user, a session
/// or an invited email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerRef(String);

impl OwnerRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&UserId> for OwnerRef {
    fn from(id: &UserId) -> Self {
        Self(id.to_string())
    }
}

impl From<&SessionId> for OwnerRef {
    fn from(id: &SessionId) -> Self {
        Self(id.to_string())
    }
}

impl From<&EmailAddress> for OwnerRef {
    fn from(email: &EmailAddress) -> Self {
        Self(email.as_str().to_string())
    }
}

/// Freshly issued token: the raw secret for the recipient plus the stored record.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub record: VerificationToken,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn pending(expires_in: Duration) -> VerificationToken {
        let now = Utc::now();
        VerificationToken {
            id: VerificationTokenId::new(),
            owner: OwnerRef::new("owner"),
            kind: VerificationKind::PasswordReset,
            token_hash: "hash".to_string(),
            expires_at: now + expires_in,
            completed: false,
            revoked: false,
            created_at: now,
        }
    }

    #[test]
    fn test_check_classification() {
        let now = Utc::now();
        assert!(pending(Duration::hours(1)).check(now).is_ok());
        assert_eq!(
            pending(Duration::zero()).check(now + Duration::seconds(1)),
            Err(VerificationError::Expired)
        );

        let mut used = pending(Duration::hours(1));
        used.completed = true;
        used.expires_at = now - Duration::hours(1);
        assert_eq!(used.check(now), Err(VerificationError::AlreadyUsed));

        let mut revoked = pending(Duration::hours(1));
        revoked.revoked = true;
        assert_eq!(revoked.check(now), Err(VerificationError::Invalid));
    }

    #[test]
    fn test_try_complete_only_once() {
        let now = Utc::now();
        let mut token = pending(Duration::hours(1));

        assert!(token.try_complete(now));
        assert!(!token.try_complete(now));
        assert!(token.completed);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            VerificationKind::EmailVerify,
            VerificationKind::PasswordReset,
            VerificationKind::Invite,
            VerificationKind::RefreshPair,
        ] {
            assert_eq!(kind.as_str().parse::<VerificationKind>().unwrap(), kind);
        }
        assert!("session".parse::<VerificationKind>().is_err());
    }
}
