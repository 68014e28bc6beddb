use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::user::models::UserId;

/// Stored credential of one account.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub user_id: UserId,
    pub password_hash: String,
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn attempt_state(&self) -> AttemptState {
        AttemptState {
            failed_attempts: self.failed_attempts,
            lockout_until: self.lockout_until,
        }
    }
}

/// Lockout threshold and cool-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that lock the account
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            cooldown: Duration::minutes(15),
        }
    }
}

/// Failure counter and lockout window of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptState {
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl AttemptState {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.map_or(false, |until| now < until)
    }

    /// State after one more failed attempt.
    ///
    /// While locked the state does not change. Once a lockout window has
    /// elapsed the counter starts over; reaching the threshold opens a new
    /// window of `policy.cooldown`.
    pub fn register_failure(self, policy: &LockoutPolicy, now: DateTime<Utc>) -> Self {
        if self.is_locked(now) {
            return self;
        }

        let previous = if self.lockout_until.is_some() {
            0
        } else {
            self.failed_attempts
        };
        let failed_attempts = previous.saturating_add(1);
        let lockout_until = if failed_attempts >= policy.max_attempts {
            Some(now + policy.cooldown)
        } else {
            None
        };

        Self {
            failed_attempts,
            lockout_until,
        }
    }
}

/// Result of checking an identifier/password pair.
///
/// `InvalidCredentials` and `UserNotFound` are kept apart for logging only;
/// callers outside the auth service see the same failure for both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    Valid(UserId),
    InvalidCredentials { attempts: u32 },
    UserNotFound,
    Locked {
        until: DateTime<Utc>,
        attempts: u32,
    },
}
