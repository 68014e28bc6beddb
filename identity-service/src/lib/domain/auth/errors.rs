use auth::JwtError;
use auth::PasswordError;
use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;

use crate::credential::errors::CredentialError;
use crate::session::errors::SessionError;
use crate::user::errors::UserError;
use crate::verification::errors::VerificationError;

/// Why a registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationFailure {
    UsernameTaken,
    EmailTaken,
}

/// Why a verification token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    Expired,
    AlreadyUsed,
    Invalid,
}

/// Failures reported by the auth service.
///
/// Everything except `Storage` and `Internal` is an expected outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Registration failed: {0:?}")]
    RegistrationFailed(RegistrationFailure),

    #[error("Verification failed: {0:?}")]
    VerificationFailed(VerificationFailure),

    /// The session cannot be refreshed any more; the client must log in again
    #[error("Refresh failed")]
    RefreshFailed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<VerificationError> for AuthError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::Invalid => {
                AuthError::VerificationFailed(VerificationFailure::Invalid)
            }
            VerificationError::Expired => {
                AuthError::VerificationFailed(VerificationFailure::Expired)
            }
            VerificationError::AlreadyUsed => {
                AuthError::VerificationFailed(VerificationFailure::AlreadyUsed)
            }
            VerificationError::DatabaseError(e) => AuthError::Storage(e),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::NotFound(_) | SessionError::TokenMismatch(_) => AuthError::InvalidToken,
            SessionError::Expired(_) | SessionError::Revoked(_) => AuthError::SessionExpired,
            SessionError::DatabaseError(e) => AuthError::Storage(e),
        }
    }
}

impl From<UserError> for AuthError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::InvalidUserId(_) => AuthError::InvalidToken,
            UserError::InvalidUsername(e) => AuthError::Validation(e.to_string()),
            UserError::InvalidEmail(e) => AuthError::Validation(e.to_string()),
            UserError::NotFound(_) => AuthError::UserNotFound,
            UserError::UsernameAlreadyExists(_) => {
                AuthError::RegistrationFailed(RegistrationFailure::UsernameTaken)
            }
            UserError::EmailAlreadyExists(_) => {
                AuthError::RegistrationFailed(RegistrationFailure::EmailTaken)
            }
            UserError::DatabaseError(e) => AuthError::Storage(e),
        }
    }
}

impl From<CredentialError> for AuthError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::CorruptHash(e) => AuthError::Internal(e),
            CredentialError::NotFound(_) => AuthError::UserNotFound,
            CredentialError::DatabaseError(e) => AuthError::Storage(e),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(error: PasswordError) -> Self {
        match error {
            PasswordError::TooShort { .. } | PasswordError::TooLong { .. } => {
                AuthError::Validation(error.to_string())
            }
            PasswordError::HashingFailed(e) | PasswordError::VerificationFailed(e) => {
                AuthError::Internal(e)
            }
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(error: JwtError) -> Self {
        match error {
            JwtError::EncodingFailed(e) => AuthError::Internal(e),
            JwtError::DecodingFailed(_) | JwtError::TokenExpired | JwtError::InvalidToken(_) => {
                AuthError::InvalidToken
            }
        }
    }
}

/// Error for notification delivery; never surfaces past the auth service.
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Failed to serialize notification: {0}")]
    SerializationFailed(String),

    #[error("Failed to deliver notification: {0}")]
    DeliveryFailed(String),
}
