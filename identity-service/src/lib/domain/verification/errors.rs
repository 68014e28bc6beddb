use thiserror::Error;

/// Error for verification token operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// Unknown token, wrong kind, or revoked
    #[error("Verification token is invalid")]
    Invalid,

    #[error("Verification token has expired")]
    Expired,

    #[error("Verification token was already used")]
    AlreadyUsed,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
