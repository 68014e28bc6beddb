use thiserror::Error;

/// Infrastructure failures while validating credentials.
///
/// Wrong passwords and unknown users are outcomes, not errors.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("Stored password hash is unusable: {0}")]
    CorruptHash(String),

    #[error("Credential not found for user {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
