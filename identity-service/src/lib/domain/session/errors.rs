use thiserror::Error;

/// Error for session store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session expired: {0}")]
    Expired(String),

    #[error("Session revoked: {0}")]
    Revoked(String),

    /// The session is bound to a different refresh token than presented
    #[error("Refresh token no longer bound to session: {0}")]
    TokenMismatch(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
