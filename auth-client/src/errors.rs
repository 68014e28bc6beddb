use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The session could not be refreshed and was torn down
    #[error("Refresh failed, log in again")]
    RefreshFailed,

    /// Gave up waiting for another request's refresh
    #[error("Timed out waiting for token refresh")]
    Timeout,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status: {0}")]
    Status(u16),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ClientError::Status(status.as_u16()),
            None => ClientError::Http(e.to_string()),
        }
    }
}
