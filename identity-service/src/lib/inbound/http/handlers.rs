use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use crate::auth::errors::AuthError;
use crate::auth::errors::RegistrationFailure;
use crate::auth::errors::VerificationFailure;
use crate::domain::user::models::User;

pub mod invites;
pub mod login;
pub mod logout;
pub mod me;
pub mod password_reset;
pub mod refresh_token;
pub mod register;
pub mod verify_user;

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(status, data)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

/// Stable machine-readable failure code returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidCredentials,
    AccountLocked,
    SessionExpired,
    InvalidToken,
    RefreshFailed,
    RegistrationFailed,
    VerificationExpired,
    VerificationAlreadyUsed,
    VerificationInvalid,
    ValidationFailed,
    NotFound,
    Forbidden,
    Timeout,
    ServiceError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InternalServerError(String),
    UnprocessableEntity(String),
    BadRequest(FailureKind, String),
    Unauthorized(FailureKind, String),
    Forbidden(String),
    NotFound(String),
    Conflict(FailureKind, String),
    /// Login refused while the account is locked
    TooManyRequests { retry_after_seconds: i64 },
    GatewayTimeout,
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized(
            FailureKind::InvalidCredentials,
            "Invalid credentials".to_string(),
        )
    }

    pub fn locked_until(until: DateTime<Utc>) -> Self {
        let retry_after_seconds = (until - Utc::now()).num_seconds().max(1);
        ApiError::TooManyRequests {
            retry_after_seconds,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::InternalServerError(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, data) = match self {
            ApiError::InternalServerError(msg) => {
                tracing::error!("Request failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorData::new(FailureKind::ServiceError, "Internal server error"),
                )
            }
            ApiError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorData::new(FailureKind::ValidationFailed, msg),
            ),
            ApiError::BadRequest(kind, msg) => {
                (StatusCode::BAD_REQUEST, ApiErrorData::new(kind, msg))
            }
            ApiError::Unauthorized(kind, msg) => {
                let mut data = ApiErrorData::new(kind, msg);
                if kind == FailureKind::InvalidCredentials {
                    data.to_many = Some(false);
                }
                (StatusCode::UNAUTHORIZED, data)
            }
            ApiError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ApiErrorData::new(FailureKind::Forbidden, msg),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ApiErrorData::new(FailureKind::NotFound, msg),
            ),
            ApiError::Conflict(kind, msg) => (StatusCode::CONFLICT, ApiErrorData::new(kind, msg)),
            ApiError::TooManyRequests {
                retry_after_seconds,
            } => {
                let mut data = ApiErrorData::new(
                    FailureKind::AccountLocked,
                    "Too many failed attempts, try again later",
                );
                data.to_many = Some(true);
                data.retry_after_seconds = Some(retry_after_seconds);
                (StatusCode::TOO_MANY_REQUESTS, data)
            }
            ApiError::GatewayTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                ApiErrorData::new(FailureKind::Timeout, "The request timed out"),
            ),
        };

        (status, Json(ApiResponseBody::new(status, data))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::invalid_credentials(),
            AuthError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            AuthError::AccountLocked { until } => ApiError::locked_until(until),
            AuthError::SessionExpired => ApiError::Unauthorized(
                FailureKind::SessionExpired,
                "Session has expired".to_string(),
            ),
            AuthError::InvalidToken => {
                ApiError::Unauthorized(FailureKind::InvalidToken, "Invalid token".to_string())
            }
            AuthError::RefreshFailed => ApiError::Unauthorized(
                FailureKind::RefreshFailed,
                "Session can no longer be refreshed".to_string(),
            ),
            AuthError::RegistrationFailed(reason) => {
                let message = match reason {
                    RegistrationFailure::UsernameTaken => "Username is already taken",
                    RegistrationFailure::EmailTaken => "Email address is already registered",
                };
                ApiError::Conflict(FailureKind::RegistrationFailed, message.to_string())
            }
            AuthError::VerificationFailed(reason) => {
                let (kind, message) = match reason {
                    VerificationFailure::Expired => {
                        (FailureKind::VerificationExpired, "Link has expired")
                    }
                    VerificationFailure::AlreadyUsed => (
                        FailureKind::VerificationAlreadyUsed,
                        "Link was already used",
                    ),
                    VerificationFailure::Invalid => {
                        (FailureKind::VerificationInvalid, "Link is invalid")
                    }
                };
                ApiError::BadRequest(kind, message.to_string())
            }
            AuthError::Timeout => ApiError::GatewayTimeout,
            AuthError::Validation(msg) => ApiError::UnprocessableEntity(msg),
            AuthError::Storage(_) | AuthError::Internal(_) => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    status_code: u16,
    data: T,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorData {
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_many: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i64>,
}

impl ApiErrorData {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            to_many: None,
            retry_after_seconds: None,
        }
    }
}

/// Public projection of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
            roles: user.roles.clone(),
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_not_leaked() {
        let error = ApiError::from(AuthError::Storage("connection refused".to_string()));
        assert_eq!(
            error,
            ApiError::InternalServerError("Storage error: connection refused".to_string())
        );

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_verification_failures_have_distinct_kinds() {
        assert_eq!(
            ApiError::from(AuthError::VerificationFailed(VerificationFailure::AlreadyUsed)),
            ApiError::BadRequest(
                FailureKind::VerificationAlreadyUsed,
                "Link was already used".to_string()
            )
        );
        assert_eq!(
            ApiError::from(AuthError::VerificationFailed(VerificationFailure::Expired)),
            ApiError::BadRequest(FailureKind::VerificationExpired, "Link has expired".to_string())
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = ApiResponseBody::new(
            StatusCode::TOO_MANY_REQUESTS,
            ApiErrorData {
                to_many: Some(true),
                retry_after_seconds: Some(60),
                ..ApiErrorData::new(FailureKind::AccountLocked, "locked")
            },
        );

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["statusCode"], 429);
        assert_eq!(json["data"]["kind"], "account_locked");
        assert_eq!(json["data"]["toMany"], true);
        assert_eq!(json["data"]["retryAfterSeconds"], 60);
    }
}
