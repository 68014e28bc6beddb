use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::router::AppState;

/// Always accepted, whether or not the account exists.
pub async fn initiate_password_reset(
    State(state): State<AppState>,
    Json(body): Json<InitiatePasswordResetRequestBody>,
) -> Result<ApiSuccess<InitiatePasswordResetResponseData>, ApiError> {
    state
        .auth_service
        .initiate_password_reset(&body.email_or_username, body.website.as_deref())
        .await?;

    Ok(ApiSuccess::new(
        StatusCode::ACCEPTED,
        InitiatePasswordResetResponseData { accepted: true },
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequestBody>,
) -> Result<ApiSuccess<ResetPasswordResponseData>, ApiError> {
    state
        .auth_service
        .reset_password(&body.token, &body.new_password)
        .await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ResetPasswordResponseData { reset: true },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePasswordResetRequestBody {
    email_or_username: String,
    #[serde(default)]
    website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitiatePasswordResetResponseData {
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequestBody {
    token: String,
    new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetPasswordResponseData {
    pub reset: bool,
}
