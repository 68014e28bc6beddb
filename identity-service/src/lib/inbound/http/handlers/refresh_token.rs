use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::inbound::http::router::AppState;

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequestBody>,
) -> Result<ApiSuccess<RefreshTokenResponseData>, ApiError> {
    let refreshed = state.auth_service.refresh(&body.refresh_token).await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        RefreshTokenResponseData {
            access_token: refreshed.tokens.access_token,
            refresh_token: refreshed.tokens.refresh_token,
            access_expires_at: refreshed.tokens.access_expires_at,
            user: (&refreshed.user).into(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequestBody {
    refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponseData {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub user: UserData,
}
