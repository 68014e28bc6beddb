use std::collections::BTreeMap;

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
use crate::domain::auth::models::LoginResult;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequestBody>,
) -> Result<ApiSuccess<LoginResponseData>, ApiError> {
    let result = state
        .auth_service
        .login(&body.identifier, &body.password)
        .await?;

    LoginResponseData::try_from(result).map(|data| ApiSuccess::new(StatusCode::OK, data))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestBody {
    identifier: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub success: bool,
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub user: UserData,
    pub settings: BTreeMap<String, String>,
}

impl TryFrom<LoginResult> for LoginResponseData {
    type Error = ApiError;

    /// Failed logins become errors; the failure reason stays internal.
    fn try_from(result: LoginResult) -> Result<Self, Self::Error> {
        if result.to_many {
            if let Some(until) = result.locked_until {
                return Err(ApiError::locked_until(until));
            }
        }

        match (result.success, result.session_id, result.tokens, result.user) {
            (true, Some(session_id), Some(tokens), Some(user)) => Ok(Self {
                success: true,
                session_id: session_id.to_string(),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                access_expires_at: tokens.access_expires_at,
                user: (&user).into(),
                settings: result.settings,
            }),
            _ => Err(ApiError::invalid_credentials()),
        }
    }
}
