use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::register::RegistrationResponseData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::models::AcceptInviteCommand;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

pub async fn send_invite(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Json(body): Json<SendInviteRequestBody>,
) -> Result<ApiSuccess<SendInviteResponseData>, ApiError> {
    state
        .auth_service
        .send_invite(&caller.user_id, &body.email, body.website.as_deref())
        .await?;

    Ok(ApiSuccess::new(
        StatusCode::ACCEPTED,
        SendInviteResponseData { invited: true },
    ))
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Json(body): Json<AcceptInviteRequestBody>,
) -> Result<ApiSuccess<RegistrationResponseData>, ApiError> {
    let command = AcceptInviteCommand {
        token: body.token,
        username: body.username,
        password: body.password,
    };

    state
        .auth_service
        .accept_invite(command)
        .await
        .map_err(ApiError::from)
        .map(|ref result| ApiSuccess::new(StatusCode::CREATED, result.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendInviteRequestBody {
    email: String,
    #[serde(default)]
    website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendInviteResponseData {
    pub invited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AcceptInviteRequestBody {
    token: String,
    username: String,
    password: String,
}
