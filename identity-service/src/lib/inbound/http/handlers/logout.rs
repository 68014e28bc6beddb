use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

/// End the caller's session. A `sessionId` in the body must name that
/// session. The token of an already-ended session is accepted, so logging
/// out twice answers 204 both times.
pub async fn logout(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    body: Option<Json<LogoutRequestBody>>,
) -> Result<StatusCode, ApiError> {
    if let Some(Json(LogoutRequestBody {
        session_id: Some(session_id),
    })) = body
    {
        if session_id != caller.session_id.to_string() {
            return Err(ApiError::Forbidden(
                "Cannot end another session".to_string(),
            ));
        }
    }

    state.auth_service.logout(&caller.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<ApiSuccess<LogoutAllResponseData>, ApiError> {
    let revoked = state.auth_service.logout_all(&caller.user_id).await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        LogoutAllResponseData { revoked },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequestBody {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutAllResponseData {
    pub revoked: u64,
}
