use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::router::AppState;

pub async fn verify_user(
    State(state): State<AppState>,
    Query(query): Query<VerifyUserQuery>,
) -> Result<ApiSuccess<VerifyUserResponseData>, ApiError> {
    let verified = state.auth_service.verify_email(&query.token).await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        VerifyUserResponseData { verified },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifyUserQuery {
    token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyUserResponseData {
    pub verified: bool,
}
