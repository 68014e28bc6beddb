use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::domain::auth::models::RegisterCommand;
use crate::domain::auth::models::RegistrationResult;
use crate::inbound::http::router::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequestBody>,
) -> Result<ApiSuccess<RegistrationResponseData>, ApiError> {
    state
        .auth_service
        .register(body.into())
        .await
        .map_err(ApiError::from)
        .map(|ref result| ApiSuccess::new(StatusCode::CREATED, result.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterRequestBody {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    website: Option<String>,
}

impl From<RegisterRequestBody> for RegisterCommand {
    fn from(body: RegisterRequestBody) -> Self {
        Self {
            username: body.username,
            email: body.email,
            password: body.password,
            website: body.website,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponseData {
    pub user: UserData,
    pub verification_required: bool,
}

impl From<&RegistrationResult> for RegistrationResponseData {
    fn from(result: &RegistrationResult) -> Self {
        Self {
            user: (&result.user).into(),
            verification_required: result.verification_required,
        }
    }
}
