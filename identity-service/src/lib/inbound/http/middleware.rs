use axum::extract::Request;
use axum::extract::State;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use super::handlers::ApiError;
use super::handlers::FailureKind;
use crate::domain::auth::models::AccessClaims;
use crate::domain::session::models::SessionId;
use crate::domain::user::models::UserId;
use crate::inbound::http::router::AppState;

/// Extension type to store the authenticated caller in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub username: String,
}

/// Middleware that validates the access token and its session, then adds
/// the caller to request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req).map_err(IntoResponse::into_response)?;

    let claims = state.auth_service.authorize(token).await.map_err(|e| {
        tracing::warn!("Access token rejected: {}", e);
        ApiError::from(e).into_response()
    })?;

    attach_caller(&mut req, claims);
    Ok(next.run(req).await)
}

/// Like [`authenticate`], but also admits tokens whose session has ended.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req).map_err(IntoResponse::into_response)?;

    let claims = state.auth_service.identify(token).await.map_err(|e| {
        tracing::warn!("Access token rejected: {}", e);
        ApiError::from(e).into_response()
    })?;

    attach_caller(&mut req, claims);
    Ok(next.run(req).await)
}

fn attach_caller(req: &mut Request, claims: AccessClaims) {
    let username = claims.username.unwrap_or_else(|| "unknown".to_string());

    req.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.user_id,
        session_id: claims.session_id,
        username,
    });
}

fn extract_token_from_header(req: &Request) -> Result<&str, ApiError> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;

    auth_str.strip_prefix("Bearer ").ok_or_else(|| {
        unauthorized("Invalid Authorization header format. Expected: Bearer <token>")
    })
}

fn unauthorized(message: &str) -> ApiError {
    ApiError::Unauthorized(FailureKind::InvalidToken, message.to_string())
}
