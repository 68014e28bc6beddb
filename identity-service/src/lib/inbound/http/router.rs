use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::invites::accept_invite;
use super::handlers::invites::send_invite;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::logout::logout_all;
use super::handlers::me::me;
use super::handlers::password_reset::initiate_password_reset;
use super::handlers::password_reset::reset_password;
use super::handlers::refresh_token::refresh_token;
use super::handlers::register::register;
use super::handlers::verify_user::verify_user;
use super::middleware::authenticate as auth_middleware;
use super::middleware::identify as identify_middleware;
use crate::domain::auth::ports::AuthServicePort;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthServicePort>,
}

pub fn create_router(auth_service: Arc<dyn AuthServicePort>) -> Router {
    let state = AppState { auth_service };

    let public_routes = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/auth/register", post(register))
        .route("/api/auth/verify-user", get(verify_user))
        .route(
            "/api/auth/password-reset/initiate",
            post(initiate_password_reset),
        )
        .route("/api/auth/password-reset/reset", post(reset_password))
        .route("/api/auth/invites/accept", post(accept_invite));

    // Logout only needs a genuine token; its session may already be over
    let session_routes = Router::new()
        .route("/api/auth/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identify_middleware,
        ));

    let protected_routes = Router::new()
        .route("/api/auth/logout-all", post(logout_all))
        .route("/api/auth/invites", post(send_invite))
        .route("/api/users/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Headers are left out of the span: they carry bearer tokens
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri().path(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
