//! HTTP surface: health, ICE configuration, and account endpoints.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use waypost_protocol::AuthResponse;

use super::AppState;
use crate::auth::AuthError;

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "clients": state.channels.client_count().await,
    }))
}

/// `GET /ice-servers` — the `RTCIceServer` list clients feed to their
/// peer connection.
pub async fn ice_servers(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "iceServers": state.config.ice_servers(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> (StatusCode, Json<AuthResponse>) {
    match state.auth.login(&body.email, &body.password).await {
        Ok((token, user)) => (StatusCode::OK, Json(AuthResponse::ok(user, Some(token)))),
        Err(AuthError::AuthFailed) => (
            StatusCode::UNAUTHORIZED,
            Json(AuthResponse::failed("invalid credentials")),
        ),
        Err(e) => {
            error!(error = %e, "Login failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AuthResponse::failed("login failed")),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterBody>,
) -> (StatusCode, Json<AuthResponse>) {
    match state
        .auth
        .register(&body.email, &body.username, &body.password)
        .await
    {
        Ok((token, user)) => (StatusCode::CREATED, Json(AuthResponse::ok(user, Some(token)))),
        Err(AuthError::Conflict) => (
            StatusCode::BAD_REQUEST,
            Json(AuthResponse::failed("email already registered")),
        ),
        Err(e) => {
            error!(error = %e, "Registration failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AuthResponse::failed("registration failed")),
            )
        }
    }
}

/// `GET /auth/me`
pub async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing bearer token"})),
        )
            .into_response();
    };

    let claims = match state.auth.verify_token(token) {
        Ok(claims) => claims,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid token"})),
            )
                .into_response();
        }
    };

    match state.auth.user_view(&claims.sub).await {
        Ok(Some(user)) => Json(user).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "user not found"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "User lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "lookup failed"})),
            )
                .into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// CORS policy: echo origins from the configured allowlist, or allow
/// everything when `*` is configured.
///
/// `CorsLayer` answers preflights with 200; [`preflight_no_content`] wraps
/// it in the router so `OPTIONS` goes out as 204.
pub fn build_cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins == "*" {
        warn!("CORS: permissive mode (allow all origins)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %s, "Ignoring unparseable allowed origin");
                None
            }
        })
        .collect();

    info!("CORS: restricted to {} origin(s)", origins.len());

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ])
}

/// Rewrite successful `OPTIONS` responses to 204 No Content.
///
/// Layered outside [`build_cors_layer`], so the preflight short-circuit
/// keeps its CORS headers but loses the 200 status.
pub async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
