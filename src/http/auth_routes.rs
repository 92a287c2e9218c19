//! Mock authentication endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// POST /api/auth/login - exchange credentials for a bearer token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    match state.sessions.login(&request.email, &request.password) {
        Some((token, user)) => {
            tracing::info!(email = %user.email, "login");
            Ok(Json(json!({"token": token, "user": user})))
        }
        None => Err(ApiError::unauthorized("Invalid credentials")),
    }
}

/// POST /api/auth/logout - revoke the presented token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;
    state.sessions.revoke(token);
    Ok(Json(json!({"success": true})))
}

/// GET /api/auth/me - resolve the presented token to its user.
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;
    match state.sessions.user_for_token(token) {
        Some(user) => Ok(Json(json!({"user": user}))),
        None => Err(ApiError::unauthorized("Invalid or expired token")),
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))
}
