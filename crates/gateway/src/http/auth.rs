//! Bearer-token authentication middleware (spec.md §6 "Authentication").
//!
//! A configurable list of API keys; an empty list disables auth entirely.
//! Runs only in front of `/v1/*` — liveness/readiness/metrics must keep
//! working even with bad or missing credentials.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use gateway_common::GatewayError;

use super::error::ApiError;
use super::AppState;

pub async fn require_bearer_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.api_keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header) = header else {
        return Err(ApiError(GatewayError::AuthRequired));
    };

    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(ApiError(GatewayError::AuthRequired));
    };

    if !state.api_keys.iter().any(|k| k == token) {
        return Err(ApiError(GatewayError::AuthRejected));
    }

    Ok(next.run(request).await)
}
