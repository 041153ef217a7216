//! Diagnostics endpoints (spec.md §6): `/healthz` (always 200), `/readyz`
//! (200 iff the state store is ready or disabled), `/diagnostics`
//! (configured models, resolved prompt files, schema version, pending
//! migrations).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    match &state.state_store {
        None => StatusCode::OK,
        Some(store) if store.status().ready => StatusCode::OK,
        Some(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn diagnostics(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let state_status = state
        .state_store
        .as_ref()
        .map(|s| serde_json::to_value(s.status()).unwrap_or(serde_json::Value::Null));

    Json(json!({
        "public_model_id": state.public_model_id,
        "classifier_model": state.classifier_model,
        "specialist_models": state.specialist_models,
        "fallback_models": state.candidate_models,
        "prompt_files": state.prompts.resolved_prompt_files(),
        "state": state_status,
        "projection_mode": state.projection_mode_label,
    }))
}
