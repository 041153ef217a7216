//! `GET /v1/models` (spec.md §6). The gateway presents itself as a single
//! "virtual model" — the catalog of real upstream models it might route to
//! is internal and only surfaced on `/diagnostics`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::json;

use super::AppState;

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "object": "list",
        "data": [{
            "id": state.public_model_id,
            "object": "model",
            "created": 0,
            "owned_by": "gateway",
        }]
    }))
}
