//! HTTP surface (spec.md §6 "External interfaces"). Assembles the axum
//! `Router`, the shared `AppState` every handler reads from, and the
//! Prometheus metrics endpoint; request auth is a separate layer applied
//! only in front of `/v1/*` so liveness/readiness/metrics keep working with
//! no credentials at all.

pub mod auth;
pub mod chat;
pub mod diagnostics;
pub mod error;
pub mod models;

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::orchestrator::Orchestrator;
use crate::prompts::PromptRegistry;
use crate::provider::ProviderRouter;
use crate::state::{StatePipelineCoordinator, StateStore};

/// Everything an axum handler might need, shared behind a single `Arc`.
pub struct AppState {
    pub router: Arc<ProviderRouter>,
    pub orchestrator: Arc<Orchestrator>,
    pub prompts: Arc<PromptRegistry>,
    pub metrics_handle: PrometheusHandle,

    pub api_keys: Vec<String>,
    pub public_model_id: String,
    pub allow_provider_model_passthrough: bool,

    /// Diagnostics-only bookkeeping — not read by the hot path.
    pub classifier_model: String,
    pub specialist_models: HashMap<String, String>,
    pub candidate_models: Vec<String>,
    pub projection_mode_label: String,

    pub state_store: Option<Arc<StateStore>>,
    pub state_pipeline: Option<Arc<StatePipelineCoordinator>>,
}

/// Where the diagnostics endpoints are mounted, resolved from
/// `system.diagnostics` (spec.md §6 "path overrides").
pub struct DiagnosticPaths {
    pub health: String,
    pub ready: String,
    pub diagnostics: String,
    pub metrics: String,
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> String {
    state.metrics_handle.render()
}

pub fn build_router(state: Arc<AppState>, diagnostic_paths: &DiagnosticPaths) -> Router {
    let api_routes = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models::list_models))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_auth,
        ));

    let diagnostic_routes = Router::new()
        .route(&diagnostic_paths.health, get(diagnostics::healthz))
        .route(&diagnostic_paths.ready, get(diagnostics::readyz))
        .route(&diagnostic_paths.diagnostics, get(diagnostics::diagnostics))
        .route(&diagnostic_paths.metrics, get(metrics_handler));

    Router::new()
        .merge(api_routes)
        .merge(diagnostic_routes)
        .with_state(state)
}
