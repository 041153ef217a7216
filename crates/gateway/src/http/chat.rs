//! `POST /v1/chat/completions` (spec.md §6). OpenAI-compatible request body
//! in, Orchestrator (C6) turn out. Buffered replies optionally grow a footer
//! warning from the State Pipeline Coordinator (C13); streaming replies are
//! forwarded byte-for-byte as SSE and the state pipeline gets no assistant
//! text to reason over beyond what streamed, so the turn's `assistant_text`
//! stays empty for those (spec.md Open Question (b)).

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};

use gateway_common::{GatewayError, UserId};

use crate::provider::{ChatMessage, ChatOutcome};

use super::error::ApiError;
use super::AppState;

#[derive(Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

const RESERVED_FIELDS: [&str; 3] = ["model", "messages", "stream"];

fn latest_user_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| message_text(&m.content))
        .unwrap_or_default()
}

fn message_text(content: &Option<Value>) -> String {
    match content {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    if request.model != state.public_model_id && !state.allow_provider_model_passthrough {
        return Err(ApiError(GatewayError::InvalidRequest(format!(
            "unknown model '{}': this gateway serves '{}'",
            request.model, state.public_model_id
        ))));
    }

    let user_id = UserId::from(request.user.clone().unwrap_or_else(|| "anonymous".to_string()));
    let session_key = user_id.as_str().to_string();
    let latest_text = latest_user_text(&request.messages);

    let mut passthrough = request.passthrough.clone();
    passthrough.retain(|k, _| !RESERVED_FIELDS.contains(&k.as_str()) && k != "user");

    let outcome = state
        .orchestrator
        .handle_turn(
            &user_id,
            &session_key,
            request.messages,
            &latest_text,
            request.stream,
            Some(&passthrough),
        )
        .await?;

    match outcome.chat_outcome {
        ChatOutcome::Complete(response) => {
            let mut turn = outcome.turn;
            turn.assistant_text = crate::jsonx::extract_message_text(&response.raw);

            let footer = if let Some(pipeline) = &state.state_pipeline {
                let pipeline = Arc::clone(pipeline);
                let router = Arc::clone(&state.router);
                let turn_for_pipeline = turn.clone();
                let result = pipeline.run(&router, &turn_for_pipeline).await;
                result.footer
            } else {
                None
            };

            let mut body = response.raw;
            if let Some(footer_text) = footer {
                append_footer(&mut body, &footer_text);
            }
            Ok(Json(body).into_response())
        }
        ChatOutcome::Stream { response, .. } => {
            // State-pipeline analysis needs the assistant's final text, which
            // a caller only has once the stream is fully drained on their
            // end — this build does not buffer streamed turns to run the
            // state pipeline against them (spec.md Open Question (b):
            // fallback and pipeline decisions are request-admission only).
            let stream = response.bytes_stream();
            let body = Body::from_stream(stream);
            Ok(Response::builder()
                .header(CONTENT_TYPE, "text/event-stream")
                .body(body)
                .unwrap_or_else(|_| Response::new(Body::empty())))
        }
    }
}

/// Append a human-readable warning to `choices[0].message.content` in a
/// buffered OpenAI-shaped response body. Best-effort: if the shape is
/// unexpected (a malformed upstream reply already surfaced elsewhere), the
/// body is left untouched rather than panicking.
fn append_footer(body: &mut Value, footer: &str) {
    if let Some(content) = body
        .get_mut("choices")
        .and_then(|c| c.get_mut(0))
        .and_then(|c| c.get_mut("message"))
        .and_then(|m| m.get_mut("content"))
    {
        if let Some(text) = content.as_str() {
            *content = Value::String(format!("{text}{footer}"));
        }
    }
}
