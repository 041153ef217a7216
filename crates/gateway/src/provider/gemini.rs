//! Gemini transport (Provider Router, C4).
//!
//! Google's OpenAI-compatible endpoint speaks the exact same chat-completions
//! wire format as OpenAI, so this module only supplies Gemini's defaults and
//! the `gemini/openai/<model>` call-name rewrite; the actual HTTP mechanics
//! are shared with `openai.rs`.

use serde_json::{Map, Value};

use gateway_common::GatewayError;

use super::openai::{self, ChatOutcome};
use super::types::{ChatMessage, EmbeddingResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// `true` for model names starting with `gemini` or `openai/gemini`
/// (case-insensitive) — spec.md §4.3 "Model-name policy".
pub fn is_gemini_model(model: &str) -> bool {
    let lower = model.to_ascii_lowercase();
    lower.starts_with("gemini") || lower.starts_with("openai/gemini")
}

/// The model name to place in the outgoing request body. When the configured
/// Gemini base URL routes through an `/openai`-shaped path and the model
/// isn't already `openai/`-prefixed, the call name gets that prefix while the
/// credential-selection / `used_model` name stays the original.
pub fn call_model_for(model: &str, base_url: &str) -> String {
    if !base_url.to_ascii_lowercase().contains("/openai") {
        return model.to_string();
    }
    if model.starts_with("openai/") {
        model.to_string()
    } else {
        format!("openai/{model}")
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn send_chat_completion(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    messages: &[ChatMessage],
    stream: bool,
    passthrough: Option<&Map<String, Value>>,
) -> Result<ChatOutcome, GatewayError> {
    let call_model = call_model_for(model, base_url);
    openai::send_chat_completion(
        http,
        base_url,
        api_key,
        &call_model,
        model,
        messages,
        stream,
        passthrough,
    )
    .await
}

pub async fn send_embedding(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    input_text: &str,
) -> Result<EmbeddingResponse, GatewayError> {
    let call_model = call_model_for(model, base_url);
    openai::send_embedding(http, base_url, api_key, &call_model, model, input_text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_gemini_models_case_insensitively() {
        assert!(is_gemini_model("gemini-2.5-pro"));
        assert!(is_gemini_model("GEMINI-2.5-pro"));
        assert!(is_gemini_model("openai/gemini-2.5-pro"));
        assert!(!is_gemini_model("gpt-5.2"));
    }

    #[test]
    fn rewrites_call_model_only_for_openai_shaped_base_url() {
        assert_eq!(
            call_model_for("gemini-2.5-pro", DEFAULT_BASE_URL),
            "openai/gemini-2.5-pro"
        );
        assert_eq!(
            call_model_for("openai/gemini-2.5-pro", DEFAULT_BASE_URL),
            "openai/gemini-2.5-pro"
        );
        assert_eq!(
            call_model_for(
                "gemini-2.5-pro",
                "https://generativelanguage.googleapis.com/v1beta"
            ),
            "gemini-2.5-pro"
        );
    }
}
