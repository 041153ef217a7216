//! OpenAI chat-completions wire transport (Provider Router, C4).
//!
//! Gemini also speaks this format once routed through Google's
//! OpenAI-compatible endpoint (see `gemini.rs`), so the request/response
//! shapes and the HTTP mechanics live here and are reused by both.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use gateway_common::GatewayError;

use super::types::{ChatMessage, EmbeddingResponse, ProviderResponse};

#[derive(Deserialize)]
struct ChatCompletionBody {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct EmbeddingBody {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f64>,
}

fn build_chat_body(
    model: &str,
    messages: &[ChatMessage],
    stream: bool,
    passthrough: Option<&Map<String, Value>>,
) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), Value::String(model.to_string()));
    body.insert(
        "messages".into(),
        serde_json::to_value(messages).unwrap_or(Value::Array(vec![])),
    );
    body.insert("stream".into(), Value::Bool(stream));
    if let Some(extra) = passthrough {
        for (k, v) in extra {
            body.insert(k.clone(), v.clone());
        }
    }
    Value::Object(body)
}

/// Either a fully-buffered chat completion, or (when `stream=true`) the raw
/// upstream response left intact for the HTTP layer to re-emit as
/// server-sent events. Once the upstream has accepted the request and begun
/// streaming, per-chunk errors are not the Provider Router's concern (spec.md
/// §4.3 "fallback is a request-admission policy only").
pub enum ChatOutcome {
    Complete(ProviderResponse),
    Stream {
        used_model: String,
        response: reqwest::Response,
    },
}

#[allow(clippy::too_many_arguments)]
pub async fn send_chat_completion(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    call_model: &str,
    reported_model: &str,
    messages: &[ChatMessage],
    stream: bool,
    passthrough: Option<&Map<String, Value>>,
) -> Result<ChatOutcome, GatewayError> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    let body = build_chat_body(call_model, messages, stream, passthrough);

    let start = std::time::Instant::now();
    let response = http
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| GatewayError::ProviderExhausted(format!("request failed: {e}")))?;

    let status = response.status();
    metrics::histogram!("provider.chat.latency", "model" => reported_model.to_string())
        .record(start.elapsed().as_secs_f64());

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = parse_error_message(&text);
        metrics::counter!("provider.chat.errors", "model" => reported_model.to_string())
            .increment(1);
        return Err(GatewayError::ProviderExhausted(format!(
            "{status}: {message}"
        )));
    }

    if stream {
        return Ok(ChatOutcome::Stream {
            used_model: reported_model.to_string(),
            response,
        });
    }

    let text = response
        .text()
        .await
        .map_err(|e| GatewayError::MalformedUpstreamResponse(e.to_string()))?;
    let raw: Value = serde_json::from_str(&text)
        .map_err(|e| GatewayError::MalformedUpstreamResponse(format!("invalid JSON body: {e}")))?;
    let parsed: ChatCompletionBody = serde_json::from_str(&text)
        .map_err(|e| GatewayError::MalformedUpstreamResponse(format!("unexpected shape: {e}")))?;
    let usage = parsed.usage.unwrap_or_default();

    metrics::counter!("provider.chat.input_tokens", "model" => reported_model.to_string())
        .increment(usage.prompt_tokens);
    metrics::counter!("provider.chat.output_tokens", "model" => reported_model.to_string())
        .increment(usage.completion_tokens);

    let _ = parsed.model;
    Ok(ChatOutcome::Complete(ProviderResponse {
        used_model: reported_model.to_string(),
        raw,
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }))
}

pub async fn send_embedding(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    call_model: &str,
    reported_model: &str,
    input_text: &str,
) -> Result<EmbeddingResponse, GatewayError> {
    let url = format!("{}/embeddings", base_url.trim_end_matches('/'));
    let mut body = HashMap::new();
    body.insert("model", Value::String(call_model.to_string()));
    body.insert("input", Value::String(input_text.to_string()));

    let response = http
        .post(&url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| GatewayError::ProviderExhausted(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(GatewayError::ProviderExhausted(format!(
            "{status}: {}",
            parse_error_message(&text)
        )));
    }

    let body: EmbeddingBody = response
        .json()
        .await
        .map_err(|e| GatewayError::MalformedUpstreamResponse(e.to_string()))?;
    let vector = body
        .data
        .into_iter()
        .next()
        .map(|item| item.embedding)
        .unwrap_or_default();
    if vector.is_empty() {
        return Err(GatewayError::MalformedUpstreamResponse(
            "embedding vector is missing or empty".into(),
        ));
    }

    Ok(EmbeddingResponse {
        used_model: reported_model.to_string(),
        vector,
    })
}

fn parse_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e.error.message,
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_chat_body_includes_passthrough_fields() {
        let mut extra = Map::new();
        extra.insert("temperature".into(), Value::from(0.2));
        let messages = vec![ChatMessage::system("be terse")];
        let body = build_chat_body("gpt-5.2", &messages, false, Some(&extra));
        assert_eq!(body["model"], "gpt-5.2");
        assert_eq!(body["stream"], false);
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn parse_error_message_falls_back_to_raw_body() {
        assert_eq!(parse_error_message("not json"), "not json");
        assert_eq!(
            parse_error_message(r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
    }
}
