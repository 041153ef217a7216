//! Wire-adjacent types shared by the `openai` and `gemini` transports
//! (Provider Router, C4). The gateway is a pass-through proxy, not a tool-
//! calling agent, so a chat message only needs `role` + `content` typed; any
//! other field the client sent (`name`, `tool_calls`, ...) is preserved via
//! `extra` and re-serialized untouched (spec.md §6 "extra fields are
//! preserved and passed through").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(Value::String(text.into())),
            extra: HashMap::new(),
        }
    }
}

/// Outcome of a single successful provider call. `raw` is the full upstream
/// JSON body, kept as a `Value` so fields the gateway doesn't understand are
/// still forwarded to the client untouched.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub used_model: String,
    pub raw: Value,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub used_model: String,
    pub vector: Vec<f64>,
}
