//! Tolerant JSON extraction shared by the Specialist Classifier (C5) and the
//! State Decision Engine (C9): strip an optional fenced code block, else take
//! the substring between the first `{` and the last `}`, then parse. Any
//! failure returns `None` rather than propagating an error — both callers
//! treat a malformed reply as "model said nothing useful," not a crash.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("static regex is valid")
    })
}

/// Extract the raw JSON text a model reply is expected to contain.
fn extract_json_text(text: &str) -> Option<String> {
    let candidate = text.trim();
    if let Some(caps) = fenced_block_re().captures(candidate) {
        return Some(caps[1].trim().to_string());
    }
    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(candidate[start..=end].to_string())
}

/// Extract and parse a JSON object from free-form model text. Returns `None`
/// on any failure (no fences, unbalanced braces, invalid JSON, or a JSON
/// value that isn't an object).
pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let candidate = extract_json_text(text)?;
    match serde_json::from_str::<Value>(&candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Best-effort extraction of the assistant message text from a chat
/// completion response body (`choices[0].message.content`), tolerating both
/// plain-string and content-block-array shapes.
pub fn extract_message_text(raw: &Value) -> String {
    let content = &raw["choices"][0]["message"]["content"];
    if let Some(s) = content.as_str() {
        return s.trim().to_string();
    }
    if let Some(parts) = content.as_array() {
        let joined: Vec<String> = parts
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        return joined.join("\n");
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_fenced_code_block() {
        let text = "Sure, here:\n```json\n{\"specialist\":\"health\"}\n```\nThanks.";
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["specialist"], "health");
    }

    #[test]
    fn extracts_from_bare_braces_when_no_fence() {
        let text = "blah {\"a\":1,\"b\":2} blah";
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["a"], 1);
    }

    #[test]
    fn returns_none_on_unparseable_text() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("{not json}").is_none());
    }

    #[test]
    fn extracts_plain_string_message_text() {
        let raw = json!({"choices": [{"message": {"content": "  hello  "}}]});
        assert_eq!(extract_message_text(&raw), "hello");
    }

    #[test]
    fn extracts_content_block_array_message_text() {
        let raw = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "part one"},
            {"type": "text", "text": "part two"}
        ]}}]});
        assert_eq!(extract_message_text(&raw), "part one\npart two");
    }
}
