//! Specialist Classifier (C5, spec.md §4.4).
//!
//! Asks the classifier model to pick exactly one specialist domain for the
//! latest user message. Never fails the turn: any problem — empty input, a
//! malformed reply, an unreachable model — degrades to `general` with a
//! reason string explaining why.

use serde_json::Map;

use gateway_common::SpecialistDomain;

use crate::jsonx;
use crate::provider::{ChatMessage, ChatOutcome, ProviderRouter};

#[derive(Debug, Clone)]
pub struct ClassifierResult {
    pub domain: SpecialistDomain,
    pub confidence: f64,
    pub reason: String,
    pub classifier_model: Option<String>,
}

impl ClassifierResult {
    fn general(reason: impl Into<String>, classifier_model: Option<String>) -> Self {
        Self {
            domain: SpecialistDomain::General,
            confidence: 0.0,
            reason: reason.into(),
            classifier_model,
        }
    }
}

fn system_prompt() -> String {
    let specialist_lines = SpecialistDomain::ALL
        .iter()
        .map(|d| format!("- {}: {}", d.as_str(), d.routing_hint()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are the routing classifier for this assistant.\n\
         Your job: choose exactly ONE specialist for the latest user message.\n\
         Always respond with ONLY a single JSON object and nothing else.\n\
         Do not include markdown, code fences, commentary, or extra keys.\n\
         JSON schema:\n\
         {{\"specialist\":\"<one of allowed domains>\",\"confidence\":<float 0..1>,\"reason\":\"<short reason>\"}}\n\
         If unsure, choose general.\n\
         Allowed specialists:\n\
         {specialist_lines}"
    )
}

/// Classify `latest_user_text` into one specialist domain. Calls the
/// classifier model with `temperature=0.0`, `max_tokens=classifier_max_tokens`
/// (spec.md §4.4 "≈120"), no fallbacks.
pub async fn classify(
    router: &ProviderRouter,
    classifier_model: &str,
    latest_user_text: &str,
    classifier_max_tokens: u32,
) -> ClassifierResult {
    let user_text = latest_user_text.trim();
    if user_text.is_empty() {
        return ClassifierResult::general("empty-user-message", None);
    }

    let messages = vec![
        ChatMessage::system(system_prompt()),
        user_message(user_text),
    ];

    let mut passthrough = Map::new();
    passthrough.insert("temperature".into(), 0.0.into());
    passthrough.insert("max_tokens".into(), classifier_max_tokens.into());

    let outcome = router
        .chat_completion(classifier_model, &messages, false, Some(&passthrough), false)
        .await;

    match outcome {
        Ok(ChatOutcome::Complete(response)) => {
            let text = jsonx::extract_message_text(&response.raw);
            let payload = jsonx::extract_json_object(&text).unwrap_or_default();
            parse_payload(payload, Some(response.used_model))
        }
        Ok(ChatOutcome::Stream { used_model, .. }) => {
            // The classifier never requests a stream; treat it as a bug in
            // the caller rather than pretending to classify.
            ClassifierResult::general(
                "classifier-error:unexpected-stream",
                Some(used_model),
            )
        }
        Err(e) => ClassifierResult::general(format!("classifier-error:{}", e.error_type()), None),
    }
}

fn user_message(text: &str) -> ChatMessage {
    ChatMessage {
        role: "user".to_string(),
        content: Some(serde_json::Value::String(text.to_string())),
        extra: Default::default(),
    }
}

fn parse_payload(payload: Map<String, serde_json::Value>, classifier_model: Option<String>) -> ClassifierResult {
    let raw_specialist = payload
        .get("specialist")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let domain = match gateway_common::parse_domain_strict(raw_specialist) {
        Some(domain) => domain,
        None => return ClassifierResult::general("invalid-specialist", classifier_model),
    };

    let confidence = payload
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    let reason = payload
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    ClassifierResult {
        domain,
        confidence,
        reason,
        classifier_model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_map(value: serde_json::Value) -> Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn parses_well_formed_payload() {
        let payload = payload_map(json!({"specialist": "health", "confidence": 0.92, "reason": "symptoms"}));
        let result = parse_payload(payload, Some("gpt-5-nano".into()));
        assert_eq!(result.domain, SpecialistDomain::Health);
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.reason, "symptoms");
    }

    #[test]
    fn clamps_out_of_range_confidence() {
        let payload = payload_map(json!({"specialist": "homelab", "confidence": 5.0, "reason": ""}));
        let result = parse_payload(payload, None);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn missing_specialist_key_falls_back_to_general() {
        let payload = payload_map(json!({"confidence": 0.8}));
        let result = parse_payload(payload, None);
        assert_eq!(result.domain, SpecialistDomain::General);
        assert_eq!(result.reason, "invalid-specialist");
    }

    #[tokio::test]
    async fn empty_user_text_short_circuits_without_calling_model() {
        let router = ProviderRouter::new(
            reqwest::Client::new(),
            crate::provider::ProviderCredentials {
                api_key: "unused".into(),
                base_url: "https://unused.example".into(),
            },
            crate::provider::ProviderCredentials {
                api_key: "unused".into(),
                base_url: "https://unused.example".into(),
            },
            vec![],
        );
        let result = classify(&router, "gpt-5-nano", "   ", 120).await;
        assert_eq!(result.domain, SpecialistDomain::General);
        assert_eq!(result.reason, "empty-user-message");
    }
}
