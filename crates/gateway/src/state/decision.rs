//! State Decision Engine (C9, spec.md §4.8).
//!
//! Prompts the decision model with turn + context, asks for a JSON object
//! with three optional write slots, and retries on malformed JSON up to
//! `max_json_retries` times. Total failure never fails the turn — it
//! degrades to `StateDecision::failure`, which the coordinator (C13) turns
//! into an optional footer warning.

use serde_json::{Map, Value};

use gateway_common::GatewayError;

use crate::jsonx;
use crate::provider::{ChatMessage, ChatOutcome, ProviderRouter};
use crate::state::context::StateContextSnapshot;

#[derive(Debug, Clone)]
pub struct CheckinDecision {
    pub domain: String,
    pub track_type: String,
    pub title: String,
    pub summary: String,
    pub outcome: String,
    pub confidence: f64,
    pub wins: Vec<String>,
    pub barriers: Vec<String>,
    pub next_actions: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JournalDecision {
    pub title: String,
    pub body_markdown: String,
    pub domain_hints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MemoryDecision {
    pub domain: String,
    pub title: String,
    pub summary: String,
    pub narrative: String,
    pub confidence: f64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StateDecision {
    pub checkin: Option<CheckinDecision>,
    pub journal: Option<JournalDecision>,
    pub memory: Option<MemoryDecision>,
    pub reason: String,
    pub is_failure: bool,
}

impl StateDecision {
    fn failure() -> Self {
        Self {
            checkin: None,
            journal: None,
            memory: None,
            reason: "state-model-unavailable".to_string(),
            is_failure: true,
        }
    }
}

fn system_prompt(context: &StateContextSnapshot) -> String {
    format!(
        "You are the state-tracking policy model. Given the latest turn and recent \
         context, decide whether to record a check-in, a journal entry, and/or a \
         memory. Respond with ONLY a single JSON object, no markdown or commentary.\n\
         JSON schema:\n\
         {{\"checkin\":{{\"write\":bool,\"domain\":str,\"track_type\":\"goal|habit|event\",\
         \"title\":str,\"summary\":str,\"outcome\":\"success|partial|missed|neutral\",\
         \"confidence\":float,\"wins\":[str],\"barriers\":[str],\"next_actions\":[str],\"tags\":[str]}},\
         \"journal\":{{\"write\":bool,\"title\":str,\"body_md\":str,\"domain_hints\":[str]}},\
         \"memory\":{{\"write\":bool,\"domain\":str,\"title\":str,\"summary\":str,\"narrative\":str,\
         \"confidence\":float,\"tags\":[str]}},\"reason\":str}}\n\
         Omit a slot's fields or set write=false when there is nothing worth recording.\n\
         Context:\n{}",
        context.to_prompt_block()
    )
}

fn strings(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn string_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn confidence_field(value: &Value) -> f64 {
    value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

fn parse_checkin(obj: &Map<String, Value>) -> Option<CheckinDecision> {
    let slot = obj.get("checkin")?;
    if !slot.get("write").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    Some(CheckinDecision {
        domain: string_field(slot, "domain"),
        track_type: string_field(slot, "track_type"),
        title: string_field(slot, "title"),
        summary: string_field(slot, "summary"),
        outcome: string_field(slot, "outcome"),
        confidence: confidence_field(slot),
        wins: strings(slot, "wins"),
        barriers: strings(slot, "barriers"),
        next_actions: strings(slot, "next_actions"),
        tags: strings(slot, "tags"),
    })
}

fn parse_journal(obj: &Map<String, Value>) -> Option<JournalDecision> {
    let slot = obj.get("journal")?;
    if !slot.get("write").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    Some(JournalDecision {
        title: string_field(slot, "title"),
        body_markdown: string_field(slot, "body_md"),
        domain_hints: strings(slot, "domain_hints"),
    })
}

fn parse_memory(obj: &Map<String, Value>) -> Option<MemoryDecision> {
    let slot = obj.get("memory")?;
    if !slot.get("write").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    Some(MemoryDecision {
        domain: string_field(slot, "domain"),
        title: string_field(slot, "title"),
        summary: string_field(slot, "summary"),
        narrative: string_field(slot, "narrative"),
        confidence: confidence_field(slot),
        tags: strings(slot, "tags"),
    })
}

fn parse_decision(obj: Map<String, Value>) -> StateDecision {
    let reason = obj.get("reason").and_then(Value::as_str).unwrap_or("").to_string();
    StateDecision {
        checkin: parse_checkin(&obj),
        journal: parse_journal(&obj),
        memory: parse_memory(&obj),
        reason,
        is_failure: false,
    }
}

pub async fn decide(
    router: &ProviderRouter,
    decision_model: &str,
    user_text: &str,
    assistant_text: &str,
    routed_domain: &str,
    context: &StateContextSnapshot,
    max_json_retries: u32,
) -> StateDecision {
    let messages = vec![
        ChatMessage::system(system_prompt(context)),
        turn_message(user_text, assistant_text, routed_domain),
    ];

    let mut passthrough = Map::new();
    passthrough.insert("temperature".into(), 0.0.into());

    for attempt in 0..=max_json_retries {
        let outcome = router
            .chat_completion(decision_model, &messages, false, Some(&passthrough), false)
            .await;

        let text = match outcome {
            Ok(ChatOutcome::Complete(response)) => jsonx::extract_message_text(&response.raw),
            Ok(ChatOutcome::Stream { .. }) => {
                tracing::warn!("decision engine received unexpected stream outcome");
                String::new()
            }
            Err(e) => {
                log_failure(attempt, &e);
                continue;
            }
        };

        match jsonx::extract_json_object(&text) {
            Some(obj) => return parse_decision(obj),
            None => {
                tracing::warn!(attempt, "decision engine reply was not valid JSON, retrying");
                continue;
            }
        }
    }

    StateDecision::failure()
}

fn log_failure(attempt: u32, error: &GatewayError) {
    tracing::warn!(attempt, %error, "decision engine model call failed");
}

fn turn_message(user_text: &str, assistant_text: &str, routed_domain: &str) -> ChatMessage {
    ChatMessage {
        role: "user".to_string(),
        content: Some(Value::String(format!(
            "routed_domain: {routed_domain}\nuser: {user_text}\nassistant: {assistant_text}"
        ))),
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn parses_all_three_slots_when_each_opts_in() {
        let payload = obj(json!({
            "checkin": {"write": true, "domain": "health", "track_type": "goal", "title": "Lose fat",
                        "summary": "Started plan.", "outcome": "partial", "confidence": 0.84,
                        "wins": ["meal prep"], "barriers": ["snacking"], "next_actions": ["prep meals"], "tags": ["fat_loss"]},
            "journal": {"write": true, "title": "Commitment", "body_md": "Today I committed.", "domain_hints": ["health"]},
            "memory": {"write": true, "domain": "health", "title": "Recurring goal", "summary": "re-commits often",
                       "narrative": "pattern", "confidence": 0.79, "tags": ["recurring_goal"]},
            "reason": "explicit_goal_signal"
        }));
        let decision = parse_decision(payload);
        assert!(decision.checkin.is_some());
        assert!(decision.journal.is_some());
        assert!(decision.memory.is_some());
        assert_eq!(decision.reason, "explicit_goal_signal");
        assert!(!decision.is_failure);
    }

    #[test]
    fn write_false_drops_the_slot() {
        let payload = obj(json!({
            "checkin": {"write": true, "domain": "health", "track_type": "goal", "title": "t",
                        "summary": "s", "outcome": "partial", "confidence": 0.7,
                        "wins": [], "barriers": [], "next_actions": [], "tags": []},
            "journal": {"write": false, "title": "", "body_md": "", "domain_hints": []},
            "memory": {"write": false, "domain": "", "title": "", "summary": "", "narrative": "", "confidence": null, "tags": []},
            "reason": "checkin_only"
        }));
        let decision = parse_decision(payload);
        assert!(decision.checkin.is_some());
        assert!(decision.journal.is_none());
        assert!(decision.memory.is_none());
    }

    #[test]
    fn failure_decision_has_all_slots_null() {
        let decision = StateDecision::failure();
        assert!(decision.checkin.is_none());
        assert!(decision.journal.is_none());
        assert!(decision.memory.is_none());
        assert_eq!(decision.reason, "state-model-unavailable");
        assert!(decision.is_failure);
    }

    #[test]
    fn confidence_is_clamped() {
        let payload = obj(json!({
            "memory": {"write": true, "domain": "health", "title": "t", "summary": "s",
                       "narrative": "n", "confidence": 5.0, "tags": []},
            "reason": "x"
        }));
        let decision = parse_decision(payload);
        assert_eq!(decision.memory.unwrap().confidence, 1.0);
    }
}
