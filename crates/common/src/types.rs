//! Data model records shared between the gateway's HTTP layer and its state
//! pipeline (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::SpecialistDomain;
use crate::ids::{CheckInId, JournalId, MemoryId, TurnId, UserId};

/// Immutable record of a single chat-completions turn. Created once the
/// handler has an assistant reply in hand; never mutated afterward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: TurnId,
    pub user_id: UserId,
    pub session_key: String,
    pub routed_domain: SpecialistDomain,
    pub user_text: String,
    pub assistant_text: String,
    pub used_model: String,
    pub request_fingerprint: String,
}

/// Outcome enum for a check-in record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInOutcome {
    Success,
    Partial,
    Missed,
    Neutral,
}

/// What kind of thing the check-in is tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Goal,
    Habit,
    Event,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckInRecord {
    pub id: CheckInId,
    pub user_id: UserId,
    pub turn_id: TurnId,
    pub domain: SpecialistDomain,
    pub track_type: TrackType,
    pub title: String,
    pub summary: String,
    pub outcome: CheckInOutcome,
    /// Clamped to `[0, 1]`.
    pub confidence: f64,
    pub wins: Vec<String>,
    pub barriers: Vec<String>,
    pub next_actions: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub source_model: Option<String>,
    pub idempotency_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalId,
    pub user_id: UserId,
    pub turn_id: TurnId,
    pub title: String,
    pub body_markdown: String,
    pub domain_hints: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub idempotency_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryRecordRow {
    pub id: MemoryId,
    pub user_id: UserId,
    pub domain: SpecialistDomain,
    pub title: String,
    pub summary: String,
    pub narrative: String,
    /// Clamped to `[0, 1]`.
    pub confidence: f64,
    pub tags: Vec<String>,
    pub archived: bool,
    pub tombstoned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_agent: String,
    pub last_updated_by_agent: String,
    /// lowercase, whitespace-collapsed, `[a-z0-9 ]`-only form of `summary`.
    /// The dedup invariant (spec.md §8) is defined over this field.
    pub normalized_summary: String,
}

/// Status of a single writer application (spec.md §4.9 "write summary").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Written,
    Duplicate,
    Rejected,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WriteSummaryItem {
    pub kind: &'static str,
    pub status: WriteStatus,
    pub target: String,
    pub details: Option<String>,
}

/// Normalize a memory summary for the dedup invariant: lowercase, collapse
/// whitespace runs to a single space, strip everything outside `[a-z0-9 ]`.
pub fn normalize_summary(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut collapsed = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            collapsed.push(ch);
            last_was_space = false;
        } else if ch.is_whitespace() {
            if !last_was_space && !collapsed.is_empty() {
                collapsed.push(' ');
            }
            last_was_space = true;
        }
        // Any other punctuation is dropped entirely, matching the
        // `[^a-z0-9 ]` strip in the original curator.
    }
    collapsed.trim_end().to_string()
}

/// Deterministic idempotency key: `sha256(user_id || turn_id || kind)`,
/// hex-encoded (SPEC_FULL.md §3 expansion).
pub fn idempotency_key(user_id: &UserId, turn_id: &TurnId, kind: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(turn_id.to_string().as_bytes());
    hasher.update(kind.as_bytes());
    hex::encode(hasher.finalize())
}

/// Request body passthrough: the raw, as-received JSON object for an
/// incoming `/v1/chat/completions` call. The service preserves unknown
/// fields and forwards them verbatim (spec.md §6).
pub type RawJson = Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_summary_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(
            normalize_summary("  Interested in   Tennis-Elbow!! Rehab.  "),
            "interested in tennis elbow rehab"
        );
    }

    #[test]
    fn idempotency_key_is_deterministic() {
        let user = UserId::from("alice");
        let turn = TurnId::from_uuid(uuid::Uuid::nil());
        let a = idempotency_key(&user, &turn, "checkin");
        let b = idempotency_key(&user, &turn, "checkin");
        let c = idempotency_key(&user, &turn, "journal");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
