//! Memory Deduplicator (C11, spec.md §4.9 "Memory writer").
//!
//! Pure, storage-agnostic half of the dedup invariant: given the active
//! (non-tombstoned) memories for a `(user_id, domain)`, find one whose
//! `normalized_summary` matches a candidate. The memory writer issues the
//! same check as a database-level `ON CONFLICT` upsert in production; this
//! module exists so the matching rule itself is unit-tested independently of
//! Postgres (module map "C11 ... unit-tested independently").

use gateway_common::{normalize_summary, MemoryRecordRow};

pub fn find_duplicate<'a>(
    existing: &'a [MemoryRecordRow],
    candidate_summary: &str,
) -> Option<&'a MemoryRecordRow> {
    let wanted = normalize_summary(candidate_summary);
    existing
        .iter()
        .find(|m| !m.tombstoned && m.normalized_summary == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gateway_common::{MemoryId, SpecialistDomain, UserId};

    fn row(id: &str, summary: &str, tombstoned: bool) -> MemoryRecordRow {
        MemoryRecordRow {
            id: MemoryId(id.to_string()),
            user_id: UserId::from("alice"),
            domain: SpecialistDomain::Health,
            title: "t".into(),
            summary: summary.to_string(),
            narrative: "n".into(),
            confidence: 0.5,
            tags: vec![],
            archived: false,
            tombstoned,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by_agent: "state-pipeline".into(),
            last_updated_by_agent: "state-pipeline".into(),
            normalized_summary: normalize_summary(summary),
        }
    }

    #[test]
    fn finds_match_regardless_of_casing_and_punctuation() {
        let existing = vec![row("mem_1", "Prefers short workouts!", false)];
        let found = find_duplicate(&existing, "prefers   short workouts");
        assert!(found.is_some());
    }

    #[test]
    fn ignores_tombstoned_entries() {
        let existing = vec![row("mem_1", "prefers short workouts", true)];
        assert!(find_duplicate(&existing, "prefers short workouts").is_none());
    }

    #[test]
    fn no_match_for_distinct_summary() {
        let existing = vec![row("mem_1", "prefers short workouts", false)];
        assert!(find_duplicate(&existing, "enjoys long runs").is_none());
    }
}
