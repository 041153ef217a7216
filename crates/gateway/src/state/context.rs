//! State Context Fetcher (C8, spec.md §4.7).
//!
//! Produces a read-only snapshot of recent user state for the Decision
//! Engine: the last `K` check-ins for this user/domain, recent journal
//! titles, and the active (non-tombstoned) memory summaries in the routed
//! domain. Never blocks writers — plain `SELECT`s, no locks held.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use gateway_common::{GatewayError, SpecialistDomain, UserId};

#[derive(Debug, Clone)]
pub struct RecentCheckIn {
    pub title: String,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActiveMemory {
    pub id: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default)]
pub struct StateContextSnapshot {
    pub recent_checkins: Vec<RecentCheckIn>,
    pub recent_journal_titles: Vec<String>,
    pub active_memories: Vec<ActiveMemory>,
}

/// Fetch the decision-engine context for `user_id`/`domain`. `checkin_limit`
/// and `journal_limit` bound how far back each recency window looks
/// (SPEC_FULL.md §4.13 safety limits: `max_context_checkins`,
/// `max_context_journal_titles`).
pub async fn fetch_context(
    pool: &PgPool,
    user_id: &UserId,
    domain: SpecialistDomain,
    checkin_limit: i64,
    journal_limit: i64,
) -> Result<StateContextSnapshot, GatewayError> {
    let checkin_rows = sqlx::query(
        "SELECT title, outcome, created_at FROM checkins
         WHERE user_id = $1 AND domain = $2
         ORDER BY created_at DESC
         LIMIT $3",
    )
    .bind(user_id.as_str())
    .bind(domain.as_str())
    .bind(checkin_limit)
    .fetch_all(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("context fetch (checkins) failed: {e}")))?;

    let recent_checkins = checkin_rows
        .into_iter()
        .map(|row| RecentCheckIn {
            title: row.get("title"),
            outcome: row.get("outcome"),
            created_at: row.get("created_at"),
        })
        .collect();

    let journal_rows = sqlx::query(
        "SELECT title FROM journal_entries
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2",
    )
    .bind(user_id.as_str())
    .bind(journal_limit)
    .fetch_all(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("context fetch (journal) failed: {e}")))?;

    let recent_journal_titles = journal_rows.into_iter().map(|row| row.get("title")).collect();

    let memory_rows = sqlx::query(
        "SELECT id, summary FROM memories
         WHERE user_id = $1 AND domain = $2 AND NOT tombstoned
         ORDER BY updated_at DESC",
    )
    .bind(user_id.as_str())
    .bind(domain.as_str())
    .fetch_all(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("context fetch (memories) failed: {e}")))?;

    let active_memories = memory_rows
        .into_iter()
        .map(|row| ActiveMemory {
            id: row.get("id"),
            summary: row.get("summary"),
        })
        .collect();

    Ok(StateContextSnapshot {
        recent_checkins,
        recent_journal_titles,
        active_memories,
    })
}

impl StateContextSnapshot {
    /// Render a compact text block for the Decision Engine's prompt.
    pub fn to_prompt_block(&self) -> String {
        let mut lines = Vec::new();

        lines.push("Recent check-ins:".to_string());
        if self.recent_checkins.is_empty() {
            lines.push("  (none)".to_string());
        } else {
            for c in &self.recent_checkins {
                lines.push(format!("  - {} [{}] ({})", c.title, c.outcome, c.created_at.format("%Y-%m-%d")));
            }
        }

        lines.push("Recent journal entries:".to_string());
        if self.recent_journal_titles.is_empty() {
            lines.push("  (none)".to_string());
        } else {
            for title in &self.recent_journal_titles {
                lines.push(format!("  - {title}"));
            }
        }

        lines.push("Active memories:".to_string());
        if self.active_memories.is_empty() {
            lines.push("  (none)".to_string());
        } else {
            for m in &self.active_memories {
                lines.push(format!("  - [{}] {}", m.id, m.summary));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_renders_none_placeholders() {
        let snapshot = StateContextSnapshot::default();
        let block = snapshot.to_prompt_block();
        assert!(block.contains("Recent check-ins:\n  (none)"));
        assert!(block.contains("Active memories:\n  (none)"));
    }

    #[test]
    fn populated_snapshot_renders_each_section() {
        let snapshot = StateContextSnapshot {
            recent_checkins: vec![RecentCheckIn {
                title: "Morning run".into(),
                outcome: "success".into(),
                created_at: Utc::now(),
            }],
            recent_journal_titles: vec!["First week reflections".into()],
            active_memories: vec![ActiveMemory {
                id: "mem_2026-07-01_abcd1234".into(),
                summary: "prefers short workouts".into(),
            }],
        };
        let block = snapshot.to_prompt_block();
        assert!(block.contains("Morning run"));
        assert!(block.contains("First week reflections"));
        assert!(block.contains("prefers short workouts"));
    }
}
