//! Memory writer (C10, spec.md §4.9) and its tombstone/edit mutations.
//!
//! Create/dedup is expressed as a single upsert against the partial unique
//! index on `(user_id, domain, normalized_summary) WHERE NOT tombstoned`
//! (see `state/migrations.rs`): a colliding write updates `updated_at`
//! instead of inserting a new row. `(xmax = 0)` is the standard Postgres
//! idiom for "did this `ON CONFLICT DO UPDATE` actually insert."

use chrono::Utc;
use sqlx::{FromRow, PgPool, Row};

use gateway_common::{
    normalize_domain, normalize_summary, GatewayError, MemoryId, MemoryRecordRow, SpecialistDomain,
    UserId, WriteStatus, WriteSummaryItem,
};

use crate::state::decision::MemoryDecision;

#[derive(FromRow)]
struct MemoryRow {
    id: String,
    title: String,
    summary: String,
    narrative: String,
    confidence: f64,
    tags: Vec<String>,
    archived: bool,
    tombstoned: bool,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
    created_by_agent: String,
    last_updated_by_agent: String,
    normalized_summary: String,
}

/// Every memory (active and tombstoned) for `(user_id, domain)`, oldest
/// first — the shape the File Projector (C12) needs to re-render a domain's
/// markdown file in full after any mutation.
pub async fn fetch_domain(
    pool: &PgPool,
    user_id: &UserId,
    domain: SpecialistDomain,
) -> Result<Vec<MemoryRecordRow>, GatewayError> {
    let rows: Vec<MemoryRow> = sqlx::query_as(
        "SELECT id, title, summary, narrative, confidence, tags, archived, tombstoned,
                created_at, updated_at, created_by_agent, last_updated_by_agent, normalized_summary
         FROM memories
         WHERE user_id = $1 AND domain = $2
         ORDER BY created_at ASC",
    )
    .bind(user_id.as_str())
    .bind(domain.as_str())
    .fetch_all(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("memory domain fetch failed: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|r| MemoryRecordRow {
            id: MemoryId(r.id),
            user_id: user_id.clone(),
            domain,
            title: r.title,
            summary: r.summary,
            narrative: r.narrative,
            confidence: r.confidence,
            tags: r.tags,
            archived: r.archived,
            tombstoned: r.tombstoned,
            created_at: r.created_at,
            updated_at: r.updated_at,
            created_by_agent: r.created_by_agent,
            last_updated_by_agent: r.last_updated_by_agent,
            normalized_summary: r.normalized_summary,
        })
        .collect())
}

pub async fn apply(
    pool: &PgPool,
    user_id: &UserId,
    agent: &str,
    decision: &MemoryDecision,
) -> Result<WriteSummaryItem, GatewayError> {
    let domain = normalize_domain(&decision.domain);
    let normalized = normalize_summary(&decision.summary);
    let today = Utc::now().date_naive();
    let candidate_id = MemoryId::new(today);
    let confidence = decision.confidence.clamp(0.0, 1.0);

    let row = sqlx::query(
        "INSERT INTO memories
            (id, user_id, domain, title, summary, narrative, confidence, tags,
             archived, tombstoned, created_by_agent, last_updated_by_agent, normalized_summary)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, false, $9, $9, $10)
         ON CONFLICT (user_id, domain, normalized_summary) WHERE NOT tombstoned
         DO UPDATE SET updated_at = now(), last_updated_by_agent = excluded.last_updated_by_agent
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(&candidate_id.0)
    .bind(user_id.as_str())
    .bind(domain.as_str())
    .bind(&decision.title)
    .bind(&decision.summary)
    .bind(&decision.narrative)
    .bind(confidence)
    .bind(&decision.tags)
    .bind(agent)
    .bind(&normalized)
    .fetch_one(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("memory upsert failed: {e}")))?;

    let id: String = row.get("id");
    let inserted: bool = row.get("inserted");

    Ok(WriteSummaryItem {
        kind: "memory",
        status: if inserted {
            WriteStatus::Written
        } else {
            WriteStatus::Duplicate
        },
        target: id,
        details: None,
    })
}

/// Tombstone a memory: rewrites its stored summary with a `[REMOVED] `
/// marker, sets `tombstoned=true`. The projector (C12) mirrors this as the
/// entry line's `[REMOVED]` prefix in the domain markdown file.
const REMOVED_PREFIX: &str = "[REMOVED] ";

/// Prefix a summary with the tombstone marker, idempotently — re-tombstoning
/// an already-removed entry must not double the marker.
fn removed_summary(summary: String) -> String {
    if summary.starts_with(REMOVED_PREFIX) {
        summary
    } else {
        format!("{REMOVED_PREFIX}{summary}")
    }
}

pub async fn tombstone(pool: &PgPool, memory_id: &str, actor: &str) -> Result<bool, GatewayError> {
    let existing: Option<(String,)> = sqlx::query_as(
        "SELECT summary FROM memories WHERE id = $1 AND NOT tombstoned",
    )
    .bind(memory_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("tombstone lookup failed: {e}")))?;

    let Some((summary,)) = existing else {
        return Ok(false);
    };
    let new_summary = removed_summary(summary);

    sqlx::query(
        "UPDATE memories
         SET summary = $2, tombstoned = true, updated_at = now(), last_updated_by_agent = $3
         WHERE id = $1",
    )
    .bind(memory_id)
    .bind(&new_summary)
    .bind(actor)
    .execute(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("tombstone update failed: {e}")))?;

    Ok(true)
}

/// Edit a memory: append a parenthetical user note in place; tombstone state
/// is preserved (spec.md §3 "edit ... appends a user note in place").
pub async fn edit(
    pool: &PgPool,
    memory_id: &str,
    note: &str,
    actor: &str,
) -> Result<bool, GatewayError> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT summary FROM memories WHERE id = $1")
        .bind(memory_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| GatewayError::Persistence(format!("edit lookup failed: {e}")))?;

    let Some((summary,)) = existing else {
        return Ok(false);
    };
    let note = note.trim();
    let new_summary = format!("{summary} (user note: {note})");

    sqlx::query(
        "UPDATE memories
         SET summary = $2, updated_at = now(), last_updated_by_agent = $3
         WHERE id = $1",
    )
    .bind(memory_id)
    .bind(&new_summary)
    .bind(actor)
    .execute(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("edit update failed: {e}")))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_prefix_is_applied_once() {
        let summary = "prefers short workouts".to_string();
        let once = removed_summary(summary);
        assert_eq!(once, "[REMOVED] prefers short workouts");
    }

    #[test]
    fn tombstone_prefix_is_idempotent() {
        let already_removed = "[REMOVED] prefers short workouts".to_string();
        let still_once = removed_summary(already_removed.clone());
        assert_eq!(still_once, already_removed);
    }
}
