//! Journal writer (C10, spec.md §4.9). Same shape as the check-in writer;
//! the body is stored as Markdown verbatim, no enum validation needed.

use sqlx::{PgPool, Row};

use gateway_common::{idempotency_key, GatewayError, JournalId, TurnId, UserId, WriteStatus, WriteSummaryItem};

use crate::state::decision::JournalDecision;

pub async fn apply(
    pool: &PgPool,
    user_id: &UserId,
    turn_id: &TurnId,
    decision: &JournalDecision,
) -> Result<WriteSummaryItem, GatewayError> {
    let key = idempotency_key(user_id, turn_id, "journal");
    let id = JournalId::new();

    let row = sqlx::query(
        "INSERT INTO journal_entries (id, user_id, turn_id, title, body_markdown, domain_hints, idempotency_key)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (user_id, idempotency_key) DO NOTHING
         RETURNING id",
    )
    .bind(id.0)
    .bind(user_id.as_str())
    .bind(turn_id.0)
    .bind(&decision.title)
    .bind(&decision.body_markdown)
    .bind(&decision.domain_hints)
    .bind(&key)
    .fetch_optional(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("journal insert failed: {e}")))?;

    match row {
        Some(row) => {
            let id: uuid::Uuid = row.get("id");
            Ok(WriteSummaryItem {
                kind: "journal",
                status: WriteStatus::Written,
                target: id.to_string(),
                details: None,
            })
        }
        None => Ok(WriteSummaryItem {
            kind: "journal",
            status: WriteStatus::Duplicate,
            target: key,
            details: None,
        }),
    }
}
