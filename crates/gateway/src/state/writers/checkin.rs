//! Check-in writer (C10, spec.md §4.9).

use sqlx::{PgPool, Row};

use gateway_common::{
    idempotency_key, CheckInId, CheckInOutcome, GatewayError, TrackType, TurnId, UserId,
    WriteStatus, WriteSummaryItem,
};

use crate::state::decision::CheckinDecision;

fn parse_track_type(raw: &str) -> Option<TrackType> {
    match raw {
        "goal" => Some(TrackType::Goal),
        "habit" => Some(TrackType::Habit),
        "event" => Some(TrackType::Event),
        _ => None,
    }
}

fn parse_outcome(raw: &str) -> Option<CheckInOutcome> {
    match raw {
        "success" => Some(CheckInOutcome::Success),
        "partial" => Some(CheckInOutcome::Partial),
        "missed" => Some(CheckInOutcome::Missed),
        "neutral" => Some(CheckInOutcome::Neutral),
        _ => None,
    }
}

pub async fn apply(
    pool: &PgPool,
    user_id: &UserId,
    turn_id: &TurnId,
    source_model: Option<&str>,
    decision: &CheckinDecision,
) -> Result<WriteSummaryItem, GatewayError> {
    let Some(track_type) = parse_track_type(&decision.track_type) else {
        return Ok(WriteSummaryItem {
            kind: "checkin",
            status: WriteStatus::Rejected,
            target: String::new(),
            details: Some(format!("invalid track_type: {}", decision.track_type)),
        });
    };
    let Some(outcome) = parse_outcome(&decision.outcome) else {
        return Ok(WriteSummaryItem {
            kind: "checkin",
            status: WriteStatus::Rejected,
            target: String::new(),
            details: Some(format!("invalid outcome: {}", decision.outcome)),
        });
    };

    let key = idempotency_key(user_id, turn_id, "checkin");
    let id = CheckInId::new();
    let confidence = decision.confidence.clamp(0.0, 1.0);

    let row = sqlx::query(
        "INSERT INTO checkins
            (id, user_id, turn_id, domain, track_type, title, summary, outcome, confidence,
             wins, barriers, next_actions, tags, source_model, idempotency_key)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         ON CONFLICT (user_id, idempotency_key) DO NOTHING
         RETURNING id",
    )
    .bind(id.0)
    .bind(user_id.as_str())
    .bind(turn_id.0)
    .bind(&decision.domain)
    .bind(track_type_str(track_type))
    .bind(&decision.title)
    .bind(&decision.summary)
    .bind(outcome_str(outcome))
    .bind(confidence)
    .bind(&decision.wins)
    .bind(&decision.barriers)
    .bind(&decision.next_actions)
    .bind(&decision.tags)
    .bind(source_model)
    .bind(&key)
    .fetch_optional(pool)
    .await
    .map_err(|e| GatewayError::Persistence(format!("checkin insert failed: {e}")))?;

    match row {
        Some(row) => {
            let id: uuid::Uuid = row.get("id");
            Ok(WriteSummaryItem {
                kind: "checkin",
                status: WriteStatus::Written,
                target: id.to_string(),
                details: None,
            })
        }
        None => Ok(WriteSummaryItem {
            kind: "checkin",
            status: WriteStatus::Duplicate,
            target: key,
            details: None,
        }),
    }
}

fn track_type_str(t: TrackType) -> &'static str {
    match t {
        TrackType::Goal => "goal",
        TrackType::Habit => "habit",
        TrackType::Event => "event",
    }
}

fn outcome_str(o: CheckInOutcome) -> &'static str {
    match o {
        CheckInOutcome::Success => "success",
        CheckInOutcome::Partial => "partial",
        CheckInOutcome::Missed => "missed",
        CheckInOutcome::Neutral => "neutral",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_valid_enum_strings() {
        assert!(matches!(parse_track_type("goal"), Some(TrackType::Goal)));
        assert!(matches!(parse_outcome("missed"), Some(CheckInOutcome::Missed)));
    }

    #[test]
    fn rejects_unknown_enum_strings() {
        assert!(parse_track_type("sprint").is_none());
        assert!(parse_outcome("abandoned").is_none());
    }
}
