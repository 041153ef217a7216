//! State Pipeline Coordinator (C13, spec.md §4.11).
//!
//! Runs after the Orchestrator has produced a reply: context fetch (C8) →
//! decide (C9) → apply each non-null slot through its writer (C10/C11) →
//! mirror to disk (C12). A decision-engine failure applies the configured
//! failure policy instead of writing anything; writer failures are reported
//! per-slot and never propagate as an HTTP error (spec.md §4.12).

use std::sync::Arc;

use gateway_common::{GatewayError, Turn, WriteStatus, WriteSummaryItem};

use crate::state::context;
use crate::state::decision::{self, StateDecision};
use crate::state::projector::FileProjector;
use crate::state::writers::{checkin, journal, memory};
use crate::state::StateStore;

const STATE_PIPELINE_AGENT: &str = "state-pipeline";

#[derive(Debug, Clone)]
pub struct StatePipelineResult {
    pub writes: Vec<WriteSummaryItem>,
    pub footer: Option<String>,
}

pub struct StatePipelineCoordinator {
    store: Arc<StateStore>,
    projector: Arc<FileProjector>,
    decision_model: String,
    max_json_retries: u32,
    on_failure: OnFailure,
    checkin_enabled: bool,
    journal_enabled: bool,
    memory_enabled: bool,
    context_checkins_limit: i64,
    context_journal_limit: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnFailure {
    Silent,
    FooterWarning,
}

impl OnFailure {
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "silent" => Self::Silent,
            _ => Self::FooterWarning,
        }
    }
}

#[allow(clippy::too_many_arguments)]
impl StatePipelineCoordinator {
    pub fn new(
        store: Arc<StateStore>,
        projector: Arc<FileProjector>,
        decision_model: String,
        max_json_retries: u32,
        on_failure: OnFailure,
        checkin_enabled: bool,
        journal_enabled: bool,
        memory_enabled: bool,
        context_checkins_limit: i64,
        context_journal_limit: i64,
    ) -> Self {
        Self {
            store,
            projector,
            decision_model,
            max_json_retries,
            on_failure,
            checkin_enabled,
            journal_enabled,
            memory_enabled,
            context_checkins_limit,
            context_journal_limit,
        }
    }

    pub async fn run(
        &self,
        router: &crate::provider::ProviderRouter,
        turn: &Turn,
    ) -> StatePipelineResult {
        let context = match context::fetch_context(
            self.store.pool(),
            &turn.user_id,
            turn.routed_domain,
            self.context_checkins_limit,
            self.context_journal_limit,
        )
        .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "state context fetch failed; skipping state pipeline");
                return StatePipelineResult {
                    writes: Vec::new(),
                    footer: self.footer_for("context-fetch-error", turn.user_id.as_str()),
                };
            }
        };

        let decision = decision::decide(
            router,
            &self.decision_model,
            &turn.user_text,
            &turn.assistant_text,
            turn.routed_domain.as_str(),
            &context,
            self.max_json_retries,
        )
        .await;

        if decision.is_failure {
            return StatePipelineResult {
                writes: Vec::new(),
                footer: self.footer_for(&decision.reason, turn.user_id.as_str()),
            };
        }

        let writes = self.apply_decision(turn, &decision).await;

        StatePipelineResult { writes, footer: None }
    }

    fn footer_for(&self, reason: &str, user_id: &str) -> Option<String> {
        match self.on_failure {
            OnFailure::Silent => None,
            OnFailure::FooterWarning => Some(format!(
                "\n\n---\n_State warning: {reason}. Recent context may be stale — see state/users/{user_id}/_",
            )),
        }
    }

    async fn apply_decision(&self, turn: &Turn, decision: &StateDecision) -> Vec<WriteSummaryItem> {
        let mut writes = Vec::new();

        if self.checkin_enabled {
            if let Some(c) = &decision.checkin {
                match checkin::apply(
                    self.store.pool(),
                    &turn.user_id,
                    &turn.turn_id,
                    Some(&self.decision_model),
                    c,
                )
                .await
                {
                    Ok(item) => {
                        if item.status == WriteStatus::Written {
                            self.project_checkin(turn, c).await;
                        }
                        writes.push(item);
                    }
                    Err(e) => writes.push(write_error("checkin", e)),
                }
            }
        }

        if self.journal_enabled {
            if let Some(j) = &decision.journal {
                match journal::apply(self.store.pool(), &turn.user_id, &turn.turn_id, j).await {
                    Ok(item) => {
                        if item.status == WriteStatus::Written {
                            self.project_journal(turn, j).await;
                        }
                        writes.push(item);
                    }
                    Err(e) => writes.push(write_error("journal", e)),
                }
            }
        }

        if self.memory_enabled {
            if let Some(m) = &decision.memory {
                match memory::apply(self.store.pool(), &turn.user_id, STATE_PIPELINE_AGENT, m).await {
                    Ok(item) => {
                        self.project_memory_domain(turn, &m.domain).await;
                        writes.push(item);
                    }
                    Err(e) => writes.push(write_error("memory", e)),
                }
            }
        }

        writes
    }

    async fn project_checkin(&self, turn: &Turn, decision: &decision::CheckinDecision) {
        if !self.projector.mode().is_enabled() {
            return;
        }
        // The projector renders from the already-written record shape, not
        // the raw decision, so construct the record the same way the writer
        // just persisted it.
        use chrono::Utc;
        use gateway_common::{CheckInId, CheckInOutcome, CheckInRecord, TrackType};

        let Some(track_type) = parse_track_type(&decision.track_type) else {
            return;
        };
        let Some(outcome) = parse_outcome(&decision.outcome) else {
            return;
        };
        let record = CheckInRecord {
            id: CheckInId::new(),
            user_id: turn.user_id.clone(),
            turn_id: turn.turn_id,
            domain: turn.routed_domain,
            track_type,
            title: decision.title.clone(),
            summary: decision.summary.clone(),
            outcome,
            confidence: decision.confidence.clamp(0.0, 1.0),
            wins: decision.wins.clone(),
            barriers: decision.barriers.clone(),
            next_actions: decision.next_actions.clone(),
            tags: decision.tags.clone(),
            created_at: Utc::now(),
            source_model: Some(self.decision_model.clone()),
            idempotency_key: gateway_common::idempotency_key(&turn.user_id, &turn.turn_id, "checkin"),
        };
        self.projector.project_checkin(&turn.user_id, &record);
    }

    async fn project_journal(&self, turn: &Turn, decision: &decision::JournalDecision) {
        if !self.projector.mode().is_enabled() {
            return;
        }
        use chrono::Utc;
        use gateway_common::{JournalEntry, JournalId};

        let entry = JournalEntry {
            id: JournalId::new(),
            user_id: turn.user_id.clone(),
            turn_id: turn.turn_id,
            title: decision.title.clone(),
            body_markdown: decision.body_markdown.clone(),
            domain_hints: decision.domain_hints.clone(),
            created_at: Utc::now(),
            idempotency_key: gateway_common::idempotency_key(&turn.user_id, &turn.turn_id, "journal"),
        };
        self.projector.project_journal(&turn.user_id, &entry);
    }

    async fn project_memory_domain(&self, turn: &Turn, domain: &str) {
        if !self.projector.mode().is_enabled() {
            return;
        }
        let normalized = gateway_common::normalize_domain(domain);
        match memory::fetch_domain(self.store.pool(), &turn.user_id, normalized).await {
            Ok(records) => self
                .projector
                .project_memory_domain(&turn.user_id, normalized.as_str(), &records),
            Err(e) => {
                tracing::warn!(error = %e, "failed to re-fetch memory domain for projection");
            }
        }
    }
}

fn write_error(kind: &'static str, error: GatewayError) -> WriteSummaryItem {
    tracing::error!(kind, error = %error, "state writer failed");
    WriteSummaryItem {
        kind,
        status: WriteStatus::Rejected,
        target: String::new(),
        details: Some(error.to_string()),
    }
}

fn parse_track_type(raw: &str) -> Option<gateway_common::TrackType> {
    use gateway_common::TrackType;
    match raw {
        "goal" => Some(TrackType::Goal),
        "habit" => Some(TrackType::Habit),
        "event" => Some(TrackType::Event),
        _ => None,
    }
}

fn parse_outcome(raw: &str) -> Option<gateway_common::CheckInOutcome> {
    use gateway_common::CheckInOutcome;
    match raw {
        "success" => Some(CheckInOutcome::Success),
        "partial" => Some(CheckInOutcome::Partial),
        "missed" => Some(CheckInOutcome::Missed),
        "neutral" => Some(CheckInOutcome::Neutral),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_failure_parsing_defaults_to_footer_warning() {
        assert_eq!(OnFailure::from_config_str("silent"), OnFailure::Silent);
        assert_eq!(OnFailure::from_config_str("footer_warning"), OnFailure::FooterWarning);
        assert_eq!(OnFailure::from_config_str("bogus"), OnFailure::FooterWarning);
    }

    #[test]
    fn footer_text_for_failure_contains_reason_and_user_path() {
        let coordinator_footer = |on_failure: OnFailure, reason: &str, user: &str| -> Option<String> {
            match on_failure {
                OnFailure::Silent => None,
                OnFailure::FooterWarning => Some(format!(
                    "\n\n---\n_State warning: {reason}. Recent context may be stale — see state/users/{user}/_",
                )),
            }
        };
        let footer = coordinator_footer(OnFailure::FooterWarning, "state-model-unavailable", "alice").unwrap();
        assert!(footer.contains("State warning"));
        assert!(footer.contains("state-model-unavailable"));
        assert!(footer.contains("state/users/alice/"));

        assert!(coordinator_footer(OnFailure::Silent, "x", "alice").is_none());
    }
}
