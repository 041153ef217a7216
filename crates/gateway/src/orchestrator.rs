//! Orchestrator (C6, spec.md §4.5).
//!
//! Per turn: classify the latest user message, compose the system prompt as
//! orchestrator prompt + specialist prompt for the chosen domain, prepend it
//! to the incoming messages, and call the Provider Router with the
//! specialist's configured model. On success, the Sticky Session Store is
//! updated and the upstream response is returned to the caller unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use gateway_common::{GatewayError, SpecialistDomain, Turn, TurnId, UserId};

use crate::classifier::{self, ClassifierResult};
use crate::prompts::PromptRegistry;
use crate::provider::{ChatMessage, ChatOutcome, ProviderRouter};
use crate::session_store::StickySessionStore;

pub struct Orchestrator {
    router: Arc<ProviderRouter>,
    prompts: Arc<PromptRegistry>,
    sessions: Arc<StickySessionStore>,
    specialist_models: HashMap<SpecialistDomain, String>,
    classifier_model: String,
    classifier_max_tokens: u32,
}

/// Everything the HTTP layer needs to finish handling a turn: the chosen
/// domain, the upstream outcome (buffered or still-streaming), and a
/// `Turn` record that is complete for non-streaming calls and missing only
/// `assistant_text` for streaming ones (the caller fills it in once the SSE
/// stream has been fully forwarded, then hands the turn to the state
/// pipeline).
pub struct OrchestratorOutcome {
    pub turn: Turn,
    pub classifier: ClassifierResult,
    pub chat_outcome: ChatOutcome,
}

impl Orchestrator {
    pub fn new(
        router: Arc<ProviderRouter>,
        prompts: Arc<PromptRegistry>,
        sessions: Arc<StickySessionStore>,
        specialist_models: HashMap<SpecialistDomain, String>,
        classifier_model: String,
        classifier_max_tokens: u32,
    ) -> Self {
        Self {
            router,
            prompts,
            sessions,
            specialist_models,
            classifier_model,
            classifier_max_tokens,
        }
    }

    fn model_for(&self, domain: SpecialistDomain) -> &str {
        self.specialist_models
            .get(&domain)
            .map(|s| s.as_str())
            .unwrap_or(self.classifier_model.as_str())
    }

    fn compose_system_prompt(&self, domain: SpecialistDomain) -> String {
        format!(
            "{}\n\n{}",
            self.prompts.get_orchestrator(),
            self.prompts.get_domain(domain)
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn handle_turn(
        &self,
        user_id: &UserId,
        session_key: &str,
        incoming_messages: Vec<ChatMessage>,
        latest_user_text: &str,
        stream: bool,
        passthrough: Option<&Map<String, Value>>,
    ) -> Result<OrchestratorOutcome, GatewayError> {
        let classification = classifier::classify(
            &self.router,
            &self.classifier_model,
            latest_user_text,
            self.classifier_max_tokens,
        )
        .await;
        let domain = classification.domain;

        let mut messages = Vec::with_capacity(incoming_messages.len() + 1);
        messages.push(ChatMessage::system(self.compose_system_prompt(domain)));
        messages.extend(incoming_messages);

        let model = self.model_for(domain).to_string();
        let chat_outcome = self
            .router
            .chat_completion(&model, &messages, stream, passthrough, true)
            .await?;

        self.sessions.remember(session_key, domain.as_str());

        let used_model = match &chat_outcome {
            ChatOutcome::Complete(resp) => resp.used_model.clone(),
            ChatOutcome::Stream { used_model, .. } => used_model.clone(),
        };
        let assistant_text = match &chat_outcome {
            ChatOutcome::Complete(resp) => crate::jsonx::extract_message_text(&resp.raw),
            ChatOutcome::Stream { .. } => String::new(),
        };

        let turn = Turn {
            turn_id: TurnId::new(),
            user_id: user_id.clone(),
            session_key: session_key.to_string(),
            routed_domain: domain,
            user_text: latest_user_text.to_string(),
            assistant_text,
            used_model,
            request_fingerprint: request_fingerprint(user_id, session_key, &model, latest_user_text),
        };

        Ok(OrchestratorOutcome {
            turn,
            classifier: classification,
            chat_outcome,
        })
    }
}

/// A content-addressed fingerprint of the inbound request, not mandated by
/// any particular formula in spec.md — used for log correlation and as a
/// stable key callers may use to detect retried-identical requests.
fn request_fingerprint(user_id: &UserId, session_key: &str, model: &str, user_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(session_key.as_bytes());
    hasher.update(model.as_bytes());
    hasher.update(user_text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fingerprint_is_deterministic_and_input_sensitive() {
        let user = UserId::from("alice");
        let a = request_fingerprint(&user, "s1", "gpt-5.2", "hello");
        let b = request_fingerprint(&user, "s1", "gpt-5.2", "hello");
        let c = request_fingerprint(&user, "s1", "gpt-5.2", "goodbye");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
