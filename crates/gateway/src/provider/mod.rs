//! Provider Router (C4, spec.md §4.3).
//!
//! Picks credentials by model name, rewrites Gemini call names when needed,
//! and walks a deduplicated `[primary] + fallbacks` candidate chain until one
//! call succeeds. Owns no persistent state.

pub mod gemini;
pub mod openai;
pub mod types;

pub use openai::ChatOutcome;
pub use types::{ChatMessage, EmbeddingResponse, ProviderResponse};

use serde_json::{Map, Value};

use gateway_common::GatewayError;

#[derive(Clone, Debug)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub base_url: String,
}

pub struct ProviderRouter {
    http: reqwest::Client,
    openai: ProviderCredentials,
    gemini: ProviderCredentials,
    fallbacks: Vec<String>,
}

fn dedup_preserve_order(models: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    models
        .into_iter()
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

impl ProviderRouter {
    pub fn new(
        http: reqwest::Client,
        openai: ProviderCredentials,
        gemini: ProviderCredentials,
        fallbacks: Vec<String>,
    ) -> Self {
        Self {
            http,
            openai,
            gemini,
            fallbacks,
        }
    }

    /// Every distinct model this router might ever call: the orchestrator
    /// prompt model, each specialist's model, and configured fallbacks. Used
    /// by `GET /v1/models` bookkeeping and `/diagnostics`.
    pub fn candidate_models(&self, configured: &[String]) -> Vec<String> {
        let mut all: Vec<String> = configured.to_vec();
        all.extend(self.fallbacks.clone());
        let mut deduped = dedup_preserve_order(all);
        deduped.sort();
        deduped
    }

    fn candidates_for(&self, primary_model: &str, include_fallbacks: bool) -> Vec<String> {
        let models = if include_fallbacks {
            let mut v = vec![primary_model.to_string()];
            v.extend(self.fallbacks.clone());
            v
        } else {
            vec![primary_model.to_string()]
        };
        dedup_preserve_order(models)
    }

    fn credentials_for(&self, model: &str) -> &ProviderCredentials {
        if gemini::is_gemini_model(model) {
            &self.gemini
        } else {
            &self.openai
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn chat_completion(
        &self,
        primary_model: &str,
        messages: &[ChatMessage],
        stream: bool,
        passthrough: Option<&Map<String, Value>>,
        include_fallbacks: bool,
    ) -> Result<ChatOutcome, GatewayError> {
        let candidates = self.candidates_for(primary_model, include_fallbacks);
        if candidates.is_empty() {
            return Err(GatewayError::NoCandidates);
        }

        let mut last_error: Option<GatewayError> = None;
        for model in &candidates {
            let creds = self.credentials_for(model);
            let result = if gemini::is_gemini_model(model) {
                gemini::send_chat_completion(
                    &self.http,
                    &creds.base_url,
                    &creds.api_key,
                    model,
                    messages,
                    stream,
                    passthrough,
                )
                .await
            } else {
                openai::send_chat_completion(
                    &self.http,
                    &creds.base_url,
                    &creds.api_key,
                    model,
                    model,
                    messages,
                    stream,
                    passthrough,
                )
                .await
            };

            match result {
                Ok(outcome) => {
                    if model != primary_model {
                        tracing::warn!(
                            primary_model,
                            fallback_model = model.as_str(),
                            "primary model failed, fallback model used"
                        );
                    }
                    return Ok(outcome);
                }
                Err(e) => {
                    tracing::warn!(model = model.as_str(), error = %e, "model call failed");
                    last_error = Some(e);
                }
            }
        }

        Err(GatewayError::ProviderExhausted(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    pub async fn embedding(
        &self,
        primary_model: &str,
        input_text: &str,
        include_fallbacks: bool,
    ) -> Result<EmbeddingResponse, GatewayError> {
        if input_text.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "embedding input text must not be empty".into(),
            ));
        }

        let candidates = self.candidates_for(primary_model, include_fallbacks);
        if candidates.is_empty() {
            return Err(GatewayError::NoCandidates);
        }

        let mut last_error: Option<GatewayError> = None;
        for model in &candidates {
            let creds = self.credentials_for(model);
            let result = if gemini::is_gemini_model(model) {
                gemini::send_embedding(&self.http, &creds.base_url, &creds.api_key, model, input_text)
                    .await
            } else {
                openai::send_embedding(
                    &self.http,
                    &creds.base_url,
                    &creds.api_key,
                    model,
                    model,
                    input_text,
                )
                .await
            };

            match result {
                Ok(resp) => {
                    if model != primary_model {
                        tracing::warn!(
                            primary_model,
                            fallback_model = model.as_str(),
                            "primary embedding model failed, fallback used"
                        );
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    tracing::warn!(model = model.as_str(), error = %e, "embedding call failed");
                    last_error = Some(e);
                }
            }
        }

        Err(GatewayError::ProviderExhausted(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ProviderRouter {
        ProviderRouter::new(
            reqwest::Client::new(),
            ProviderCredentials {
                api_key: "sk-openai".into(),
                base_url: "https://api.openai.com/v1".into(),
            },
            ProviderCredentials {
                api_key: "sk-gemini".into(),
                base_url: gemini::DEFAULT_BASE_URL.into(),
            },
            vec!["gpt-5-mini".into(), "gpt-5.2".into()],
        )
    }

    #[test]
    fn candidates_dedup_preserving_first_occurrence() {
        let r = router();
        assert_eq!(
            r.candidates_for("gpt-5.2", true),
            vec!["gpt-5.2".to_string(), "gpt-5-mini".to_string()]
        );
    }

    #[test]
    fn candidates_without_fallbacks_is_singleton() {
        let r = router();
        assert_eq!(r.candidates_for("gpt-5.2", false), vec!["gpt-5.2".to_string()]);
    }

    #[test]
    fn credentials_route_by_model_name() {
        let r = router();
        assert_eq!(r.credentials_for("gpt-5.2").api_key, "sk-openai");
        assert_eq!(r.credentials_for("gemini-2.5-pro").api_key, "sk-gemini");
    }
}
