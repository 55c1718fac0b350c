// AI treatment planning: plan generation, prescription review, style suggestion.
// All LLM calls go through llm_client; no direct Anthropic calls here.
//
// Every AI result is always a usable value; `AiSource` tells the UI whether it
// came from the model or from one of the fixed substitutes.

pub mod generator;
pub mod handlers;
pub mod inflight;
pub mod plan;
pub mod prompts;
pub mod review;
pub mod suggestion;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::parser::parse_or_fallback;
use crate::llm_client::{Completion, CompletionOptions, LlmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiSource {
    Ai,
    /// Model replied, reply unparseable.
    Fallback,
    ProviderError,
    /// No API key configured.
    Demo,
}

/// A model-produced document type with its three substitutes.
pub trait AiOutput: DeserializeOwned {
    /// Names the response kind in log lines.
    const LABEL: &'static str;

    fn parse_fallback() -> Self;
    fn provider_fallback(error_summary: &str) -> Self;
    fn demo() -> Self;
}

#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub value: T,
    pub source: AiSource,
}

/// One outbound completion, mapped onto a value of `T` whatever happens.
pub async fn request<T: AiOutput>(
    llm: &dyn Completion,
    prompt: &str,
    options: &CompletionOptions,
) -> Generated<T> {
    match llm.complete(prompt, options).await {
        Ok(raw) => {
            let parsed = parse_or_fallback(&raw, T::LABEL, T::parse_fallback);
            let source = if parsed.is_fallback() {
                AiSource::Fallback
            } else {
                AiSource::Ai
            };
            Generated {
                value: parsed.value,
                source,
            }
        }
        Err(LlmError::MissingCredential) => {
            info!("No API key configured, serving demo {}", T::LABEL);
            Generated {
                value: T::demo(),
                source: AiSource::Demo,
            }
        }
        Err(e) => {
            warn!("LLM call for {} failed: {e}", T::LABEL);
            Generated {
                value: T::provider_fallback(&e.to_string()),
                source: AiSource::ProviderError,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::plan::TreatmentPlan;
    use super::*;
    use crate::llm_client::testing::{Script, ScriptedCompletion};

    fn options() -> CompletionOptions {
        CompletionOptions::new("claude-test", 100)
    }

    #[tokio::test]
    async fn test_valid_reply_is_tagged_ai() {
        let llm = ScriptedCompletion::text(r#"{"recommendedMenu": "カット", "recommendedPrice": 5500}"#);
        let out: Generated<TreatmentPlan> = request(&llm, "p", &options()).await;
        assert_eq!(out.source, AiSource::Ai);
        assert_eq!(out.value.recommended_menu, "カット");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_stable_fallback() {
        let llm = ScriptedCompletion::text("申し訳ありませんが対応できません。");
        let a: Generated<TreatmentPlan> = request(&llm, "p", &options()).await;
        let b: Generated<TreatmentPlan> = request(&llm, "p", &options()).await;
        assert_eq!(a.source, AiSource::Fallback);
        assert_eq!(a.value, b.value);
        assert_eq!(a.value, TreatmentPlan::parse_fallback());
    }

    #[tokio::test]
    async fn test_missing_credential_serves_demo() {
        let llm = ScriptedCompletion::new(Script::MissingCredential);
        let out: Generated<TreatmentPlan> = request(&llm, "p", &options()).await;
        assert_eq!(out.source, AiSource::Demo);
        assert_eq!(out.value, TreatmentPlan::demo());
    }

    #[tokio::test]
    async fn test_provider_failure_carries_error_summary() {
        let llm = ScriptedCompletion::new(Script::Api(401, "invalid x-api-key".to_string()));
        let out: Generated<TreatmentPlan> = request(&llm, "p", &options()).await;
        assert_eq!(out.source, AiSource::ProviderError);
        assert!(out
            .value
            .risks_and_precautions
            .iter()
            .any(|r| r.contains("invalid x-api-key")));
    }

    #[tokio::test]
    async fn test_non_text_reply_is_a_provider_failure() {
        let llm = ScriptedCompletion::new(Script::NonText);
        let out: Generated<TreatmentPlan> = request(&llm, "p", &options()).await;
        assert_eq!(out.source, AiSource::ProviderError);
    }
}
