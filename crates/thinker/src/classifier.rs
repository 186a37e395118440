//! Combines the deterministic parser with an LLM fallback, per PEAL step 2:
//! skip the LLM when `skip_llm_for_obvious` is set and the rule-based parse
//! is confident; otherwise ask the model to classify.

use aigent_core::{AgentError, AgentResult};
use aigent_llm::{ChatMessage, LlmClient, ResponseFormat};
use serde::Deserialize;

use crate::parser::{confidence_score, infer_intent, is_obvious_intent, Intent};

#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
    /// True when the rule-based parser decided this without calling the LLM.
    pub deterministic: bool,
}

#[derive(Deserialize)]
struct LlmIntent {
    intent: String,
}

fn parse_llm_intent(raw: &str) -> Option<Intent> {
    match raw.trim().to_lowercase().as_str() {
        "event" => Some(Intent::Event),
        "task" => Some(Intent::Task),
        "query" => Some(Intent::Query),
        "procedure" => Some(Intent::Procedure),
        "web_io" => Some(Intent::WebIo),
        "remember" => Some(Intent::Remember),
        "inform" => Some(Intent::Inform),
        _ => None,
    }
}

/// Classifies `instruction`, consulting `llm` only when the deterministic
/// parser isn't confident enough (or `skip_llm_for_obvious` is false).
pub async fn classify(
    llm: &dyn LlmClient,
    instruction: &str,
    skip_llm_for_obvious: bool,
) -> AgentResult<Classification> {
    let rule_kind = infer_intent(instruction);
    let rule_confidence = confidence_score(instruction, rule_kind);

    if skip_llm_for_obvious && is_obvious_intent(instruction, rule_kind) {
        return Ok(Classification { intent: rule_kind, confidence: rule_confidence, deterministic: true });
    }

    let prompt = format!(
        "Classify the user's request into exactly one intent: event, task, query, procedure, web_io, remember, or inform.\n\
         Respond with JSON: {{\"intent\": \"<one of the above>\"}}\n\nRequest: {instruction}"
    );
    let messages = [ChatMessage::user(&prompt)];
    let response = llm.chat(&messages, 0.0, Some(ResponseFormat::JsonObject)).await?;

    let parsed: LlmIntent = serde_json::from_str(response.trim())
        .map_err(|e| AgentError::LlmFailure(format!("intent classification returned invalid JSON: {e}")))?;

    let intent = parse_llm_intent(&parsed.intent)
        .ok_or_else(|| AgentError::LlmFailure(format!("unrecognized intent from LLM: {}", parsed.intent)))?;

    Ok(Classification { intent, confidence: 1.0, deterministic: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_llm::MockLlmClient;

    #[tokio::test]
    async fn obvious_event_skips_llm() {
        let llm = MockLlmClient::new();
        let result = classify(&llm, "remind me to call mom at 3pm", true).await.unwrap();
        assert_eq!(result.intent, Intent::Event);
        assert!(result.deterministic);
    }

    #[tokio::test]
    async fn ambiguous_request_falls_back_to_llm() {
        let llm = MockLlmClient::new().with_default_chat(r#"{"intent": "procedure"}"#.to_string());
        let result = classify(&llm, "the weather is nice", false).await.unwrap();
        assert_eq!(result.intent, Intent::Procedure);
        assert!(!result.deterministic);
    }

    #[tokio::test]
    async fn skip_llm_disabled_always_calls_llm() {
        let llm = MockLlmClient::new().with_default_chat(r#"{"intent": "task"}"#.to_string());
        let result = classify(&llm, "remind me to call mom at 3pm", false).await.unwrap();
        assert_eq!(result.intent, Intent::Task);
        assert!(!result.deterministic);
    }

    #[tokio::test]
    async fn malformed_llm_response_is_llm_failure() {
        let llm = MockLlmClient::new().with_default_chat("not json".to_string());
        let err = classify(&llm, "something ambiguous", false).await.unwrap_err();
        assert!(matches!(err, AgentError::LlmFailure(_)));
    }
}
