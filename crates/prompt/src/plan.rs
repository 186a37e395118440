//! Strict JSON plan parsing, accepting both wire shapes a planning LLM call
//! may return (spec §6).

use aigent_core::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub tool: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Plan {
    pub intent: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub procedure_uuid: Option<String>,
}

#[derive(Deserialize)]
struct LegacyWire {
    intent: String,
    #[serde(default)]
    steps: Vec<PlanStep>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    procedure_uuid: Option<String>,
}

#[derive(Deserialize)]
struct AltStepWire {
    commandtype: String,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Deserialize)]
struct AltMetadataWire {
    #[serde(default)]
    steps: Vec<AltStepWire>,
}

#[derive(Deserialize)]
struct AltWire {
    commandtype: String,
    metadata: AltMetadataWire,
}

/// Parses a plan from raw LLM output. Accepts the legacy
/// `{intent, steps, confidence?, procedure_uuid?}` shape and the alternate
/// `{commandtype: "procedure", metadata: {steps: [...]}}` shape.
pub fn parse_plan(raw: &str) -> AgentResult<Plan> {
    let trimmed = raw.trim();

    if let Ok(legacy) = serde_json::from_str::<LegacyWire>(trimmed) {
        return Ok(Plan {
            intent: legacy.intent,
            steps: legacy.steps,
            confidence: legacy.confidence,
            procedure_uuid: legacy.procedure_uuid,
        });
    }

    if let Ok(alt) = serde_json::from_str::<AltWire>(trimmed) {
        let steps = alt
            .metadata
            .steps
            .into_iter()
            .map(|s| PlanStep { tool: s.commandtype, params: s.metadata, comment: s.comment })
            .collect();
        return Ok(Plan { intent: alt.commandtype, steps, confidence: None, procedure_uuid: None });
    }

    Err(AgentError::LlmFailure(format!("plan response is neither known wire shape: {trimmed}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_legacy_shape() {
        let raw = r#"{"intent": "task", "steps": [{"tool": "tasks.create", "params": {"title": "x"}}], "confidence": 0.95}"#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.intent, "task");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool, "tasks.create");
        assert_eq!(plan.confidence, Some(0.95));
    }

    #[test]
    fn parses_alternate_shape() {
        let raw = r#"{"commandtype": "procedure", "metadata": {"steps": [
            {"commandtype": "web.get_dom", "metadata": {"url": "https://example.com"}, "comment": "load page"}
        ]}}"#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.intent, "procedure");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool, "web.get_dom");
        assert_eq!(plan.steps[0].params, json!({"url": "https://example.com"}));
        assert_eq!(plan.steps[0].comment.as_deref(), Some("load page"));
    }

    #[test]
    fn empty_steps_is_valid() {
        let raw = r#"{"intent": "inform", "steps": []}"#;
        let plan = parse_plan(raw).unwrap();
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn invalid_json_is_llm_failure() {
        let err = parse_plan("not json at all").unwrap_err();
        assert!(matches!(err, AgentError::LlmFailure(_)));
    }

    #[test]
    fn missing_intent_field_is_llm_failure() {
        let err = parse_plan(r#"{"steps": []}"#).unwrap_err();
        assert!(matches!(err, AgentError::LlmFailure(_)));
    }
}
