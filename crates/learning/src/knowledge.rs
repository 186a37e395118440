//! Accumulates knowledge nodes from successful runs and user corrections,
//! and retrieves them back out for transfer into future plans.
//!
//! Grounded on `learning_engine.py`'s `learn_from_success`,
//! `learn_from_user_feedback` and `find_similar_knowledge`.

use std::collections::HashMap;
use std::sync::Arc;

use aigent_core::{Node, Provenance};
use aigent_llm::{extract_json_object, ChatMessage, LlmClient, ResponseFormat};
use aigent_memory::{MemoryStore, SearchHit};
use aigent_procedures::ExecutionOutcome;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

const KNOWLEDGE_LABELS: [&str; 5] = ["Knowledge", "Lesson", "Success", "Correction", "UserFeedback"];

#[derive(Debug, Default, Deserialize)]
struct SuccessLessons {
    #[serde(default)]
    what_worked: Vec<String>,
    #[serde(default)]
    key_success_factors: Vec<String>,
    #[serde(default)]
    reusable_patterns: Vec<String>,
    #[serde(default)]
    best_practices: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedbackLessons {
    #[serde(default)]
    what_was_wrong: Vec<String>,
    #[serde(default)]
    correct_approach: String,
    #[serde(default)]
    lessons: Vec<String>,
    #[serde(default)]
    future_guidance: String,
}

/// Extracts and stores lessons from a successful run. Returns `None`
/// (rather than an error) if there were no successful steps to learn
/// from, or if the LLM call/parse fails — learning never blocks the
/// caller's success path.
pub async fn learn_from_success(
    llm: &dyn LlmClient,
    memory: &Arc<dyn MemoryStore>,
    user_request: &str,
    outcome: &ExecutionOutcome,
    provenance: &Provenance,
) -> Option<String> {
    let successful: Vec<_> = outcome.results.iter().filter(|r| r.status == "success").collect();
    if successful.is_empty() {
        return None;
    }

    let steps_json = serde_json::to_string_pretty(&successful).ok()?;
    let prompt = format!(
        "Extract lessons learned from this successful execution.\n\n\
         User Request: {user_request}\n\n\
         Successful Steps:\n{steps_json}\n\n\
         Provide analysis in JSON format:\n\
         {{\"what_worked\": [\"...\"], \"key_success_factors\": [\"...\"], \
         \"reusable_patterns\": [\"...\"], \"best_practices\": [\"...\"]}}"
    );
    let messages = vec![
        ChatMessage::system("You extract lessons and patterns from successful executions. Return only valid JSON."),
        ChatMessage::user(prompt),
    ];

    let response = llm.chat(&messages, 0.2, Some(ResponseFormat::JsonObject)).await.ok()?;
    let lessons: SuccessLessons = extract_json_object(&response)?;

    let mut node = Node::new("topic").with_labels(vec!["Knowledge".to_string(), "Lesson".to_string(), "Success".to_string()]);
    node.set_prop("label", json!(format!("Lessons from: {}", truncate(user_request, 50))));
    node.set_prop("summary", json!("Lessons learned from successful execution"));
    node.set_prop("what_worked", json!(lessons.what_worked));
    node.set_prop("key_success_factors", json!(lessons.key_success_factors));
    node.set_prop("reusable_patterns", json!(lessons.reusable_patterns));
    node.set_prop("best_practices", json!(lessons.best_practices));
    node.set_prop("user_request", json!(user_request));
    node.set_prop("learned_at", json!(Utc::now().to_rfc3339()));
    node.set_prop("source", json!(provenance.source.clone()));

    if let Ok(embedding) = llm.embed(user_request).await {
        node.embedding = Some(embedding);
    }

    Some(memory.upsert_node(node, provenance).await)
}

/// Stores a correction derived from explicit user feedback on a run.
pub async fn learn_from_user_feedback(
    llm: &dyn LlmClient,
    memory: &Arc<dyn MemoryStore>,
    user_feedback: &str,
    original_request: &str,
    plan_steps: &[Value],
    outcome: &ExecutionOutcome,
    provenance: &Provenance,
) -> Option<String> {
    let steps_json = serde_json::to_string_pretty(plan_steps).ok()?;
    let results_json = serde_json::to_string_pretty(outcome).ok()?;
    let prompt = format!(
        "Extract learning from user feedback/correction.\n\n\
         Original Request: {original_request}\n\n\
         Plan That Was Executed:\n{steps_json}\n\n\
         Execution Results:\n{results_json}\n\n\
         User Feedback/Correction: {user_feedback}\n\n\
         Provide analysis in JSON format:\n\
         {{\"what_was_wrong\": [\"...\"], \"correct_approach\": \"...\", \
         \"lessons\": [\"...\"], \"future_guidance\": \"...\"}}"
    );
    let messages = vec![
        ChatMessage::system("You extract learning from user feedback and corrections. Return only valid JSON."),
        ChatMessage::user(prompt),
    ];

    let response = llm.chat(&messages, 0.2, Some(ResponseFormat::JsonObject)).await.ok()?;
    let learning: FeedbackLessons = extract_json_object(&response)?;

    let mut node = Node::new("topic").with_labels(vec!["Knowledge".to_string(), "Correction".to_string(), "UserFeedback".to_string()]);
    node.set_prop("label", json!(format!("Correction: {}", truncate(original_request, 50))));
    node.set_prop("summary", json!("Learning from user feedback"));
    node.set_prop("what_was_wrong", json!(learning.what_was_wrong));
    node.set_prop("correct_approach", json!(learning.correct_approach));
    node.set_prop("lessons", json!(learning.lessons));
    node.set_prop("future_guidance", json!(learning.future_guidance));
    node.set_prop("user_feedback", json!(user_feedback));
    node.set_prop("original_request", json!(original_request));
    node.set_prop("learned_at", json!(Utc::now().to_rfc3339()));
    node.set_prop("source", json!(provenance.source.clone()));

    let embed_text = format!("{original_request} {user_feedback}");
    if let Ok(embedding) = llm.embed(&embed_text).await {
        node.embedding = Some(embedding);
    }

    Some(memory.upsert_node(node, provenance).await)
}

/// Searches stored knowledge/lesson/correction nodes, filtering out any
/// `topic` hit that isn't actually a learning artifact.
pub async fn find_similar_knowledge(llm: &dyn LlmClient, memory: &Arc<dyn MemoryStore>, query: &str, top_k: usize) -> Vec<SearchHit> {
    let embedding = llm.embed(query).await.ok();
    let filters = HashMap::from([("kind".to_string(), json!("topic"))]);
    let hits = memory.search(query, top_k, Some(&filters), embedding.as_deref()).await;

    hits.into_iter()
        .filter(|hit| hit.node.labels.iter().any(|label| KNOWLEDGE_LABELS.contains(&label.as_str())))
        .collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_memory::InMemoryMemoryStore;
    use aigent_procedures::StepResult;

    fn success_outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            status: "success".to_string(),
            results: vec![StepResult {
                tool: "calendar.create_event".to_string(),
                status: "success".to_string(),
                output: json!({"id": "evt-1"}),
                error: None,
            }],
            error: None,
        }
    }

    #[tokio::test]
    async fn learn_from_success_stores_knowledge_node() {
        let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryMemoryStore::new());
        let llm = aigent_llm::MockLlmClient::new().with_default_chat(
            r#"{"what_worked": ["used correct timezone"], "key_success_factors": ["valid iso timestamps"], "reusable_patterns": [], "best_practices": []}"#,
        );
        let prov = Provenance::new("user", "trace-1");

        let uuid = learn_from_success(&llm, &memory, "schedule standup", &success_outcome(), &prov).await.unwrap();
        let node = memory.get_node(&uuid).await.unwrap();
        assert_eq!(node.props["what_worked"][0], "used correct timezone");
        assert!(node.labels.contains(&"Success".to_string()));
    }

    #[tokio::test]
    async fn learn_from_success_returns_none_with_no_successful_steps() {
        let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryMemoryStore::new());
        let llm = aigent_llm::MockLlmClient::new();
        let prov = Provenance::new("user", "trace-1");
        let outcome = ExecutionOutcome { status: "error".to_string(), results: vec![], error: Some("boom".to_string()) };

        assert!(learn_from_success(&llm, &memory, "x", &outcome, &prov).await.is_none());
    }

    #[tokio::test]
    async fn find_similar_knowledge_filters_non_knowledge_labels() {
        let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryMemoryStore::new());
        let prov = Provenance::new("user", "trace-1");
        let mut unrelated = Node::new("topic").with_labels(vec!["Person".to_string()]);
        unrelated.set_prop("label", json!("irrelevant topic node"));
        memory.upsert_node(unrelated, &prov).await;

        let mut knowledge = Node::new("topic").with_labels(vec!["Knowledge".to_string(), "Lesson".to_string()]);
        knowledge.set_prop("label", json!("lesson about scheduling"));
        memory.upsert_node(knowledge, &prov).await;

        let llm = aigent_llm::MockLlmClient::new();
        let hits = find_similar_knowledge(&llm, &memory, "scheduling", 5).await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].node.labels.contains(&"Lesson".to_string()));
    }
}
