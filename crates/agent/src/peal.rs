//! The plan-execute-adapt loop: one call to [`PealEngine::handle`] takes a
//! user request end to end through intent classification, memory retrieval,
//! planning, execution (with bounded adaptation retries), run persistence
//! and learning.
//!
//! Grounded on `agent.py`'s request-handling method and on the per-module
//! contracts this workspace already implements (`aigent_thinker::classify`,
//! `aigent_prompt::{build_plan_messages, parse_plan}`,
//! `aigent_procedures::{ProcedureManager, DagExecutor}`,
//! `aigent_learning::{learn_from_success, analyze_failure}`).

use std::sync::Arc;

use aigent_config::PealConfig;
use aigent_core::{AgentResult, Node, Provenance};
use aigent_llm::LlmClient;
use aigent_memory::{MemoryStore, WorkingMemoryGraph};
use aigent_procedures::{DagExecutor, ExecutionOutcome, ProcedureManager, StepResult};
use aigent_prompt::{build_adaptation_messages, build_plan_messages, parse_plan, Plan, PlanStep};
use aigent_thinker::{classify, Intent};
use aigent_tools::ToolRegistry;
use serde_json::{json, Value};
use tracing::warn;

use crate::events::{EventBus, PealEvent};
use crate::request::AgentResponse;

pub struct PealEngine {
    memory: Arc<dyn MemoryStore>,
    working_memory: Arc<WorkingMemoryGraph>,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    procedures: ProcedureManager,
    executor: DagExecutor,
    events: Arc<EventBus>,
    config: PealConfig,
}

impl PealEngine {
    pub fn new(
        memory: Arc<dyn MemoryStore>,
        working_memory: Arc<WorkingMemoryGraph>,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        events: Arc<EventBus>,
        config: PealConfig,
    ) -> Self {
        let procedures = ProcedureManager::new(memory.clone());
        let executor = DagExecutor::new(memory.clone(), tools.clone());
        PealEngine { memory, working_memory, llm, tools, procedures, executor, events, config }
    }

    pub async fn handle(&self, user_request: &str) -> AgentResponse {
        let trace_id = Node::new("Trace").uuid;
        let provenance = Provenance::new("user", trace_id.clone());
        self.events.emit(PealEvent::RequestReceived { trace_id: trace_id.clone(), request: user_request.to_string() });
        self.log_message(user_request, &provenance).await;

        let classification = match classify(self.llm.as_ref(), user_request, self.config.skip_llm_for_obvious_intents).await {
            Ok(c) => c,
            Err(_) => aigent_thinker::Classification { intent: aigent_thinker::infer_intent(user_request), confidence: 0.0, deterministic: true },
        };
        let intent = classification.intent;

        let query_embedding = self.llm.embed(user_request).await.ok();
        let top_k = if matches!(intent, Intent::Inform) { 50 } else { 5 };
        let hits = self.memory.search(user_request, top_k, None, query_embedding.as_deref()).await;
        let ranked = self.rank_by_activation(hits);
        self.events.emit(PealEvent::RagQuery { trace_id: trace_id.clone(), hit_count: ranked.len() });

        if let Some(answer) = self.direct_answer(intent, user_request, &ranked) {
            return AgentResponse::completed(trace_id, intent.as_str(), Some(answer), None);
        }
        if let Some(answer) = self.memory_answer(intent, user_request, &ranked) {
            return AgentResponse::completed(trace_id, intent.as_str(), Some(answer), None);
        }

        let context: Vec<String> = ranked.iter().take(5).filter_map(|h| h.node.prop_str("description").or_else(|| h.node.prop_str("title")).map(str::to_string)).collect();

        let plan = match self.generate_plan(user_request, intent, &context).await {
            Ok(plan) if !plan.steps.is_empty() => plan,
            _ => self.fallback_or_reuse(user_request, intent, query_embedding.as_deref(), &trace_id).await,
        };

        self.events.emit(PealEvent::PlanReady { trace_id: trace_id.clone(), step_count: plan.steps.len(), confidence: plan.confidence });

        if plan.steps.is_empty() && !matches!(intent, Intent::Remember | Intent::Task | Intent::Event) {
            return AgentResponse::ask_user(trace_id, intent.as_str(), "I don't have enough information to act on that. Could you clarify what you'd like me to do?");
        }

        if let Some(confidence) = plan.confidence {
            if confidence < self.config.plan_min_confidence {
                return AgentResponse::ask_user(trace_id, intent.as_str(), "This plan needs your approval before I run it.");
            }
        }

        let outcome = self.execute_with_adaptation(user_request, intent, &context, plan.clone(), &trace_id, &provenance).await;
        self.events.emit(PealEvent::ExecutionCompleted { trace_id: trace_id.clone(), status: outcome.status.clone() });

        let success = outcome.status == "success";
        self.self_heal_note(&plan, &outcome);

        if success {
            if let Some(selected) = ranked.first() {
                self.working_memory.link(&trace_id, &selected.node.uuid, 2.0);
            }
        }

        let record_result = self
            .procedures
            .record_run(plan.procedure_uuid.as_deref(), user_request, success, &trace_id, &provenance)
            .await;
        if let Err(e) = &record_result {
            warn!(error = %e, "failed to persist procedure run");
        }

        self.learn(user_request, &plan, &outcome, success, &provenance).await;

        if success {
            AgentResponse::completed(trace_id, intent.as_str(), None, Some(outcome))
        } else {
            AgentResponse::ask_user(trace_id, intent.as_str(), outcome.error.clone().unwrap_or_else(|| "execution failed".to_string()))
        }
    }

    async fn log_message(&self, text: &str, provenance: &Provenance) {
        let mut node = Node::new("Message").with_labels(vec!["Message".to_string()]);
        node.set_prop("text", json!(text));
        node.set_prop("source", json!(provenance.source.clone()));
        if let Ok(embedding) = self.llm.embed(text).await {
            node.embedding = Some(embedding);
        }
        let uuid = self.memory.upsert_node(node, provenance).await;
        self.events.emit(PealEvent::MessageLogged { trace_id: provenance.trace_id.clone(), uuid });
    }

    fn rank_by_activation(&self, mut hits: Vec<aigent_memory::SearchHit>) -> Vec<aigent_memory::SearchHit> {
        const ACTIVATION_WEIGHT: f32 = 0.1;
        hits.sort_by(|a, b| {
            let boost_a = self.working_memory.get_activation_boost(&a.node.uuid);
            let boost_b = self.working_memory.get_activation_boost(&b.node.uuid);
            let score_a = a.score + ACTIVATION_WEIGHT * boost_a;
            let score_b = b.score + ACTIVATION_WEIGHT * boost_b;
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }

    /// Step 4: `inform` queries naming a concept by id, answered straight
    /// from a stored `note` prop with no LLM call.
    fn direct_answer(&self, intent: Intent, request: &str, hits: &[aigent_memory::SearchHit]) -> Option<String> {
        if !matches!(intent, Intent::Inform) {
            return None;
        }
        let lower = request.to_lowercase();
        if !(lower.contains("note") || lower.contains("concept")) {
            return None;
        }
        let token = lower.split_whitespace().find(|w| w.starts_with("concept-"))?;
        hits.iter()
            .find(|h| h.node.prop_str("concept_id") == Some(token) && !h.node.prop_str("note").unwrap_or("").is_empty())
            .map(|h| h.node.prop_str("note").unwrap_or_default().to_string())
    }

    /// Step 5: heuristic extraction for other `inform` queries.
    fn memory_answer(&self, intent: Intent, request: &str, hits: &[aigent_memory::SearchHit]) -> Option<String> {
        if !matches!(intent, Intent::Inform) || hits.is_empty() {
            return None;
        }
        let lower = request.to_lowercase();

        if lower.contains("procedure") || lower.contains("workflow") {
            let hit = hits.iter().find(|h| h.node.kind == "Procedure")?;
            let title = hit.node.prop_str("title").unwrap_or("untitled procedure");
            let description = hit.node.prop_str("description").unwrap_or("");
            return Some(if description.is_empty() { title.to_string() } else { format!("{title}: {description}") });
        }

        if lower.contains("name") {
            for hit in hits {
                if let Some(text) = hit.node.prop_str("text") {
                    if let Some(idx) = text.to_lowercase().find("my name is") {
                        let name = text[idx + "my name is".len()..].trim().trim_end_matches('.');
                        if !name.is_empty() {
                            return Some(format!("Your name is {name}."));
                        }
                    }
                }
            }
        }

        None
    }

    async fn generate_plan(&self, request: &str, intent: Intent, context: &[String]) -> AgentResult<Plan> {
        let messages = build_plan_messages(request, intent, context);
        let raw = self.llm.chat(&messages, 0.0, Some(aigent_llm::ResponseFormat::JsonObject)).await?;
        parse_plan(&raw)
    }

    /// Step 7: on LLM failure or an empty plan, try to reuse the best
    /// matching procedure above the reuse threshold, else build a
    /// deterministic fallback plan for the classified intent.
    async fn fallback_or_reuse(&self, request: &str, intent: Intent, embedding: Option<&[f32]>, trace_id: &str) -> Plan {
        if let Some(hit) = self.procedures.top_match(request, embedding).await {
            if hit.score >= self.config.pattern_reuse_min_score {
                self.events.emit(PealEvent::ProcedureRecall { trace_id: trace_id.to_string(), procedure_uuid: hit.node.uuid.clone() });
                return Plan { intent: intent.as_str().to_string(), steps: Vec::new(), confidence: None, procedure_uuid: Some(hit.node.uuid) };
            }
        }

        deterministic_fallback_plan(intent, request)
    }

    async fn execute_with_adaptation(
        &self,
        request: &str,
        intent: Intent,
        context: &[String],
        mut plan: Plan,
        trace_id: &str,
        provenance: &Provenance,
    ) -> ExecutionOutcome {
        if let Some(procedure_uuid) = &plan.procedure_uuid {
            if plan.steps.is_empty() {
                return self.executor.run_procedure(procedure_uuid).await.unwrap_or_else(|e| ExecutionOutcome {
                    status: "error".to_string(),
                    results: Vec::new(),
                    error: Some(e.to_string()),
                });
            }
        }

        let mut attempt = 0;
        loop {
            let outcome = self.run_inline_steps(&plan, trace_id, provenance).await;
            if outcome.status == "success" || attempt >= self.config.max_adaptation_attempts {
                return outcome;
            }
            attempt += 1;
            let error = outcome.error.clone().unwrap_or_default();
            let messages = build_adaptation_messages(request, intent, context, &error);
            match self.llm.chat(&messages, 0.0, Some(aigent_llm::ResponseFormat::JsonObject)).await.ok().and_then(|raw| parse_plan(&raw).ok()) {
                Some(replan) if !replan.steps.is_empty() => plan = replan,
                _ => return outcome,
            }
        }
    }

    async fn run_inline_steps(&self, plan: &Plan, trace_id: &str, provenance: &Provenance) -> ExecutionOutcome {
        let mut results = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            self.events.emit(PealEvent::ToolStart { trace_id: trace_id.to_string(), tool: step.tool.clone() });
            let result = self.run_step(step, provenance).await;
            let success = result.status == "success";
            self.events.emit(PealEvent::ToolInvoked { trace_id: trace_id.to_string(), tool: step.tool.clone(), success });

            let failed = !success;
            results.push(result);
            if failed {
                return ExecutionOutcome {
                    status: "error".to_string(),
                    error: results.last().and_then(|r: &StepResult| r.error.clone()),
                    results,
                };
            }
        }
        ExecutionOutcome { status: "success".to_string(), results, error: None }
    }

    async fn run_step(&self, step: &PlanStep, provenance: &Provenance) -> StepResult {
        if step.tool == "memory.remember" {
            return self.run_remember_step(step, provenance).await;
        }

        let Some(tool) = self.tools.get(&step.tool) else {
            return StepResult { tool: step.tool.clone(), status: "no action taken".to_string(), output: Value::Null, error: None };
        };

        match tool.call(&step.params).await {
            Ok(output) => StepResult {
                tool: step.tool.clone(),
                status: if output.success { "success".to_string() } else { "error".to_string() },
                output: output.output,
                error: None,
            },
            Err(e) => StepResult { tool: step.tool.clone(), status: "error".to_string(), output: Value::Null, error: Some(e.to_string()) },
        }
    }

    async fn run_remember_step(&self, step: &PlanStep, provenance: &Provenance) -> StepResult {
        let text = step.params.get("text").and_then(Value::as_str).unwrap_or_default();
        let mut node = Node::new("Note").with_labels(vec!["Note".to_string()]);
        node.set_prop("text", json!(text));
        if let Ok(embedding) = self.llm.embed(text).await {
            node.embedding = Some(embedding);
        }
        let uuid = self.memory.upsert_node(node, provenance).await;
        self.events.emit(PealEvent::MemoryUpsert { trace_id: provenance.trace_id.clone(), uuid: uuid.clone() });
        StepResult { tool: "memory.remember".to_string(), status: "success".to_string(), output: json!({"uuid": uuid}), error: None }
    }

    /// Step 11 is handled inline by `DagExecutor` for reused procedures;
    /// inline ad-hoc plans have no persisted Step node to rewrite.
    fn self_heal_note(&self, _plan: &Plan, _outcome: &ExecutionOutcome) {}

    async fn learn(&self, request: &str, plan: &Plan, outcome: &ExecutionOutcome, success: bool, provenance: &Provenance) {
        if success {
            let _ = aigent_learning::learn_from_success(self.llm.as_ref(), &self.memory, request, outcome, provenance).await;
        } else {
            let similar = aigent_learning::find_similar_knowledge(self.llm.as_ref(), &self.memory, request, 3)
                .await
                .into_iter()
                .filter_map(|h| h.node.prop_str("summary").map(str::to_string))
                .collect::<Vec<_>>();
            let plan_steps: Vec<Value> = plan.steps.iter().map(|s| json!({"tool": s.tool, "params": s.params})).collect();
            let analysis = aigent_learning::analyze_failure(self.llm.as_ref(), request, &plan_steps, outcome, &similar).await;
            if analysis.confidence == 0.0 {
                warn!(root_cause = %analysis.root_cause, "failure analysis fell back to the canned response");
            }
        }
    }
}

fn deterministic_fallback_plan(intent: Intent, request: &str) -> Plan {
    match intent {
        Intent::Task => Plan {
            intent: intent.as_str().to_string(),
            steps: vec![PlanStep { tool: "tasks.create".to_string(), params: json!({"title": request}), comment: None }],
            confidence: None,
            procedure_uuid: None,
        },
        Intent::Remember => Plan {
            intent: intent.as_str().to_string(),
            steps: vec![PlanStep { tool: "memory.remember".to_string(), params: json!({"text": request}), comment: None }],
            confidence: None,
            procedure_uuid: None,
        },
        Intent::WebIo => {
            let url = request.split_whitespace().find(|w| w.starts_with("http://") || w.starts_with("https://"));
            match url {
                Some(url) => Plan {
                    intent: intent.as_str().to_string(),
                    steps: vec![
                        PlanStep { tool: "web.get_dom".to_string(), params: json!({"url": url}), comment: None },
                        PlanStep { tool: "web.screenshot".to_string(), params: json!({"url": url}), comment: None },
                    ],
                    confidence: None,
                    procedure_uuid: None,
                },
                None => Plan { intent: intent.as_str().to_string(), steps: Vec::new(), confidence: None, procedure_uuid: None },
            }
        }
        _ => Plan { intent: intent.as_str().to_string(), steps: Vec::new(), confidence: None, procedure_uuid: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_llm::MockLlmClient;
    use aigent_memory::InMemoryMemoryStore;
    use aigent_tools::{register_builtins, MockCalendar, MockContacts, MockTask, MockWeb};

    fn engine(llm: MockLlmClient, config: PealConfig) -> PealEngine {
        let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryMemoryStore::new());
        let working_memory = Arc::new(WorkingMemoryGraph::default());
        let mut registry = ToolRegistry::new();
        let shell: Arc<dyn aigent_tools::Shell> = Arc::new(aigent_exec::SafeShellExecutor::new(std::env::temp_dir()));
        register_builtins(&mut registry, Arc::new(MockCalendar::new()), Arc::new(MockTask::new()), Arc::new(MockContacts::new()), Arc::new(MockWeb::new()), shell);
        PealEngine::new(memory, working_memory, Arc::new(llm), Arc::new(registry), Arc::new(EventBus::new()), config)
    }

    #[tokio::test]
    async fn empty_steps_task_intent_creates_fallback_task() {
        let llm = MockLlmClient::new().with_default_chat(r#"{"intent": "task", "steps": []}"#);
        let engine = engine(llm, PealConfig::default());

        let response = engine.handle("remind me to test the agent").await;
        assert_eq!(response.status, crate::request::ResponseStatus::Completed);
        let outcome = response.execution.unwrap();
        assert_eq!(outcome.status, "success");
        assert_eq!(outcome.results[0].tool, "tasks.create");
    }

    #[tokio::test]
    async fn empty_steps_query_intent_asks_user() {
        let llm = MockLlmClient::new().with_default_chat(r#"{"intent": "query", "steps": []}"#);
        let engine = engine(llm, PealConfig::default());

        let response = engine.handle("what is the capital of France").await;
        assert_eq!(response.status, crate::request::ResponseStatus::AskUser);
    }

    #[tokio::test]
    async fn low_confidence_plan_asks_user() {
        let llm = MockLlmClient::new().with_default_chat(
            r#"{"intent": "task", "steps": [{"tool": "tasks.create", "params": {"title": "x"}}], "confidence": 0.2}"#,
        );
        let engine = engine(llm, PealConfig::default());

        let response = engine.handle("add x to my list").await;
        assert_eq!(response.status, crate::request::ResponseStatus::AskUser);
    }

    #[tokio::test]
    async fn invalid_llm_json_falls_back_without_crashing() {
        let llm = MockLlmClient::new().with_default_chat("not json at all");
        let engine = engine(llm, PealConfig::default());

        let response = engine.handle("remember to buy milk").await;
        assert_eq!(response.status, crate::request::ResponseStatus::Completed);
    }
}
