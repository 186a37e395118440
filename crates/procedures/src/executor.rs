//! Sequential DAG executor: loads a procedure's steps, evaluates guards
//! against the prior step's result, dispatches through the tool registry,
//! and performs selector-fallback self-healing on `web.fill` steps.

use std::collections::HashMap;
use std::sync::Arc;

use aigent_core::{rel, AgentResult, Node, Provenance};
use aigent_memory::MemoryStore;
use aigent_tools::ToolRegistry;
use serde_json::{json, Value};

/// Field-name -> ordered list of fallback CSS selectors to try when the
/// plan-supplied selector fails.
fn fallback_selectors(field: &str) -> &'static [&'static str] {
    match field {
        "email" => &["input[type='email']", "#email", "input[name='email']"],
        "password" => &["input[type='password']", "#password", "input[name='password']"],
        "username" => &["input[name='username']", "#username", "input[type='text']"],
        _ => &[],
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StepResult {
    pub tool: String,
    pub status: String,
    pub output: Value,
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionOutcome {
    pub status: String,
    pub results: Vec<StepResult>,
    pub error: Option<String>,
}

struct LoadedStep {
    uuid: String,
    tool: String,
    params: Value,
    guard: Option<Value>,
}

pub struct DagExecutor {
    memory: Arc<dyn MemoryStore>,
    tools: Arc<ToolRegistry>,
}

fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |cur, segment| cur.get(segment))
}

fn eval_guard(guard: &Value, context: &Value) -> bool {
    let Some(op) = guard.get("type").and_then(Value::as_str) else { return true };
    let Some(path) = guard.get("path").and_then(Value::as_str) else { return true };
    let actual = get_path(context, path);
    match op {
        "equals" => actual == guard.get("value"),
        "not_equals" => actual != guard.get("value"),
        "exists" => actual.is_some(),
        _ => true,
    }
}

impl DagExecutor {
    pub fn new(memory: Arc<dyn MemoryStore>, tools: Arc<ToolRegistry>) -> Self {
        DagExecutor { memory, tools }
    }

    async fn load_steps(&self, procedure_uuid: &str) -> Vec<LoadedStep> {
        let edges = self.memory.get_edges(Some(procedure_uuid), None, Some(rel::HAS_STEP)).await;
        if !edges.is_empty() {
            let mut pairs: Vec<(i64, Node)> = Vec::new();
            for edge in edges {
                if let Some(node) = self.memory.get_node(&edge.to_node).await {
                    let order = node.prop_f64("order").unwrap_or(0.0) as i64;
                    pairs.push((order, node));
                }
            }
            pairs.sort_by_key(|(order, _)| *order);
            return pairs
                .into_iter()
                .map(|(_, node)| LoadedStep {
                    uuid: node.uuid.clone(),
                    tool: node.prop_str("tool").unwrap_or_default().to_string(),
                    params: node.props.get("payload").cloned().unwrap_or(Value::Null),
                    guard: node.props.get("guard").cloned(),
                })
                .collect();
        }

        // Fallback: a legacy/reused procedure may carry its steps inline.
        let Some(proc_node) = self.memory.get_node(procedure_uuid).await else { return Vec::new() };
        let Some(Value::Array(steps)) = proc_node.props.get("steps") else { return Vec::new() };
        steps
            .iter()
            .map(|s| LoadedStep {
                uuid: s.get("uuid").and_then(Value::as_str).unwrap_or_default().to_string(),
                tool: s.get("tool").and_then(Value::as_str).unwrap_or_default().to_string(),
                params: s.get("params").cloned().unwrap_or(Value::Null),
                guard: s.get("guard").cloned(),
            })
            .collect()
    }

    pub async fn run_procedure(&self, procedure_uuid: &str) -> AgentResult<ExecutionOutcome> {
        let steps = self.load_steps(procedure_uuid).await;
        let mut results: Vec<StepResult> = Vec::new();
        let mut prior_output = Value::Null;

        for step in steps {
            if let Some(guard) = &step.guard {
                if !eval_guard(guard, &prior_output) {
                    let result = StepResult {
                        tool: step.tool.clone(),
                        status: "skipped".to_string(),
                        output: Value::Null,
                        error: None,
                    };
                    prior_output = result.output.clone();
                    results.push(result);
                    continue;
                }
            }

            let step_result = if step.tool == "web.fill" {
                self.run_web_fill(&step).await
            } else {
                self.run_tool_step(&step).await
            };

            match step_result {
                Ok(result) => {
                    prior_output = result.output.clone();
                    results.push(result);
                }
                Err(e) => {
                    return Ok(ExecutionOutcome {
                        status: "error".to_string(),
                        results,
                        error: Some(format!("{} failed: {e}", step.tool)),
                    });
                }
            }
        }

        Ok(ExecutionOutcome { status: "success".to_string(), results, error: None })
    }

    async fn run_tool_step(&self, step: &LoadedStep) -> AgentResult<StepResult> {
        let Some(tool) = self.tools.get(&step.tool) else {
            return Ok(StepResult {
                tool: step.tool.clone(),
                status: "no action taken".to_string(),
                output: Value::Null,
                error: None,
            });
        };

        let output = tool.call(&step.params).await?;
        Ok(StepResult {
            tool: step.tool.clone(),
            status: if output.success { "success".to_string() } else { "error".to_string() },
            output: output.output,
            error: None,
        })
    }

    /// `web.fill` with a `selectors` map: try the plan-given selector per
    /// field, falling back through a fixed table on failure. The winning
    /// selector is written back to the stored Step when this procedure was
    /// loaded from persistence (self-healing).
    async fn run_web_fill(&self, step: &LoadedStep) -> AgentResult<StepResult> {
        let Some(tool) = self.tools.get("web.fill") else {
            return Ok(StepResult {
                tool: "web.fill".to_string(),
                status: "no action taken".to_string(),
                output: Value::Null,
                error: None,
            });
        };

        let url = step.params.get("url").and_then(Value::as_str).unwrap_or_default();
        let selectors: HashMap<String, String> = step
            .params
            .get("selectors")
            .and_then(Value::as_object)
            .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
            .unwrap_or_default();
        let values: HashMap<String, String> = step
            .params
            .get("values")
            .and_then(Value::as_object)
            .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
            .unwrap_or_default();

        let mut filled = serde_json::Map::new();
        let mut winning_selectors: HashMap<String, String> = HashMap::new();

        for (field, selector) in &selectors {
            let value = values.get(field).cloned().unwrap_or_default();
            let mut attempted = vec![selector.clone()];
            let mut outcome =
                tool.call(&json!({ "url": url, "selector": selector, "value": value })).await;

            let mut used_fallback = false;
            if outcome.is_err() {
                for candidate in fallback_selectors(field) {
                    attempted.push(candidate.to_string());
                    outcome = tool.call(&json!({ "url": url, "selector": candidate, "value": value })).await;
                    if outcome.is_ok() {
                        used_fallback = true;
                        winning_selectors.insert(field.clone(), candidate.to_string());
                        break;
                    }
                }
            } else {
                winning_selectors.insert(field.clone(), selector.clone());
            }

            match outcome {
                Ok(_) => {
                    let mut entry = serde_json::Map::new();
                    entry.insert("attempted_selectors".to_string(), json!(attempted));
                    if used_fallback {
                        entry.insert("fallback_selector".to_string(), json!(winning_selectors[field]));
                    }
                    filled.insert(field.clone(), Value::Object(entry));
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }

        if step.uuid.is_empty() {
            // Inline/non-persisted step: nothing to rewrite.
        } else if let Some(mut node) = self.memory.get_node(&step.uuid).await {
            if let Some(payload) = node.props.get_mut("payload") {
                if let Some(sel_obj) = payload.get_mut("selectors").and_then(Value::as_object_mut) {
                    for (field, selector) in &winning_selectors {
                        sel_obj.insert(field.clone(), Value::String(selector.clone()));
                    }
                }
            }
            self.memory.upsert_node(node, &Provenance::new("system", "self-heal")).await;
        }

        Ok(StepResult {
            tool: "web.fill".to_string(),
            status: "success".to_string(),
            output: Value::Object(filled),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_core::Edge;
    use aigent_memory::InMemoryMemoryStore;
    use aigent_tools::capability::{Web, WebPage};
    use aigent_tools::builtins::WebFill;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn prov() -> Provenance {
        Provenance::new("user", "t1")
    }

    struct FlakyWeb {
        /// selectors that succeed; anything else returns NotFound
        accepted: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Web for FlakyWeb {
        async fn get(&self, url: &str) -> AgentResult<WebPage> {
            Ok(WebPage { url: url.to_string(), title: String::new(), text: String::new(), session_id: None })
        }
        async fn post(&self, url: &str, _payload: &Value) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn search(&self, _query: &str) -> AgentResult<Vec<WebPage>> {
            Ok(vec![])
        }
        async fn screenshot(&self, url: &str) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn get_dom(&self, url: &str) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn click_xy(&self, url: &str, _x: i64, _y: i64) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn click_selector(&self, url: &str, _selector: &str) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn click_xpath(&self, url: &str, _xpath: &str) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn fill(&self, url: &str, selector: &str, _value: &str) -> AgentResult<WebPage> {
            self.calls.lock().unwrap().push(selector.to_string());
            if self.accepted.contains(&selector) {
                Ok(WebPage { url: url.to_string(), title: String::new(), text: String::new(), session_id: None })
            } else {
                Err(aigent_core::AgentError::ToolFailure(format!("selector not found: {selector}")))
            }
        }
        async fn wait_for(&self, url: &str, _selector: &str, _timeout_ms: u64) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn scroll(&self, url: &str, _dx: i64, _dy: i64) -> AgentResult<WebPage> {
            self.get(url).await
        }
        async fn locate_bounding_box(&self, url: &str, _selector: &str) -> AgentResult<Value> {
            self.get(url).await?;
            Ok(json!({ "x": 0, "y": 0, "width": 0, "height": 0 }))
        }
        async fn close_session(&self, _session_id: &str) -> AgentResult<()> {
            Ok(())
        }
    }

    fn registry_with_flaky_web(web: Arc<dyn Web>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(WebFill(web)));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn runs_linear_steps_in_order() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let proc_uuid = memory.upsert_node(aigent_core::Node::new("Procedure"), &prov()).await;

        let mut step1 = aigent_core::Node::new("Step");
        step1.set_prop("tool", json!("unknown.tool"));
        step1.set_prop("order", json!(0));
        let step1_uuid = memory.upsert_node(step1, &prov()).await;
        memory.upsert_edge(Edge::new(proc_uuid.clone(), step1_uuid, rel::HAS_STEP), &prov()).await;

        let executor = DagExecutor::new(memory, Arc::new(ToolRegistry::new()));
        let outcome = executor.run_procedure(&proc_uuid).await.unwrap();
        assert_eq!(outcome.status, "success");
        assert_eq!(outcome.results[0].status, "no action taken");
    }

    #[tokio::test]
    async fn guard_skips_step_when_condition_fails() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let proc_uuid = memory.upsert_node(aigent_core::Node::new("Procedure"), &prov()).await;

        let mut step = aigent_core::Node::new("Step");
        step.set_prop("tool", json!("unknown.tool"));
        step.set_prop("order", json!(0));
        step.set_prop("guard", json!({"type": "exists", "path": "never"}));
        let step_uuid = memory.upsert_node(step, &prov()).await;
        memory.upsert_edge(Edge::new(proc_uuid.clone(), step_uuid, rel::HAS_STEP), &prov()).await;

        let executor = DagExecutor::new(memory, Arc::new(ToolRegistry::new()));
        let outcome = executor.run_procedure(&proc_uuid).await.unwrap();
        assert_eq!(outcome.results[0].status, "skipped");
    }

    #[tokio::test]
    async fn web_fill_falls_back_and_records_rollback_selector() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let proc_uuid = memory.upsert_node(aigent_core::Node::new("Procedure"), &prov()).await;

        let mut step = aigent_core::Node::new("Step");
        step.set_prop("tool", json!("web.fill"));
        step.set_prop("order", json!(0));
        step.set_prop(
            "payload",
            json!({
                "url": "https://example.com/login",
                "selectors": {"email": "#bad-email-selector"},
                "values": {"email": "me@example.com"}
            }),
        );
        let step_uuid = memory.upsert_node(step, &prov()).await;
        memory.upsert_edge(Edge::new(proc_uuid.clone(), step_uuid.clone(), rel::HAS_STEP), &prov()).await;

        let web: Arc<dyn Web> = Arc::new(FlakyWeb { accepted: vec!["input[type='email']"], calls: Mutex::new(vec![]) });
        let executor = DagExecutor::new(memory.clone(), registry_with_flaky_web(web));
        let outcome = executor.run_procedure(&proc_uuid).await.unwrap();

        assert_eq!(outcome.status, "success");
        let filled = &outcome.results[0].output["email"];
        assert_eq!(filled["fallback_selector"], "input[type='email']");

        let reloaded = memory.get_node(&step_uuid).await.unwrap();
        assert_eq!(reloaded.props["payload"]["selectors"]["email"], "input[type='email']");
    }
}
