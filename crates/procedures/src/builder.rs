//! Persists Procedure + Step nodes with dependency edges, enforcing an
//! acyclic dependency graph.
//!
//! Grounded on `procedure_builder.py`'s `ProcedureBuilder`.

use std::collections::HashMap;
use std::sync::Arc;

use aigent_core::{rel, AgentError, AgentResult, Edge, Node, Provenance};
use aigent_memory::MemoryStore;
use serde_json::Value;

/// One step as supplied to `create_procedure`, before it becomes a `Node`.
#[derive(Debug, Clone, Default)]
pub struct StepSpec {
    pub title: String,
    pub tool: Option<String>,
    pub payload: Option<Value>,
    pub guard: Option<Value>,
    pub on_fail: Option<String>,
}

#[derive(Debug)]
pub struct ProcedureBuildResult {
    pub procedure_uuid: String,
    pub step_uuids: Vec<String>,
}

pub struct ProcedureBuilder {
    memory: Arc<dyn MemoryStore>,
}

impl ProcedureBuilder {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        ProcedureBuilder { memory }
    }

    /// `dependencies` is a list of `(prereq_index, step_index)` pairs, 0-based
    /// into `steps`. Validates indices and rejects cyclic dependency graphs
    /// before writing anything.
    pub async fn create_procedure(
        &self,
        title: &str,
        description: &str,
        steps: Vec<StepSpec>,
        dependencies: &[(usize, usize)],
        guards: &HashMap<usize, String>,
        provenance: &Provenance,
        embedding: Option<Vec<f32>>,
    ) -> AgentResult<ProcedureBuildResult> {
        let max_idx = steps.len().saturating_sub(1);
        for &(a, b) in dependencies {
            if (a > max_idx || b > max_idx) && !steps.is_empty() {
                return Err(AgentError::Internal("dependency index out of range".to_string()));
            }
        }
        if has_cycle(steps.len(), dependencies) {
            return Err(AgentError::Internal("procedure dependencies must be acyclic".to_string()));
        }

        let mut proc_node = Node::new("Procedure").with_labels(vec!["procedure".to_string()]);
        proc_node.set_prop("title", Value::String(title.to_string()));
        proc_node.set_prop("description", Value::String(description.to_string()));
        proc_node.set_prop("tested", Value::Bool(false));
        proc_node.set_prop("success_count", Value::from(0));
        proc_node.set_prop("failure_count", Value::from(0));
        proc_node.embedding = embedding;
        let procedure_uuid = self.memory.upsert_node(proc_node, provenance).await;

        let mut step_uuids = Vec::with_capacity(steps.len());
        for (idx, step) in steps.into_iter().enumerate() {
            let mut node = Node::new("Step").with_labels(vec!["step".to_string()]);
            node.set_prop("title", Value::String(step.title.clone()));
            if let Some(tool) = &step.tool {
                node.set_prop("tool", Value::String(tool.clone()));
            }
            if let Some(payload) = step.payload {
                node.set_prop("payload", payload);
            }
            node.set_prop("order", Value::from(idx));
            if let Some(guard_text) = guards.get(&idx) {
                node.set_prop("guard_text", Value::String(guard_text.clone()));
            }
            if let Some(guard) = step.guard {
                node.set_prop("guard", guard);
            }
            if let Some(on_fail) = &step.on_fail {
                node.set_prop("on_fail", Value::String(on_fail.clone()));
            }
            node.set_prop("procedure_uuid", Value::String(procedure_uuid.clone()));

            let step_uuid = self.memory.upsert_node(node, provenance).await;
            self.memory
                .upsert_edge(
                    Edge::new(procedure_uuid.clone(), step_uuid.clone(), rel::HAS_STEP)
                        .with_props(HashMap::from([("order".to_string(), Value::from(idx))])),
                    provenance,
                )
                .await;
            step_uuids.push(step_uuid);
        }

        for &(prereq_idx, step_idx) in dependencies {
            let prereq_uuid = step_uuids[prereq_idx].clone();
            let dep_uuid = step_uuids[step_idx].clone();
            self.memory
                .upsert_edge(
                    Edge::new(dep_uuid, prereq_uuid, rel::DEPENDS_ON).with_props(HashMap::from([
                        ("from_order".to_string(), Value::from(step_idx)),
                        ("to_order".to_string(), Value::from(prereq_idx)),
                    ])),
                    provenance,
                )
                .await;
        }

        Ok(ProcedureBuildResult { procedure_uuid, step_uuids })
    }

    pub async fn search_procedures(
        &self,
        query: &str,
        top_k: usize,
        query_embedding: Option<&[f32]>,
    ) -> Vec<aigent_memory::SearchHit> {
        let filters = HashMap::from([("kind".to_string(), Value::String("Procedure".to_string()))]);
        self.memory.search(query, top_k, Some(&filters), query_embedding).await
    }
}

/// Kahn's algorithm: a graph has a cycle iff not every node can be visited
/// by repeatedly removing zero-indegree nodes.
fn has_cycle(n_steps: usize, deps: &[(usize, usize)]) -> bool {
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n_steps];
    let mut indegree = vec![0usize; n_steps];
    for &(prereq, step) in deps {
        adj[prereq].push(step);
        indegree[step] += 1;
    }

    let mut queue: std::collections::VecDeque<usize> =
        (0..n_steps).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0;
    while let Some(cur) = queue.pop_front() {
        visited += 1;
        for &nei in &adj[cur] {
            indegree[nei] -= 1;
            if indegree[nei] == 0 {
                queue.push_back(nei);
            }
        }
    }
    visited != n_steps
}
