//! Procedure lifecycle bookkeeping: reuse lookup and run persistence.
//!
//! Grounded on spec §4.5 steps 7 and 12 — the procedure builder only knows
//! how to create; finding the best existing match and recording a run's
//! outcome live here.

use std::sync::Arc;

use aigent_core::{rel, AgentResult, Edge, Node, Provenance};
use aigent_memory::{MemoryStore, SearchHit};
use serde_json::Value;

use crate::builder::ProcedureBuilder;

pub struct ProcedureManager {
    memory: Arc<dyn MemoryStore>,
    builder: ProcedureBuilder,
}

impl ProcedureManager {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        ProcedureManager { memory: memory.clone(), builder: ProcedureBuilder::new(memory) }
    }

    /// Best-matching existing procedure for `query`, if any hit at all
    /// (callers apply their own score threshold, e.g. `PATTERN_REUSE_MIN_SCORE`).
    pub async fn top_match(&self, query: &str, query_embedding: Option<&[f32]>) -> Option<SearchHit> {
        self.builder.search_procedures(query, 1, query_embedding).await.into_iter().next()
    }

    /// Creates or updates the Procedure named by `procedure_uuid` (or, when
    /// `None`, creates a fresh one named `goal`) with run statistics, then
    /// records a `ProcedureRun` node linked by `run_of`.
    pub async fn record_run(
        &self,
        procedure_uuid: Option<&str>,
        goal: &str,
        success: bool,
        trace_id: &str,
        provenance: &Provenance,
    ) -> AgentResult<String> {
        let mut node = match procedure_uuid {
            Some(uuid) => match self.memory.get_node(uuid).await {
                Some(existing) => existing,
                None => Node::new("Procedure").with_uuid(uuid),
            },
            None => Node::new("Procedure"),
        };

        node.set_prop("goal", Value::String(goal.to_string()));
        node.set_prop("tested", Value::Bool(true));
        let success_count = node.prop_f64("success_count").unwrap_or(0.0) as u64 + u64::from(success);
        let failure_count = node.prop_f64("failure_count").unwrap_or(0.0) as u64 + u64::from(!success);
        node.set_prop("success_count", Value::from(success_count));
        node.set_prop("failure_count", Value::from(failure_count));
        node.set_prop("last_status", Value::String(if success { "success".to_string() } else { "error".to_string() }));
        node.set_prop("last_trace_id", Value::String(trace_id.to_string()));

        let proc_uuid = self.memory.upsert_node(node, provenance).await;

        let mut run = Node::new("ProcedureRun");
        run.set_prop("procedure_uuid", Value::String(proc_uuid.clone()));
        run.set_prop("status", Value::String(if success { "success".to_string() } else { "error".to_string() }));
        run.set_prop("trace_id", Value::String(trace_id.to_string()));
        run.set_prop("ts", Value::String(provenance.ts.to_rfc3339()));
        let run_uuid = self.memory.upsert_node(run, provenance).await;

        self.memory.upsert_edge(Edge::new(run_uuid.clone(), proc_uuid.clone(), rel::RUN_OF), provenance).await;

        Ok(proc_uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_memory::InMemoryMemoryStore;

    #[tokio::test]
    async fn record_run_creates_procedure_and_run_when_none_exists() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let manager = ProcedureManager::new(memory.clone());
        let prov = Provenance::new("user", "trace-1");

        let proc_uuid = manager.record_run(None, "book a flight", true, "trace-1", &prov).await.unwrap();
        let node = memory.get_node(&proc_uuid).await.unwrap();
        assert_eq!(node.props["success_count"], 1);
        assert_eq!(node.props["failure_count"], 0);
        assert_eq!(node.props["last_status"], "success");
    }

    #[tokio::test]
    async fn record_run_accumulates_counts_monotonically() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let manager = ProcedureManager::new(memory.clone());
        let prov = Provenance::new("user", "trace-1");

        let proc_uuid = manager.record_run(None, "book a flight", true, "trace-1", &prov).await.unwrap();
        manager.record_run(Some(&proc_uuid), "book a flight", false, "trace-2", &prov).await.unwrap();

        let node = memory.get_node(&proc_uuid).await.unwrap();
        assert_eq!(node.props["success_count"], 1);
        assert_eq!(node.props["failure_count"], 1);
        assert_eq!(node.props["last_status"], "error");
        assert_eq!(node.props["last_trace_id"], "trace-2");
    }
}
