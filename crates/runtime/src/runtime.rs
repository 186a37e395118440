//! Wires configuration and every subsystem crate into one running assistant.
//!
//! Grounded on the teacher's `AgentRuntime` (formerly
//! `crates/runtime/src/runtime/mod.rs`): a single struct owning config plus
//! the long-lived collaborators, with a constructor that assembles them and
//! narrow methods that drive one turn or one background tick. The teacher's
//! `AgentRuntime` routed chat directly to an `LlmRouter`; this one routes a
//! request through `PealEngine` and owns the async replicator and event bus
//! for their process lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use aigent_agent::{AgentResponse, EventBus, PealEngine};
use aigent_config::AppConfig;
use aigent_core::AgentResult;
use aigent_llm::LlmClient;
use aigent_memory::{
    proto, AsyncReplicator, GraphClient, InMemoryMemoryStore, KnowShowGo, MemoryStore, WorkingMemoryGraph,
};
use aigent_procedures::{Scheduler, TaskQueueManager, TimeRule};
use aigent_tools::{register_builtins, Calendar, Contacts, Shell, Task, ToolRegistry, Web};

use crate::replication::WorkingMemoryReplicaClient;

const REPLICATOR_CAPACITY: usize = 1024;

/// Everything one running assistant process needs, assembled once at
/// startup and shared across requests.
pub struct Runtime {
    pub config: AppConfig,
    pub memory: Arc<dyn MemoryStore>,
    pub working_memory: Arc<WorkingMemoryGraph>,
    pub tools: Arc<ToolRegistry>,
    pub events: Arc<EventBus>,
    pub replicator: Arc<AsyncReplicator>,
    pub queue: Arc<TaskQueueManager>,
    peal: PealEngine,
    scheduler: tokio::sync::Mutex<Scheduler>,
}

impl Runtime {
    /// Builds a fresh in-process memory store, seeds its prototype set,
    /// wires the tool registry from the given capability implementations,
    /// and starts the replicator's background worker.
    pub async fn new(
        config: AppConfig,
        llm: Arc<dyn LlmClient>,
        calendar: Arc<dyn Calendar>,
        task: Arc<dyn Task>,
        contacts: Arc<dyn Contacts>,
        web: Arc<dyn Web>,
        shell: Arc<dyn Shell>,
    ) -> Result<Self> {
        let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryMemoryStore::new());
        KnowShowGo::new(memory.clone()).ensure_seeds().await;

        let working_memory = Arc::new(WorkingMemoryGraph::new(
            config.peal.working_memory_reinforce_delta,
            config.peal.working_memory_max_weight,
        ));

        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry, calendar, task.clone(), contacts, web, shell);
        let tools = Arc::new(registry);

        let events = Arc::new(EventBus::new());

        let replica_client: Arc<dyn GraphClient> = Arc::new(WorkingMemoryReplicaClient::new(working_memory.clone()));
        let replicator = Arc::new(AsyncReplicator::new(replica_client, REPLICATOR_CAPACITY));

        let queue = Arc::new(TaskQueueManager::new(memory.clone(), "default"));
        let scheduler = Scheduler::new(task, memory.clone(), queue.clone());

        let peal = PealEngine::new(
            memory.clone(),
            working_memory.clone(),
            llm,
            tools.clone(),
            events.clone(),
            config.peal.clone(),
        );

        info!(agent = %config.agent.name, "runtime assembled");

        Ok(Runtime {
            config,
            memory,
            working_memory,
            tools,
            events,
            replicator,
            queue,
            peal,
            scheduler: tokio::sync::Mutex::new(scheduler),
        })
    }

    /// Runs one request end to end through the plan-execute-adapt loop.
    /// Never errors: PEAL always bottoms out in a `Completed` or `AskUser`
    /// response (§7 of the error-handling design).
    pub async fn handle(&self, request: &str) -> AgentResponse {
        self.peal.handle(request).await
    }

    pub async fn add_time_rule(&self, rule: TimeRule) {
        self.scheduler.lock().await.add_time_rule(rule);
    }

    /// Drives the scheduler for one minute boundary. Callers are expected
    /// to invoke this from exactly one task (the concurrency model's
    /// single-ticker rule: the scheduler is never invoked concurrently with
    /// itself).
    pub async fn tick_scheduler(&self, now: DateTime<Utc>) {
        self.scheduler.lock().await.tick(now).await;
    }

    /// Queues a reinforcement write through the replicator rather than
    /// touching the working memory graph inline.
    pub async fn reinforce(&self, source: &str, target: &str, delta: f32) -> bool {
        self.replicator
            .enqueue(aigent_memory::EdgeUpdate {
                source: source.to_string(),
                target: target.to_string(),
                delta,
                max_weight: self.config.peal.working_memory_max_weight,
            })
            .await
    }

    /// Creates the root `Agent` concept representing the assistant itself,
    /// if it doesn't already exist (grounded on `service.py`'s seed object).
    pub async fn ensure_self_concept(&self) -> AgentResult<String> {
        let existing = self.memory.search(&self.config.agent.name, 1, None, None).await;
        if let Some(hit) = existing.into_iter().find(|h| h.node.prop_str("prototype_uuid") == Some(proto::AGENT)) {
            return Ok(hit.node.uuid);
        }

        let ksg = KnowShowGo::new(self.memory.clone());
        ksg.create_concept(
            proto::AGENT,
            HashMap::from([("name".to_string(), json!(self.config.agent.name))]),
            None,
            None,
            &KnowShowGo::provenance("bootstrap"),
        )
        .await
    }

    /// Graceful shutdown: stops the replicator's background worker after
    /// giving it a brief window to drain.
    pub async fn shutdown(&self) {
        self.replicator.flush(Duration::from_secs(2)).await;
        self.replicator.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_exec::SafeShellExecutor;
    use aigent_llm::MockLlmClient;
    use aigent_tools::{MockCalendar, MockContacts, MockTask, MockWeb};

    async fn test_runtime() -> Runtime {
        let shell: Arc<dyn Shell> = Arc::new(SafeShellExecutor::new(std::env::temp_dir()));
        Runtime::new(
            AppConfig::default(),
            Arc::new(MockLlmClient::new().with_default_chat(r#"{"intent": "task", "steps": []}"#)),
            Arc::new(MockCalendar::new()),
            Arc::new(MockTask::new()),
            Arc::new(MockContacts::new()),
            Arc::new(MockWeb::new()),
            shell,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn new_seeds_the_prototype_set_once() {
        let runtime = test_runtime().await;
        assert!(runtime.memory.get_node(proto::AGENT).await.is_some());
    }

    #[tokio::test]
    async fn handle_never_panics_on_a_plain_request() {
        let runtime = test_runtime().await;
        let response = runtime.handle("remind me to water the plants").await;
        assert_eq!(response.intent, "task");
    }

    #[tokio::test]
    async fn ensure_self_concept_is_idempotent() {
        let runtime = test_runtime().await;
        let first = runtime.ensure_self_concept().await.unwrap();
        let second = runtime.ensure_self_concept().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn reinforce_round_trips_through_the_replicator() {
        let runtime = test_runtime().await;
        assert!(runtime.reinforce("a", "b", 5.0).await);
        assert!(runtime.replicator.flush(Duration::from_secs(1)).await);
        assert_eq!(runtime.working_memory.get_weight("a", "b"), Some(5.0));
        runtime.shutdown().await;
    }
}
