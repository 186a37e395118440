//! Time-based rule scheduler, ticked from the agent's event loop.
//!
//! Grounded on `scheduler.py`'s `Scheduler`/`TimeRule`. The fired-set
//! dedupes by `(title, minute)` so a tick landing twice in the same minute
//! doesn't double-enqueue.

use std::collections::HashSet;
use std::sync::Arc;

use aigent_core::{Node, Provenance};
use aigent_memory::MemoryStore;
use aigent_tools::Task;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::queue::TaskQueueManager;

#[derive(Debug, Clone)]
pub struct TimeRule {
    pub title: String,
    pub notes: String,
    pub hour: u32,
    pub minute: u32,
    pub priority: f64,
    pub labels: Vec<String>,
    /// Optional DAG payload to attach to the fired task node, for rules
    /// that should kick off a multi-step procedure rather than a bare task.
    pub dag: Option<Value>,
}

impl TimeRule {
    pub fn new(title: impl Into<String>, hour: u32, minute: u32) -> Self {
        TimeRule {
            title: title.into(),
            notes: String::new(),
            hour,
            minute,
            priority: 1.0,
            labels: vec!["Task".to_string(), "DAG".to_string()],
            dag: None,
        }
    }
}

pub struct Scheduler {
    tasks: Arc<dyn Task>,
    memory: Arc<dyn MemoryStore>,
    queue_manager: Arc<TaskQueueManager>,
    rules: Vec<TimeRule>,
    fired_keys: Mutex<HashSet<String>>,
}

impl Scheduler {
    pub fn new(tasks: Arc<dyn Task>, memory: Arc<dyn MemoryStore>, queue_manager: Arc<TaskQueueManager>) -> Self {
        Scheduler { tasks, memory, queue_manager, rules: Vec::new(), fired_keys: Mutex::new(HashSet::new()) }
    }

    pub fn add_time_rule(&mut self, rule: TimeRule) {
        self.rules.push(rule);
    }

    /// Evaluates rules against `now` and enqueues matching tasks. Assumed
    /// called from a single ticking task; concurrent calls would race on
    /// the fired-set.
    pub async fn tick(&self, now: DateTime<Utc>) {
        for rule in &self.rules {
            if now.format("%H").to_string().parse::<u32>().unwrap_or(99) != rule.hour {
                continue;
            }
            if now.format("%M").to_string().parse::<u32>().unwrap_or(99) != rule.minute {
                continue;
            }

            let key = format!("{}:{}", rule.title, now.format("%Y-%m-%dT%H:%M"));
            let mut fired = self.fired_keys.lock().await;
            if fired.contains(&key) {
                continue;
            }
            fired.insert(key);
            drop(fired);

            self.fire_rule(rule).await;
        }
    }

    async fn fire_rule(&self, rule: &TimeRule) {
        let Ok(created) = self
            .tasks
            .create_task(&rule.title, None, rule.priority as i64, &rule.notes, Vec::new())
            .await
        else {
            return;
        };

        let mut node = Node::new("Task").with_labels(rule.labels.clone());
        node.set_prop("title", Value::String(rule.title.clone()));
        node.set_prop("priority", Value::from(rule.priority));
        node.set_prop("notes", Value::String(rule.notes.clone()));
        node.set_prop("status", Value::String("pending".to_string()));
        node.set_prop("task_id", Value::String(created.id));
        if let Some(dag) = &rule.dag {
            node.set_prop("dag", dag.clone());
        }

        let prov = Provenance::new("user", "scheduler");
        self.memory.upsert_node(node.clone(), &prov).await;
        let _ = self.queue_manager.enqueue(&node, &prov).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_memory::InMemoryMemoryStore;
    use aigent_tools::MockTask;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn tick_fires_matching_rule_once() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let queue = Arc::new(TaskQueueManager::new(memory.clone(), "default"));
        let mut scheduler = Scheduler::new(Arc::new(MockTask::new()), memory, queue.clone());
        scheduler.add_time_rule(TimeRule::new("morning briefing", 8, 0));

        scheduler.tick(at(8, 0)).await;
        scheduler.tick(at(8, 0)).await;

        assert_eq!(queue.items().await.len(), 1);
    }

    #[tokio::test]
    async fn tick_ignores_non_matching_time() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let queue = Arc::new(TaskQueueManager::new(memory.clone(), "default"));
        let mut scheduler = Scheduler::new(Arc::new(MockTask::new()), memory, queue.clone());
        scheduler.add_time_rule(TimeRule::new("morning briefing", 8, 0));

        scheduler.tick(at(9, 0)).await;
        assert!(queue.items().await.is_empty());
    }
}
