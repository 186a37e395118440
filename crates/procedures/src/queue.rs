//! Simple task queue persisted as a single `TaskQueue` node.
//!
//! Grounded on `task_queue.py`'s `TaskQueueManager`. Items are ordered by
//! priority ascending, then due date ascending, then creation time
//! ascending (ties broken in that order, per spec boundary behavior).

use std::sync::Arc;

use aigent_core::{AgentResult, Node, Provenance};
use aigent_memory::MemoryStore;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub struct TaskQueueManager {
    memory: Arc<dyn MemoryStore>,
    name: String,
    queue_uuid: Mutex<Option<String>>,
}

impl TaskQueueManager {
    pub fn new(memory: Arc<dyn MemoryStore>, name: impl Into<String>) -> Self {
        TaskQueueManager { memory, name: name.into(), queue_uuid: Mutex::new(None) }
    }

    pub async fn ensure_queue(&self) -> AgentResult<String> {
        let mut uuid = self.queue_uuid.lock().await;
        if let Some(existing) = uuid.as_ref() {
            return Ok(existing.clone());
        }
        let mut node = Node::new("TaskQueue").with_labels(vec!["task_queue".to_string(), self.name.clone()]);
        node.set_prop("name", Value::String(self.name.clone()));
        node.set_prop("items", json!([]));
        let now = Utc::now().to_rfc3339();
        node.set_prop("created_at", Value::String(now.clone()));
        node.set_prop("updated_at", Value::String(now));
        let created = self.memory.upsert_node(node, &Self::bookkeeping_provenance()).await;
        *uuid = Some(created.clone());
        Ok(created)
    }

    fn bookkeeping_provenance() -> Provenance {
        Provenance::new("system", "task-queue")
    }

    pub async fn enqueue(&self, task: &Node, provenance: &Provenance) -> AgentResult<()> {
        let queue_uuid = self.ensure_queue().await?;
        let mut queue = self.memory.get_node(&queue_uuid).await.expect("queue node just created");

        let mut items: Vec<Value> = queue.props.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        items.push(json!({
            "task_uuid": task.uuid,
            "title": task.prop_str("title"),
            "priority": task.prop_f64("priority"),
            "due": task.prop_str("due"),
            "status": task.prop_str("status").unwrap_or("pending"),
            "created_at": Utc::now().to_rfc3339(),
        }));
        sort_items(&mut items);

        queue.set_prop("items", Value::Array(items));
        queue.set_prop("updated_at", Value::String(Utc::now().to_rfc3339()));
        self.memory.upsert_node(queue, provenance).await;
        Ok(())
    }

    pub async fn update_status(&self, task_uuid: &str, status: &str, provenance: &Provenance) -> AgentResult<()> {
        let queue_uuid = self.ensure_queue().await?;
        let Some(mut queue) = self.memory.get_node(&queue_uuid).await else { return Ok(()) };

        if let Some(items) = queue.props.get_mut("items").and_then(Value::as_array_mut) {
            for item in items.iter_mut() {
                if item.get("task_uuid").and_then(Value::as_str) == Some(task_uuid) {
                    item["status"] = Value::String(status.to_string());
                    break;
                }
            }
        }
        queue.set_prop("updated_at", Value::String(Utc::now().to_rfc3339()));
        self.memory.upsert_node(queue, provenance).await;
        Ok(())
    }

    pub async fn items(&self) -> Vec<Value> {
        let Some(uuid) = self.queue_uuid.lock().await.clone() else { return Vec::new() };
        self.memory
            .get_node(&uuid)
            .await
            .and_then(|n| n.props.get("items").and_then(Value::as_array).cloned())
            .unwrap_or_default()
    }
}

fn sort_items(items: &mut [Value]) {
    items.sort_by(|a, b| {
        let pa = a.get("priority").and_then(Value::as_f64).unwrap_or(999.0);
        let pb = b.get("priority").and_then(Value::as_f64).unwrap_or(999.0);
        pa.partial_cmp(&pb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let da = a.get("due").and_then(Value::as_str).unwrap_or("");
                let db = b.get("due").and_then(Value::as_str).unwrap_or("");
                da.cmp(db)
            })
            .then_with(|| {
                let ca = a.get("created_at").and_then(Value::as_str).unwrap_or("");
                let cb = b.get("created_at").and_then(Value::as_str).unwrap_or("");
                ca.cmp(cb)
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_memory::InMemoryMemoryStore;

    fn task(title: &str, priority: f64) -> Node {
        let mut n = Node::new("Task");
        n.set_prop("title", Value::String(title.to_string()));
        n.set_prop("priority", json!(priority));
        n
    }

    #[tokio::test]
    async fn enqueue_sorts_by_priority_ascending() {
        let manager = TaskQueueManager::new(Arc::new(InMemoryMemoryStore::new()), "default");
        let prov = Provenance::new("user", "t1");
        manager.enqueue(&task("low prio", 5.0), &prov).await.unwrap();
        manager.enqueue(&task("high prio", 1.0), &prov).await.unwrap();

        let items = manager.items().await;
        assert_eq!(items[0]["title"], "high prio");
        assert_eq!(items[1]["title"], "low prio");
    }

    #[tokio::test]
    async fn update_status_changes_matching_item() {
        let manager = TaskQueueManager::new(Arc::new(InMemoryMemoryStore::new()), "default");
        let prov = Provenance::new("user", "t1");
        let t = task("a task", 1.0);
        manager.enqueue(&t, &prov).await.unwrap();

        manager.update_status(&t.uuid, "done", &prov).await.unwrap();
        let items = manager.items().await;
        assert_eq!(items[0]["status"], "done");
    }

    #[tokio::test]
    async fn missing_priority_defaults_to_low_priority() {
        let manager = TaskQueueManager::new(Arc::new(InMemoryMemoryStore::new()), "default");
        let prov = Provenance::new("user", "t1");
        manager.enqueue(&Node::new("Task"), &prov).await.unwrap();
        manager.enqueue(&task("urgent", 0.0), &prov).await.unwrap();

        let items = manager.items().await;
        assert_eq!(items[0]["title"], "urgent");
    }
}
