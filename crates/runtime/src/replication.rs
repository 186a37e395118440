//! Write-behind sink for working-memory edge reinforcement.
//!
//! Grounded on `aigent_memory::replicator::GraphClient`; the runtime is the
//! owner of the durable-write side of the working memory graph, the same
//! graph PEAL reads from on its hot path. Routing writes through the
//! replicator lets bursts of reinforcement (e.g. a scheduler tick touching
//! many edges at once) happen off the request path.

use std::sync::Arc;

use aigent_memory::{GraphClient, WorkingMemoryGraph};
use async_trait::async_trait;

pub struct WorkingMemoryReplicaClient {
    graph: Arc<WorkingMemoryGraph>,
}

impl WorkingMemoryReplicaClient {
    pub fn new(graph: Arc<WorkingMemoryGraph>) -> Self {
        WorkingMemoryReplicaClient { graph }
    }
}

#[async_trait]
impl GraphClient for WorkingMemoryReplicaClient {
    async fn increment_edge_weight(&self, source: &str, target: &str, delta: f32, max_weight: f32) {
        let _ = max_weight;
        self.graph.link(source, target, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigent_memory::{AsyncReplicator, EdgeUpdate};
    use std::time::Duration;

    #[tokio::test]
    async fn enqueued_update_reaches_the_working_memory_graph() {
        let graph = Arc::new(WorkingMemoryGraph::default());
        let client: Arc<dyn GraphClient> = Arc::new(WorkingMemoryReplicaClient::new(graph.clone()));
        let replicator = AsyncReplicator::new(client, 16);

        replicator
            .enqueue(EdgeUpdate { source: "a".to_string(), target: "b".to_string(), delta: 3.0, max_weight: 100.0 })
            .await;
        assert!(replicator.flush(Duration::from_secs(1)).await);

        assert_eq!(graph.get_weight("a", "b"), Some(3.0));
        replicator.stop().await;
    }
}
