//! In-process memory store: upsert/search over nodes and edges.
//!
//! Grounded on the KnowShowGo HTTP service's `InMemoryStore` (host-keyed
//! text scoring + cosine similarity fallback) and the teacher's
//! `MemoryStore` (`Vec` + `HashMap` index) collection shape.

use std::collections::HashMap;
use std::sync::RwLock;

use aigent_core::{cosine_similarity, Edge, Node, Provenance};
use async_trait::async_trait;
use serde_json::{json, Value};

/// A single scored search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub node: Node,
    pub score: f32,
}

/// Capability interface the core consumes for all graph reads/writes.
///
/// Implementations (in-memory, HTTP adapter, durable backend) are injected
/// at startup; the core never depends on a concrete backend. Every write
/// carries a [`Provenance`] so the backend can record who or what produced
/// it, mirroring `MemoryTools.upsert`'s signature.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn upsert_node(&self, node: Node, provenance: &Provenance) -> String;
    async fn upsert_edge(&self, edge: Edge, provenance: &Provenance) -> String;
    async fn get_node(&self, uuid: &str) -> Option<Node>;
    async fn get_edges(
        &self,
        from_node: Option<&str>,
        to_node: Option<&str>,
        rel: Option<&str>,
    ) -> Vec<Edge>;
    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filters: Option<&HashMap<String, Value>>,
        query_embedding: Option<&[f32]>,
    ) -> Vec<SearchHit>;
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
}

/// The default in-process backend: two `HashMap`s guarded by one lock, which
/// satisfies the linearizable single-key read/write contract the concurrency
/// model requires without needing a per-request actor.
#[derive(Default)]
pub struct InMemoryMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_text(node: &Node) -> String {
        let mut parts = vec![node.kind.clone(), node.labels.join(" ")];
        for key in ["name", "title", "label"] {
            if let Some(v) = node.prop_str(key) {
                parts.push(v.to_string());
            }
        }
        parts.join(" ").to_lowercase()
    }

    fn text_score(query_lower: &str, node_text: &str) -> f32 {
        if query_lower.is_empty() {
            return 0.0;
        }
        if node_text.contains(query_lower) {
            0.8
        } else if query_lower.split_whitespace().any(|w| node_text.contains(w)) {
            0.5
        } else {
            0.0
        }
    }

    /// Stamps `{source, ts, confidence, trace_id}` onto a reserved prop so
    /// every write carries the provenance of the request that produced it.
    fn stamp(props: &mut HashMap<String, Value>, provenance: &Provenance) {
        props.insert(
            "_provenance".to_string(),
            json!({
                "source": provenance.source,
                "ts": provenance.ts.to_rfc3339(),
                "confidence": provenance.confidence,
                "trace_id": provenance.trace_id,
            }),
        );
    }

    fn matches_filters(node: &Node, filters: &HashMap<String, Value>) -> bool {
        for (key, expected) in filters {
            let actual = if key == "kind" {
                Some(Value::String(node.kind.clone()))
            } else {
                node.props.get(key).cloned()
            };
            if actual.as_ref() != Some(expected) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn upsert_node(&self, mut node: Node, provenance: &Provenance) -> String {
        Self::stamp(&mut node.props, provenance);
        let mut inner = self.inner.write().unwrap();
        let uuid = node.uuid.clone();
        inner.nodes.insert(uuid.clone(), node);
        uuid
    }

    async fn upsert_edge(&self, mut edge: Edge, provenance: &Provenance) -> String {
        Self::stamp(&mut edge.props, provenance);
        let mut inner = self.inner.write().unwrap();
        let uuid = edge.uuid.clone();
        inner.edges.insert(uuid.clone(), edge);
        uuid
    }

    async fn get_node(&self, uuid: &str) -> Option<Node> {
        self.inner.read().unwrap().nodes.get(uuid).cloned()
    }

    async fn get_edges(
        &self,
        from_node: Option<&str>,
        to_node: Option<&str>,
        rel: Option<&str>,
    ) -> Vec<Edge> {
        self.inner
            .read()
            .unwrap()
            .edges
            .values()
            .filter(|e| from_node.map(|f| e.from_node == f).unwrap_or(true))
            .filter(|e| to_node.map(|t| e.to_node == t).unwrap_or(true))
            .filter(|e| rel.map(|r| e.rel == r).unwrap_or(true))
            .cloned()
            .collect()
    }

    async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filters: Option<&HashMap<String, Value>>,
        query_embedding: Option<&[f32]>,
    ) -> Vec<SearchHit> {
        let query_lower = query_text.to_lowercase();
        let wants_prototypes = filters
            .and_then(|f| f.get("kind"))
            .and_then(Value::as_str)
            .map(|k| k == "Prototype")
            .unwrap_or(false);

        let inner = self.inner.read().unwrap();
        let mut hits: Vec<SearchHit> = inner
            .nodes
            .values()
            .filter(|n| wants_prototypes || !n.is_prototype())
            .filter(|n| filters.map(|f| Self::matches_filters(n, f)).unwrap_or(true))
            .filter_map(|n| {
                let node_text = Self::node_text(n);
                let mut score = Self::text_score(&query_lower, &node_text);
                if let (Some(q), Some(e)) = (query_embedding, n.embedding.as_deref()) {
                    let emb_score = cosine_similarity(q, e);
                    score = score.max(emb_score);
                }
                if score > 0.0 || query_embedding.is_some() {
                    Some(SearchHit {
                        node: n.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(name: &str, embedding: Option<Vec<f32>>) -> Node {
        let mut n = Node::new("Concept");
        n.set_prop("name", Value::String(name.into()));
        n.embedding = embedding;
        n
    }

    fn prov() -> Provenance {
        Provenance::new("test", "t1")
    }

    #[tokio::test]
    async fn upsert_then_get_returns_same_node() {
        let store = InMemoryMemoryStore::new();
        let node = concept("alpha", None);
        let uuid = store.upsert_node(node.clone(), &prov()).await;
        let fetched = store.get_node(&uuid).await.unwrap();
        assert_eq!(fetched.uuid, node.uuid);
        assert_eq!(fetched.prop_str("name"), Some("alpha"));
    }

    #[tokio::test]
    async fn upsert_node_stamps_provenance() {
        let store = InMemoryMemoryStore::new();
        let uuid = store.upsert_node(concept("alpha", None), &Provenance::new("user", "trace-1")).await;
        let fetched = store.get_node(&uuid).await.unwrap();
        let stamped = fetched.props.get("_provenance").unwrap();
        assert_eq!(stamped["source"], "user");
        assert_eq!(stamped["trace_id"], "trace-1");
    }

    #[tokio::test]
    async fn prototypes_excluded_from_plain_search() {
        let store = InMemoryMemoryStore::new();
        let mut proto = Node::new("Prototype");
        proto.set_prop("isPrototype", Value::Bool(true));
        proto.set_prop("name", Value::String("Concept".into()));
        store.upsert_node(proto, &prov()).await;

        let hits = store.search("concept", 10, None, None).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn embedding_search_ranks_by_similarity_descending() {
        let store = InMemoryMemoryStore::new();
        store.upsert_node(concept("far", Some(vec![0.0, 1.0])), &prov()).await;
        store.upsert_node(concept("near", Some(vec![1.0, 0.0])), &prov()).await;

        let hits = store.search("", 10, None, Some(&[1.0, 0.0])).await;
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].node.prop_str("name"), Some("near"));
    }

    #[tokio::test]
    async fn zero_vector_query_scores_zero() {
        let store = InMemoryMemoryStore::new();
        store.upsert_node(concept("x", Some(vec![1.0, 2.0])), &prov()).await;
        let hits = store.search("", 10, None, Some(&[0.0, 0.0])).await;
        assert_eq!(hits[0].score, 0.0);
    }
}
