use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A typed entity in the semantic memory graph.
///
/// `kind` is a string discriminator (`Concept`, `Prototype`, `Procedure`,
/// `Step`, `Task`, `Event`, `Person`, `Message`, `Credential`, `FormData`,
/// `FormPattern`, `Queue`, `ProcedureRun`, `Schema`, ...). `props` is an open
/// JSON document; kind-specific accessor helpers validate required props on
/// read rather than letting every caller reach into the map directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    pub kind: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub props: HashMap<String, Value>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Self {
        Node {
            uuid: Uuid::new_v4().to_string(),
            kind: kind.into(),
            labels: Vec::new(),
            props: HashMap::new(),
            embedding: None,
            status: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_props(mut self, props: HashMap<String, Value>) -> Self {
        self.props = props;
        self
    }

    pub fn with_embedding(mut self, embedding: Option<Vec<f32>>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn is_prototype(&self) -> bool {
        self.props
            .get("isPrototype")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    pub fn prop_f64(&self, key: &str) -> Option<f64> {
        self.props.get(key).and_then(Value::as_f64)
    }

    pub fn set_prop(&mut self, key: impl Into<String>, value: Value) {
        self.props.insert(key.into(), value);
    }
}

/// Directed typed relation between two nodes, referenced by uuid (never by
/// pointer — the memory store owns both maps and there is no cyclic
/// ownership to worry about).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub uuid: String,
    pub from_node: String,
    pub to_node: String,
    pub rel: String,
    #[serde(default)]
    pub props: HashMap<String, Value>,
}

impl Edge {
    pub fn new(from_node: impl Into<String>, to_node: impl Into<String>, rel: impl Into<String>) -> Self {
        Edge {
            uuid: Uuid::new_v4().to_string(),
            from_node: from_node.into(),
            to_node: to_node.into(),
            rel: rel.into(),
            props: HashMap::new(),
        }
    }

    pub fn with_props(mut self, props: HashMap<String, Value>) -> Self {
        self.props = props;
        self
    }
}

/// Relation name constants. `rel` is a plain string on the wire, but callers
/// within this workspace should use these rather than re-typing literals.
pub mod rel {
    pub const INSTANTIATES: &str = "instantiates";
    pub const INHERITS_FROM: &str = "inherits_from";
    pub const HAS_STEP: &str = "has_step";
    pub const HAS_NODE: &str = "has_node";
    pub const DEPENDS_ON: &str = "depends_on";
    pub const BRANCH_TRUE: &str = "branch_true";
    pub const BRANCH_FALSE: &str = "branch_false";
    pub const LOOP_BACK: &str = "loop_back";
    pub const CALLS_PROCEDURE: &str = "calls_procedure";
    pub const HAS_SUBPROCEDURE: &str = "has_subprocedure";
    pub const HAS_PATTERN: &str = "has_pattern";
    pub const ADAPTED_FROM: &str = "adapted_from";
    pub const RUN_OF: &str = "run_of";
    pub const CONFORMS_TO: &str = "conforms_to";

    pub fn association(name: &str) -> String {
        format!("association:{name}")
    }
}

/// `{source, ts, confidence, trace_id}` tuple attached to every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub ts: DateTime<Utc>,
    pub confidence: f32,
    pub trace_id: String,
}

impl Provenance {
    pub fn new(source: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Provenance {
            source: source.into(),
            ts: Utc::now(),
            confidence: 1.0,
            trace_id: trace_id.into(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// `sum(a·b) / (||a||·||b||)`; zero-norm (or mismatched length) returns 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Element-wise mean of a set of equal-dimension embeddings. Returns `None`
/// if the inputs are empty or their dimensionality disagrees.
pub fn centroid(embeddings: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = embeddings.first()?.len();
    if dim == 0 || embeddings.iter().any(|e| e.len() != dim) {
        return None;
    }
    let mut sum = vec![0.0f32; dim];
    for e in embeddings {
        for (acc, v) in sum.iter_mut().zip(e.iter()) {
            *acc += v;
        }
    }
    let n = embeddings.len() as f32;
    for v in sum.iter_mut() {
        *v /= n;
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn centroid_averages_elementwise() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let c = centroid(&[a, b]).unwrap();
        assert_eq!(c, vec![0.5, 0.5]);
    }

    #[test]
    fn centroid_rejects_mismatched_dims() {
        assert!(centroid(&[vec![1.0], vec![1.0, 2.0]]).is_none());
    }
}
