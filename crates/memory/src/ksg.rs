//! KnowShowGo API: prototype/concept creation, generalization, pattern reuse.
//!
//! Grounded on `ksg.py`'s `KSGStore` (prototype seed list, inheritance table)
//! and `service.py`'s `InMemoryStore` (concept/pattern creation shape,
//! fingerprint-based pattern matching).

use std::collections::HashMap;
use std::sync::Arc;

use aigent_core::{cosine_similarity, rel, AgentError, AgentResult, Edge, Node, Provenance};
use regex::Regex;
use serde_json::{json, Value};

use crate::store::{MemoryStore, SearchHit};

/// Fixed prototype uuids, seeded once at startup and never mutated
/// thereafter. `Chain` inherits from `List`; `DAG` inherits from `Chain`.
pub mod proto {
    pub const CONCEPT: &str = "proto-concept";
    pub const AGENT: &str = "proto-agent";
    pub const PLACE: &str = "proto-place";
    pub const EVENT: &str = "proto-event";
    pub const TASK: &str = "proto-task";
    pub const MESSAGE: &str = "proto-message";
    pub const DOCUMENT: &str = "proto-document";
    pub const DEVICE: &str = "proto-device";
    pub const PREFERENCE_RULE: &str = "proto-preference-rule";
    pub const LIST: &str = "proto-list";
    pub const CHAIN: &str = "proto-chain";
    pub const DAG: &str = "proto-dag";
    pub const PROCEDURE: &str = "proto-procedure";
    pub const CREDENTIAL: &str = "proto-credential";
    pub const FORM_PATTERN: &str = "proto-form-pattern";
    pub const QUEUE_ITEM: &str = "proto-queue-item";
    pub const PERSON: &str = "proto-person";
    pub const NAME: &str = "proto-name";
}

const PROTOTYPE_INHERITS: &[(&str, &str)] = &[(proto::CHAIN, proto::LIST), (proto::DAG, proto::CHAIN)];

#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub host: String,
    pub form_type: Option<String>,
    pub field_types: HashMap<String, usize>,
    pub submit_selector_hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub concept: Node,
    pub pattern_data: Value,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TransferResult {
    pub transferred_pattern_uuid: String,
    pub mapping: HashMap<String, String>,
}

pub struct KnowShowGo {
    store: Arc<dyn MemoryStore>,
}

impl KnowShowGo {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        KnowShowGo { store }
    }

    /// Idempotent: seeds the fixed prototype set plus inheritance edges on
    /// first call; a second call is a no-op. Bootstrap writes carry a
    /// system-sourced provenance since no caller request initiated them.
    pub async fn ensure_seeds(&self) {
        if self.store.get_node(proto::AGENT).await.is_some() {
            return;
        }

        let provenance = Self::provenance("bootstrap");

        let names = [
            (proto::CONCEPT, "Concept"),
            (proto::AGENT, "Agent"),
            (proto::PLACE, "Place"),
            (proto::EVENT, "Event"),
            (proto::TASK, "Task"),
            (proto::MESSAGE, "Message"),
            (proto::DOCUMENT, "Document"),
            (proto::DEVICE, "Device"),
            (proto::PREFERENCE_RULE, "PreferenceRule"),
            (proto::LIST, "List"),
            (proto::CHAIN, "Chain"),
            (proto::DAG, "DAG"),
            (proto::PROCEDURE, "Procedure"),
            (proto::CREDENTIAL, "Credential"),
            (proto::FORM_PATTERN, "FormPattern"),
            (proto::QUEUE_ITEM, "QueueItem"),
            (proto::PERSON, "Person"),
            (proto::NAME, "Name"),
        ];

        for (uuid, name) in names {
            let mut node = Node::new("Prototype").with_uuid(uuid).with_labels(vec![name.to_string()]);
            node.set_prop("name", json!(name));
            node.set_prop("isPrototype", json!(true));
            self.store.upsert_node(node, &provenance).await;
        }

        for (child, parent) in PROTOTYPE_INHERITS {
            self.store
                .upsert_edge(Edge::new(*child, *parent, rel::INHERITS_FROM), &provenance)
                .await;
        }
    }

    pub async fn create_prototype(
        &self,
        name: &str,
        description: &str,
        context: &str,
        labels: Vec<String>,
        embedding: Option<Vec<f32>>,
        base_prototype_uuid: Option<&str>,
        provenance: &Provenance,
    ) -> AgentResult<String> {
        if name.trim().is_empty() {
            return Err(AgentError::InvalidArgument("prototype name must not be empty".into()));
        }
        let mut node = Node::new("Prototype").with_labels(labels).with_embedding(embedding);
        node.set_prop("name", json!(name));
        node.set_prop("description", json!(description));
        node.set_prop("context", json!(context));
        node.set_prop("isPrototype", json!(true));
        let uuid = node.uuid.clone();
        self.store.upsert_node(node, provenance).await;

        if let Some(base) = base_prototype_uuid {
            self.store.upsert_edge(Edge::new(&uuid, base, rel::INHERITS_FROM), provenance).await;
        }
        Ok(uuid)
    }

    pub async fn create_concept(
        &self,
        prototype_uuid: &str,
        props: HashMap<String, Value>,
        embedding: Option<Vec<f32>>,
        previous_version_uuid: Option<&str>,
        provenance: &Provenance,
    ) -> AgentResult<String> {
        if self.store.get_node(prototype_uuid).await.is_none() {
            return Err(AgentError::NotFound(format!("prototype {prototype_uuid} not found")));
        }

        let mut final_props = props;
        final_props.insert("prototype_uuid".into(), json!(prototype_uuid));
        final_props.insert("isPrototype".into(), json!(false));
        if let Some(prev) = previous_version_uuid {
            final_props.insert("previous_version_uuid".into(), json!(prev));
        }
        let label = final_props
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("concept")
            .to_string();

        let node = Node::new("Concept").with_labels(vec![label]).with_props(final_props).with_embedding(embedding);
        let uuid = node.uuid.clone();
        self.store.upsert_node(node, provenance).await;
        self.store
            .upsert_edge(Edge::new(&uuid, prototype_uuid, rel::INSTANTIATES), provenance)
            .await;
        Ok(uuid)
    }

    /// Like [`create_concept`](Self::create_concept), but when `props.steps`
    /// is a list, each step is materialized as a child Concept linked by
    /// `has_step` edges carrying an `order` prop — the canonical procedure
    /// storage shape.
    pub async fn create_concept_recursive(
        &self,
        prototype_uuid: &str,
        props: HashMap<String, Value>,
        embedding: Option<Vec<f32>>,
        previous_version_uuid: Option<&str>,
        provenance: &Provenance,
    ) -> AgentResult<String> {
        let steps = props.get("steps").and_then(Value::as_array).cloned();
        let root_uuid = self
            .create_concept(prototype_uuid, props, embedding, previous_version_uuid, provenance)
            .await?;

        if let Some(steps) = steps {
            for (order, step) in steps.into_iter().enumerate() {
                let mut step_props: HashMap<String, Value> = step
                    .as_object()
                    .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();
                step_props.insert("order".into(), json!(order));
                let mut step_node = Node::new("Step").with_props(step_props);
                step_node.set_prop("isPrototype", json!(false));
                let step_uuid = step_node.uuid.clone();
                self.store.upsert_node(step_node, provenance).await;

                let mut edge = Edge::new(&root_uuid, &step_uuid, rel::HAS_STEP);
                edge.props.insert("order".into(), json!(order));
                self.store.upsert_edge(edge, provenance).await;
            }
        }

        Ok(root_uuid)
    }

    pub async fn search_concepts(
        &self,
        query_text: &str,
        top_k: usize,
        query_embedding: Option<&[f32]>,
        filters: Option<HashMap<String, Value>>,
    ) -> Vec<SearchHit> {
        let mut merged = filters.unwrap_or_default();
        merged.entry("kind".into()).or_insert_with(|| json!("Concept"));
        self.store
            .search(query_text, top_k, Some(&merged), query_embedding)
            .await
    }

    /// Averages exemplar embeddings element-wise into a centroid and creates
    /// a new Concept carrying it, linked back to each exemplar via an
    /// `association:generalized_from` edge.
    pub async fn generalize_concepts(
        &self,
        exemplar_uuids: &[String],
        name: &str,
        description: &str,
        prototype_uuid: Option<&str>,
        provenance: &Provenance,
    ) -> AgentResult<String> {
        let mut embeddings = Vec::with_capacity(exemplar_uuids.len());
        for uuid in exemplar_uuids {
            let node = self
                .store
                .get_node(uuid)
                .await
                .ok_or_else(|| AgentError::NotFound(format!("exemplar {uuid} not found")))?;
            let embedding = node
                .embedding
                .ok_or_else(|| AgentError::InvalidArgument(format!("exemplar {uuid} has no embedding")))?;
            embeddings.push(embedding);
        }

        let centroid = aigent_core::centroid(&embeddings).unwrap_or_else(|| embeddings[0].clone());

        let prototype = prototype_uuid.unwrap_or(proto::CONCEPT);
        let mut props = HashMap::new();
        props.insert("name".into(), json!(name));
        props.insert("description".into(), json!(description));
        props.insert("generalized".into(), json!(true));
        let uuid = self.create_concept(prototype, props, Some(centroid), None, provenance).await?;

        for exemplar in exemplar_uuids {
            self.store
                .upsert_edge(Edge::new(&uuid, exemplar, rel::association("generalized_from")), provenance)
                .await;
        }
        Ok(uuid)
    }

    pub async fn store_pattern(
        &self,
        name: &str,
        pattern_data: Value,
        embedding: Option<Vec<f32>>,
        concept_uuid: Option<&str>,
        provenance: &Provenance,
    ) -> String {
        let fingerprint = fingerprint_from_pattern_data(&pattern_data);
        let mut props = HashMap::new();
        props.insert("name".into(), json!(name));
        props.insert("pattern_data".into(), pattern_data);
        props.insert("isPrototype".into(), json!(false));
        props.insert("success_count".into(), json!(0));
        props.insert(
            "fingerprint".into(),
            json!({
                "host": fingerprint.host,
                "form_type": fingerprint.form_type,
                "field_types": fingerprint.field_types,
                "submit_selector_hint": fingerprint.submit_selector_hint,
            }),
        );

        let mut node = Node::new("Concept")
            .with_uuid(concept_uuid.map(|s| s.to_string()).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()))
            .with_labels(vec!["FormPattern".to_string(), name.to_string()])
            .with_props(props)
            .with_embedding(embedding);
        node.set_prop("prototype_uuid", json!(proto::FORM_PATTERN));
        let uuid = node.uuid.clone();
        self.store.upsert_node(node, provenance).await;
        self.store
            .upsert_edge(Edge::new(&uuid, proto::FORM_PATTERN, rel::INSTANTIATES), provenance)
            .await;
        uuid
    }

    /// Score combines: host-match (+3.0), form-type-match (+1.0),
    /// fingerprint-field-type overlap (+0-2.0), embedding similarity (0-1.0;
    /// 0 here since this operation does not accept a query embedding).
    pub async fn find_best_pattern(
        &self,
        url: &str,
        html: Option<&str>,
        form_type: Option<&str>,
        top_k: usize,
    ) -> Vec<PatternMatch> {
        let target_host = normalize_host(url);
        let target_fields = html.map(extract_field_types).unwrap_or_default();

        let mut filters = HashMap::new();
        filters.insert("kind".into(), json!("Concept"));
        let candidates = self.store.search("", 1000, Some(&filters), None).await;

        let mut scored: Vec<PatternMatch> = candidates
            .into_iter()
            .filter(|hit| hit.node.labels.iter().any(|l| l == "FormPattern"))
            .map(|hit| {
                let fp = hit
                    .node
                    .props
                    .get("fingerprint")
                    .map(parse_fingerprint)
                    .unwrap_or_else(|| Fingerprint {
                        host: String::new(),
                        form_type: None,
                        field_types: HashMap::new(),
                        submit_selector_hint: None,
                    });

                let mut score = 0.0f32;
                if !target_host.is_empty() && fp.host == target_host {
                    score += 3.0;
                }
                if let (Some(want), Some(have)) = (form_type, fp.form_type.as_deref()) {
                    if want == have {
                        score += 1.0;
                    }
                }
                score += field_type_overlap(&fp.field_types, &target_fields);

                let pattern_data = hit
                    .node
                    .props
                    .get("pattern_data")
                    .cloned()
                    .unwrap_or(Value::Null);
                PatternMatch {
                    concept: hit.node,
                    pattern_data,
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    pub async fn record_pattern_success(
        &self,
        pattern_uuid: &str,
        _context: &Value,
        provenance: &Provenance,
    ) -> AgentResult<()> {
        let mut node = self
            .store
            .get_node(pattern_uuid)
            .await
            .ok_or_else(|| AgentError::NotFound(format!("pattern {pattern_uuid} not found")))?;
        let current = node.prop_f64("success_count").unwrap_or(0.0) as i64;
        node.set_prop("success_count", json!(current + 1));
        self.store.upsert_node(node, provenance).await;
        Ok(())
    }

    /// If an LLM remapper is supplied, asks it to remap selectors; otherwise
    /// applies a deterministic normalized-field-name fuzzy match.
    pub async fn transfer_pattern(
        &self,
        source_pattern_uuid: &str,
        target_context: &Value,
        llm_remap: Option<&(dyn Fn(&Value, &Value) -> Option<HashMap<String, String>> + Send + Sync)>,
        provenance: &Provenance,
    ) -> AgentResult<TransferResult> {
        let source = self
            .store
            .get_node(source_pattern_uuid)
            .await
            .ok_or_else(|| AgentError::NotFound(format!("pattern {source_pattern_uuid} not found")))?;
        let pattern_data = source.props.get("pattern_data").cloned().unwrap_or(Value::Null);

        let mapping = if let Some(remap) = llm_remap {
            remap(&pattern_data, target_context).unwrap_or_default()
        } else {
            fuzzy_field_mapping(&pattern_data, target_context)
        };

        let new_uuid = self
            .store_pattern(
                source.prop_str("name").unwrap_or("transferred").to_string().as_str(),
                pattern_data,
                source.embedding.clone(),
                None,
                provenance,
            )
            .await;

        Ok(TransferResult {
            transferred_pattern_uuid: new_uuid,
            mapping,
        })
    }

    /// When a pattern has at least `min_similar` neighbors scoring above
    /// `min_similarity`, generalizes across that pattern and its neighbors.
    pub async fn auto_generalize(
        &self,
        pattern_uuid: &str,
        min_similar: usize,
        min_similarity: f32,
        _llm_fn: Option<&(dyn Fn() + Send + Sync)>,
        provenance: &Provenance,
    ) -> AgentResult<Option<String>> {
        let node = self
            .store
            .get_node(pattern_uuid)
            .await
            .ok_or_else(|| AgentError::NotFound(format!("pattern {pattern_uuid} not found")))?;
        let Some(embedding) = node.embedding.clone() else {
            return Ok(None);
        };

        let candidates = self.store.search("", 1000, None, Some(&embedding)).await;
        let similar: Vec<String> = candidates
            .into_iter()
            .filter(|hit| hit.node.uuid != pattern_uuid && hit.score >= min_similarity)
            .map(|hit| hit.node.uuid)
            .collect();

        if similar.len() < min_similar {
            return Ok(None);
        }

        let mut all = vec![pattern_uuid.to_string()];
        all.extend(similar);
        let name = format!("generalized-{}", node.prop_str("name").unwrap_or("pattern"));
        let uuid = self
            .generalize_concepts(&all, &name, "auto-generalized pattern cluster", Some(proto::FORM_PATTERN), provenance)
            .await?;
        Ok(Some(uuid))
    }

    /// Default provenance for internal bootstrap/maintenance writes that
    /// have no caller-supplied request to attribute them to.
    pub fn provenance(trace_id: &str) -> Provenance {
        Provenance::new("tool", trace_id)
    }
}

fn normalize_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

fn extract_field_types(html: &str) -> HashMap<String, usize> {
    let re = Regex::new(r#"(?i)<input[^>]*\btype\s*=\s*["']?([a-zA-Z]+)"#).unwrap();
    let mut counts = HashMap::new();
    for cap in re.captures_iter(html) {
        let t = cap[1].to_lowercase();
        *counts.entry(t).or_insert(0) += 1;
    }
    counts
}

fn fingerprint_from_pattern_data(pattern_data: &Value) -> Fingerprint {
    let host = pattern_data
        .get("url")
        .and_then(Value::as_str)
        .map(normalize_host)
        .unwrap_or_default();
    let form_type = pattern_data
        .get("form_type")
        .and_then(Value::as_str)
        .map(str::to_string);
    let field_types = pattern_data
        .get("fields")
        .and_then(Value::as_object)
        .map(|fields| {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for v in fields.values() {
                if let Some(t) = v.as_str() {
                    *counts.entry(t.to_lowercase()).or_insert(0) += 1;
                }
            }
            counts
        })
        .unwrap_or_default();
    let submit_selector_hint = pattern_data
        .get("submit_selector")
        .and_then(Value::as_str)
        .map(str::to_string);

    Fingerprint {
        host,
        form_type,
        field_types,
        submit_selector_hint,
    }
}

fn parse_fingerprint(v: &Value) -> Fingerprint {
    Fingerprint {
        host: v.get("host").and_then(Value::as_str).unwrap_or_default().to_string(),
        form_type: v.get("form_type").and_then(Value::as_str).map(str::to_string),
        field_types: v
            .get("field_types")
            .and_then(Value::as_object)
            .map(|o| {
                o.iter()
                    .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n as usize)))
                    .collect()
            })
            .unwrap_or_default(),
        submit_selector_hint: v
            .get("submit_selector_hint")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn field_type_overlap(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.keys().filter(|k| b.contains_key(*k)).count();
    let denom = a.len().max(b.len()) as f32;
    (shared as f32 / denom) * 2.0
}

fn normalize_field_name(name: &str) -> String {
    name.to_lowercase().replace(['_', '-', ' '], "")
}

fn fuzzy_field_mapping(source_pattern: &Value, target_context: &Value) -> HashMap<String, String> {
    let source_fields: Vec<String> = source_pattern
        .get("fields")
        .and_then(Value::as_object)
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    let target_fields: Vec<String> = target_context
        .get("fields")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let mut mapping = HashMap::new();
    for sf in &source_fields {
        let normalized_source = normalize_field_name(sf);
        if let Some(best) = target_fields.iter().find(|tf| {
            let nt = normalize_field_name(tf);
            nt == normalized_source || nt.contains(&normalized_source) || normalized_source.contains(&nt)
        }) {
            mapping.insert(sf.clone(), best.clone());
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMemoryStore;

    fn ksg() -> KnowShowGo {
        KnowShowGo::new(Arc::new(InMemoryMemoryStore::new()))
    }

    fn prov() -> Provenance {
        Provenance::new("user", "t1")
    }

    #[tokio::test]
    async fn create_concept_emits_exactly_one_instantiates_edge() {
        let k = ksg();
        k.ensure_seeds().await;
        let uuid = k
            .create_concept(proto::TASK, HashMap::new(), None, None, &prov())
            .await
            .unwrap();
        let edges = k.store.get_edges(Some(&uuid), None, Some(rel::INSTANTIATES)).await;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to_node, proto::TASK);
    }

    #[tokio::test]
    async fn create_concept_missing_prototype_is_not_found() {
        let k = ksg();
        let err = k.create_concept("nope", HashMap::new(), None, None, &prov()).await.unwrap_err();
        assert!(matches!(err, AgentError::NotFound(_)));
    }

    #[tokio::test]
    async fn generalize_concepts_produces_centroid_embedding() {
        let k = ksg();
        k.ensure_seeds().await;
        let a = k
            .create_concept(proto::CONCEPT, HashMap::new(), Some(vec![1.0, 0.0]), None, &prov())
            .await
            .unwrap();
        let b = k
            .create_concept(proto::CONCEPT, HashMap::new(), Some(vec![0.0, 1.0]), None, &prov())
            .await
            .unwrap();
        let merged = k
            .generalize_concepts(&[a.clone(), b.clone()], "merged", "desc", None, &prov())
            .await
            .unwrap();
        let node = k.store.get_node(&merged).await.unwrap();
        assert_eq!(node.embedding, Some(vec![0.5, 0.5]));
        let edges = k.store.get_edges(Some(&merged), None, Some(&rel::association("generalized_from"))).await;
        assert_eq!(edges.len(), 2);
    }

    #[tokio::test]
    async fn generalize_concepts_rejects_exemplar_without_embedding() {
        let k = ksg();
        k.ensure_seeds().await;
        let a = k.create_concept(proto::CONCEPT, HashMap::new(), None, None, &prov()).await.unwrap();
        let err = k.generalize_concepts(&[a], "x", "y", None, &prov()).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn record_pattern_success_increments_counter() {
        let k = ksg();
        k.ensure_seeds().await;
        let uuid = k
            .store_pattern("login", json!({"url": "https://example.com/login"}), None, None, &prov())
            .await;
        for _ in 0..3 {
            k.record_pattern_success(&uuid, &json!({}), &prov()).await.unwrap();
        }
        let node = k.store.get_node(&uuid).await.unwrap();
        assert_eq!(node.prop_f64("success_count"), Some(3.0));
    }

    #[tokio::test]
    async fn find_best_pattern_ranks_host_match_first() {
        let k = ksg();
        k.ensure_seeds().await;
        k.store_pattern(
            "login-a",
            json!({"url": "https://a.example.com/login", "form_type": "login"}),
            None,
            None,
            &prov(),
        )
        .await;
        k.store_pattern(
            "login-b",
            json!({"url": "https://b.example.com/login", "form_type": "login"}),
            None,
            None,
            &prov(),
        )
        .await;

        let matches = k
            .find_best_pattern("https://a.example.com/login", None, Some("login"), 5)
            .await;
        assert_eq!(matches[0].concept.prop_str("name"), Some("login-a"));
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn ensure_seeds_is_idempotent() {
        let k = ksg();
        k.ensure_seeds().await;
        k.ensure_seeds().await;
        let edges = k.store.get_edges(Some(proto::DAG), None, Some(rel::INHERITS_FROM)).await;
        assert_eq!(edges.len(), 1);
    }
}
