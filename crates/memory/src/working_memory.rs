//! Hebbian activation layer, separate from persistent semantic memory.
//!
//! Grounded on `working_memory.py`'s `WorkingMemoryGraph`, which wraps a
//! `networkx.DiGraph`. There is no equivalent graph library pulled in here;
//! a plain adjacency map is both simpler and sufficient for the contract
//! (weighted directed edges, incoming-weight sums, global decay).

use std::collections::HashMap;
use std::sync::Mutex;

const DEFAULT_REINFORCE_DELTA: f32 = 1.0;
const DEFAULT_MAX_WEIGHT: f32 = 100.0;

struct State {
    /// source -> target -> weight
    edges: HashMap<String, HashMap<String, f32>>,
}

pub struct WorkingMemoryGraph {
    reinforce_delta: f32,
    max_weight: f32,
    state: Mutex<State>,
}

impl WorkingMemoryGraph {
    pub fn new(reinforce_delta: f32, max_weight: f32) -> Self {
        WorkingMemoryGraph {
            reinforce_delta,
            max_weight,
            state: Mutex::new(State {
                edges: HashMap::new(),
            }),
        }
    }

    /// Creates the edge if absent (weight = `min(seed_weight, max_weight)`);
    /// otherwise increments the existing weight by `reinforce_delta`, capped.
    pub fn link(&self, source: &str, target: &str, seed_weight: f32) -> f32 {
        let mut state = self.state.lock().unwrap();
        let targets = state.edges.entry(source.to_string()).or_default();
        let weight = match targets.get(target) {
            Some(existing) => (existing + self.reinforce_delta).min(self.max_weight),
            None => seed_weight.min(self.max_weight),
        };
        targets.insert(target.to_string(), weight);
        weight
    }

    /// Reinforces only if the edge already exists; returns the new weight.
    pub fn access(&self, source: &str, target: &str) -> Option<f32> {
        let mut state = self.state.lock().unwrap();
        let targets = state.edges.get_mut(source)?;
        let weight = targets.get(target).copied()?;
        let updated = (weight + self.reinforce_delta).min(self.max_weight);
        targets.insert(target.to_string(), updated);
        Some(updated)
    }

    pub fn get_weight(&self, source: &str, target: &str) -> Option<f32> {
        self.state
            .lock()
            .unwrap()
            .edges
            .get(source)
            .and_then(|t| t.get(target))
            .copied()
    }

    /// Sum of incoming edge weights for `node_uuid`, used to boost retrieval
    /// ranking.
    pub fn get_activation_boost(&self, node_uuid: &str) -> f32 {
        self.state
            .lock()
            .unwrap()
            .edges
            .values()
            .filter_map(|targets| targets.get(node_uuid))
            .sum()
    }

    /// Multiplies every edge weight by `factor` (0 < factor <= 1).
    pub fn decay_all(&self, factor: f32) {
        let mut state = self.state.lock().unwrap();
        for targets in state.edges.values_mut() {
            for weight in targets.values_mut() {
                *weight *= factor;
            }
        }
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().edges.clear();
    }

    /// Nodes ordered by incoming activation, descending.
    pub fn get_top_activated(&self, top_k: usize) -> Vec<(String, f32)> {
        let state = self.state.lock().unwrap();
        let mut incoming: HashMap<String, f32> = HashMap::new();
        for targets in state.edges.values() {
            for (target, weight) in targets {
                *incoming.entry(target.clone()).or_insert(0.0) += weight;
            }
        }
        let mut ranked: Vec<(String, f32)> = incoming.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);
        ranked
    }
}

impl Default for WorkingMemoryGraph {
    fn default() -> Self {
        Self::new(DEFAULT_REINFORCE_DELTA, DEFAULT_MAX_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_then_get_weight_is_capped_seed() {
        let wm = WorkingMemoryGraph::new(1.0, 10.0);
        let w = wm.link("a", "b", 100.0);
        assert_eq!(w, 10.0);
        assert_eq!(wm.get_weight("a", "b"), Some(10.0));
    }

    #[test]
    fn repeated_link_reinforces_within_bound() {
        let wm = WorkingMemoryGraph::new(1.0, 5.0);
        wm.link("a", "b", 3.0);
        wm.link("a", "b", 1.0);
        wm.link("a", "b", 1.0);
        wm.link("a", "b", 1.0);
        assert_eq!(wm.get_weight("a", "b"), Some(5.0));
    }

    #[test]
    fn access_without_existing_edge_returns_none() {
        let wm = WorkingMemoryGraph::default();
        assert_eq!(wm.access("a", "b"), None);
    }

    #[test]
    fn activation_boost_sums_incoming_edges() {
        let wm = WorkingMemoryGraph::new(1.0, 100.0);
        wm.link("q1", "target", 5.0);
        wm.link("q2", "target", 3.0);
        assert_eq!(wm.get_activation_boost("target"), 8.0);
    }

    #[test]
    fn decay_all_scales_every_weight() {
        let wm = WorkingMemoryGraph::new(1.0, 100.0);
        wm.link("a", "b", 10.0);
        wm.decay_all(0.5);
        assert_eq!(wm.get_weight("a", "b"), Some(5.0));
    }

    #[test]
    fn boost_outranks_lower_base_score() {
        let wm = WorkingMemoryGraph::new(1.0, 200.0);
        wm.link("q", "A", 100.0);
        let boost_a = wm.get_activation_boost("A");
        let boost_b = wm.get_activation_boost("B");
        let weight = 0.1;
        let final_a = 0.5 + weight * boost_a;
        let final_b = 0.8 + weight * boost_b;
        assert!(final_a > final_b);
    }

    #[test]
    fn clear_empties_graph() {
        let wm = WorkingMemoryGraph::default();
        wm.link("a", "b", 1.0);
        wm.clear();
        assert_eq!(wm.get_weight("a", "b"), None);
    }
}
