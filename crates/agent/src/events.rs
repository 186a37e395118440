//! Lifecycle event bus for one PEAL request, fanned out to any number of
//! subscribers (TUI, daemon log, tests).
//!
//! Grounded on the teacher's `BackendEvent`/broadcast-channel pattern
//! (`crates/runtime/src/events.rs`, `crates/runtime/src/server.rs`), adapted
//! from a chat-turn event set to the PEAL lifecycle's own milestones.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PealEvent {
    RequestReceived { trace_id: String, request: String },
    RagQuery { trace_id: String, hit_count: usize },
    PlanReady { trace_id: String, step_count: usize, confidence: Option<f32> },
    ToolStart { trace_id: String, tool: String },
    ToolInvoked { trace_id: String, tool: String, success: bool },
    ExecutionCompleted { trace_id: String, status: String },
    QueueUpdated { trace_id: String },
    ProcedureRecall { trace_id: String, procedure_uuid: String },
    ConceptRecall { trace_id: String, uuid: String },
    MemoryUpsert { trace_id: String, uuid: String },
    MessageLogged { trace_id: String, uuid: String },
}

const DEFAULT_CAPACITY: usize = 256;

/// Fire-and-forget fan-out: `emit` never blocks and never fails the
/// request just because nobody is listening.
pub struct EventBus {
    tx: broadcast::Sender<PealEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CAPACITY);
        EventBus { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PealEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: PealEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
