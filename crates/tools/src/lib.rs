use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aigent_core::AgentResult;

// ── Tool trait and registry ──────────────────────────────────────────────────

/// Describes a single parameter that a tool accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Static metadata about a tool, used by the planner to decide which tool to call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
}

/// The result returned after a tool runs. `output` is structured JSON rather
/// than a flat string so the procedure DAG executor can resolve dotted-path
/// guard expressions (`steps.fetch.output.status`) against it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: Value,
}

/// Trait implemented by every tool exposed to the planner and the procedure
/// DAG executor. Arguments and output are both JSON so dispatch can be keyed
/// by a plain string name, the shape the LLM-produced plan already uses.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn call(&self, args: &Value) -> AgentResult<ToolOutput>;
}

/// Central registry for all available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// First match wins on duplicate names (Vec + find, not a map).
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.spec().name == name).map(|t| t.as_ref())
    }
}

// ── Capability traits, mocks, and built-in tool wrappers ─────────────────────

pub mod builtins;
pub mod capability;
pub mod mock;

pub use builtins::{
    register_builtins, CalendarCreateEvent, CalendarListEvents, ContactsFind, ShellRun,
    TaskComplete, TaskCreate, WebClickSelector, WebFill, WebGet, WebSearch,
};
pub use capability::{Calendar, CalendarEvent, Contact, Contacts, Shell, Task, TaskItem, Web, WebPage};
pub use mock::{MockCalendar, MockContacts, MockTask, MockWeb};

// ── ToolRegistry tests ───────────────────────────────────────────────────────
