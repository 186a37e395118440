//! Typed capability traits that back the tool registry.
//!
//! Grounded on `tools.py`'s abstract base classes (`CalendarTools`,
//! `TaskTools`, `ContactsTools`, `WebTools`). Memory access isn't
//! duplicated here since `aigent_core`/`aigent_memory` already cover it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aigent_core::AgentResult;
use aigent_exec::SafeShellExecutor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[async_trait]
pub trait Calendar: Send + Sync {
    async fn create_event(
        &self,
        title: &str,
        start: &str,
        end: &str,
        attendees: Vec<String>,
        location: Option<&str>,
        notes: &str,
    ) -> AgentResult<CalendarEvent>;

    async fn list_events(&self, start: &str, end: &str) -> AgentResult<Vec<CalendarEvent>>;

    async fn delete_event(&self, id: &str) -> AgentResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub due: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub links: Vec<String>,
    pub done: bool,
}

#[async_trait]
pub trait Task: Send + Sync {
    async fn create_task(
        &self,
        title: &str,
        due: Option<&str>,
        priority: i64,
        notes: &str,
        links: Vec<String>,
    ) -> AgentResult<TaskItem>;

    async fn list_tasks(&self, include_done: bool) -> AgentResult<Vec<TaskItem>>;

    async fn complete_task(&self, id: &str) -> AgentResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    pub org: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait Contacts: Send + Sync {
    async fn list_contacts(&self) -> AgentResult<Vec<Contact>>;

    async fn find_contact(&self, query: &str) -> AgentResult<Vec<Contact>>;

    async fn create_contact(
        &self,
        name: &str,
        emails: Vec<String>,
        phones: Vec<String>,
        org: Option<&str>,
        notes: &str,
        tags: Vec<String>,
    ) -> AgentResult<Contact>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Primitive web commandlets, grounded on `tools.py`'s `WebTools` ABC. All
/// operations take an optional `session_id` so a caller can chain several
/// calls against the same browser context.
#[async_trait]
pub trait Web: Send + Sync {
    async fn get(&self, url: &str) -> AgentResult<WebPage>;

    async fn post(&self, url: &str, payload: &Value) -> AgentResult<WebPage>;

    async fn search(&self, query: &str) -> AgentResult<Vec<WebPage>>;

    /// Captures a screenshot of the rendered page; `text` carries a
    /// description or alt text rather than page body.
    async fn screenshot(&self, url: &str) -> AgentResult<WebPage>;

    /// Fetches the page and returns both HTML-derived text and a screenshot
    /// reference, for vision-based inspection of a page's structure.
    async fn get_dom(&self, url: &str) -> AgentResult<WebPage>;

    async fn click_xy(&self, url: &str, x: i64, y: i64) -> AgentResult<WebPage>;

    async fn click_selector(&self, url: &str, selector: &str) -> AgentResult<WebPage>;

    async fn click_xpath(&self, url: &str, xpath: &str) -> AgentResult<WebPage>;

    async fn fill(&self, url: &str, selector: &str, value: &str) -> AgentResult<WebPage>;

    async fn wait_for(&self, url: &str, selector: &str, timeout_ms: u64) -> AgentResult<WebPage>;

    async fn scroll(&self, url: &str, dx: i64, dy: i64) -> AgentResult<WebPage>;

    /// Returns the bounding box `{x, y, width, height}` of the element
    /// matching `selector`, for coordinate-based follow-up actions.
    async fn locate_bounding_box(&self, url: &str, selector: &str) -> AgentResult<Value>;

    async fn close_session(&self, session_id: &str) -> AgentResult<()>;
}

/// Shell execution as a tool capability. `aigent_exec::SafeShellExecutor`
/// implements this directly; no adapter is needed since the trait lives
/// here and the type lives in `aigent-exec`.
#[async_trait]
pub trait Shell: Send + Sync {
    async fn run(&self, command: &str, dry_run: bool) -> AgentResult<String>;
}

#[async_trait]
impl Shell for aigent_exec::SafeShellExecutor {
    async fn run(&self, command: &str, dry_run: bool) -> AgentResult<String> {
        let result = SafeShellExecutor::run(self, command, dry_run).await;
        match result.status {
            aigent_exec::CommandStatus::Success | aigent_exec::CommandStatus::Staged => {
                Ok(result.stdout)
            }
            aigent_exec::CommandStatus::Blocked => {
                Err(aigent_core::AgentError::Blocked(result.error.unwrap_or_default()))
            }
            aigent_exec::CommandStatus::Error => {
                Err(aigent_core::AgentError::ToolFailure(result.error.unwrap_or(result.stderr)))
            }
        }
    }
}
