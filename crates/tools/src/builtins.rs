//! Concrete `Tool` wrappers exposing the typed capability traits under the
//! dotted string keys the procedure DAG executor dispatches by.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use aigent_core::{AgentError, AgentResult};

use crate::capability::{Calendar, Contacts, Shell, Task, Web};
use crate::{Tool, ToolOutput, ToolParam, ToolSpec};

fn arg<'a>(args: &'a Value, name: &str) -> AgentResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidArgument(format!("missing argument: {name}")))
}

fn opt_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn str_list_arg(args: &Value, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn int_arg(args: &Value, name: &str, default: i64) -> i64 {
    args.get(name).and_then(Value::as_i64).unwrap_or(default)
}

pub struct CalendarCreateEvent(pub Arc<dyn Calendar>);

#[async_trait]
impl Tool for CalendarCreateEvent {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "calendar.create_event".to_string(),
            description: "Create a calendar event.".to_string(),
            params: vec![
                ToolParam { name: "title".to_string(), description: "event title".to_string(), required: true },
                ToolParam { name: "start".to_string(), description: "ISO8601 start".to_string(), required: true },
                ToolParam { name: "end".to_string(), description: "ISO8601 end".to_string(), required: true },
                ToolParam { name: "attendees".to_string(), description: "attendee emails".to_string(), required: false },
                ToolParam { name: "location".to_string(), description: "optional location".to_string(), required: false },
                ToolParam { name: "notes".to_string(), description: "optional notes".to_string(), required: false },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let event = self
            .0
            .create_event(
                arg(args, "title")?,
                arg(args, "start")?,
                arg(args, "end")?,
                str_list_arg(args, "attendees"),
                opt_arg(args, "location"),
                opt_arg(args, "notes").unwrap_or(""),
            )
            .await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(event).unwrap_or(Value::Null) })
    }
}

pub struct CalendarListEvents(pub Arc<dyn Calendar>);

#[async_trait]
impl Tool for CalendarListEvents {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "calendar.list_events".to_string(),
            description: "List calendar events in a range.".to_string(),
            params: vec![
                ToolParam { name: "start".to_string(), description: "ISO8601 start".to_string(), required: true },
                ToolParam { name: "end".to_string(), description: "ISO8601 end".to_string(), required: true },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let events = self.0.list_events(arg(args, "start")?, arg(args, "end")?).await?;
        Ok(ToolOutput { success: true, output: json!(events) })
    }
}

pub struct TaskCreate(pub Arc<dyn Task>);

#[async_trait]
impl Tool for TaskCreate {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "tasks.create".to_string(),
            description: "Create a task.".to_string(),
            params: vec![
                ToolParam { name: "title".to_string(), description: "task title".to_string(), required: true },
                ToolParam { name: "due".to_string(), description: "optional due date".to_string(), required: false },
                ToolParam { name: "priority".to_string(), description: "optional priority".to_string(), required: false },
                ToolParam { name: "notes".to_string(), description: "optional notes".to_string(), required: false },
                ToolParam { name: "links".to_string(), description: "optional related links".to_string(), required: false },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let task = self
            .0
            .create_task(
                arg(args, "title")?,
                opt_arg(args, "due"),
                int_arg(args, "priority", 0),
                opt_arg(args, "notes").unwrap_or(""),
                str_list_arg(args, "links"),
            )
            .await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(task).unwrap_or(Value::Null) })
    }
}

pub struct TaskComplete(pub Arc<dyn Task>);

#[async_trait]
impl Tool for TaskComplete {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "tasks.complete".to_string(),
            description: "Mark a task complete.".to_string(),
            params: vec![ToolParam { name: "id".to_string(), description: "task id".to_string(), required: true }],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        self.0.complete_task(arg(args, "id")?).await?;
        Ok(ToolOutput { success: true, output: json!({ "completed": true }) })
    }
}

pub struct ContactsFind(pub Arc<dyn Contacts>);

#[async_trait]
impl Tool for ContactsFind {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "contacts.find".to_string(),
            description: "Search contacts by name.".to_string(),
            params: vec![ToolParam { name: "query".to_string(), description: "search text".to_string(), required: true }],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let found = self.0.find_contact(arg(args, "query")?).await?;
        Ok(ToolOutput { success: true, output: json!(found) })
    }
}

pub struct ContactsList(pub Arc<dyn Contacts>);

#[async_trait]
impl Tool for ContactsList {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "contacts.list".to_string(),
            description: "List all known contacts.".to_string(),
            params: vec![],
        }
    }

    async fn call(&self, _args: &Value) -> AgentResult<ToolOutput> {
        let contacts = self.0.list_contacts().await?;
        Ok(ToolOutput { success: true, output: json!(contacts) })
    }
}

pub struct ContactsCreate(pub Arc<dyn Contacts>);

#[async_trait]
impl Tool for ContactsCreate {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "contacts.create".to_string(),
            description: "Create a contact.".to_string(),
            params: vec![
                ToolParam { name: "name".to_string(), description: "contact name".to_string(), required: true },
                ToolParam { name: "emails".to_string(), description: "email addresses".to_string(), required: false },
                ToolParam { name: "phones".to_string(), description: "phone numbers".to_string(), required: false },
                ToolParam { name: "org".to_string(), description: "optional organization".to_string(), required: false },
                ToolParam { name: "notes".to_string(), description: "optional notes".to_string(), required: false },
                ToolParam { name: "tags".to_string(), description: "optional tags".to_string(), required: false },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let contact = self
            .0
            .create_contact(
                arg(args, "name")?,
                str_list_arg(args, "emails"),
                str_list_arg(args, "phones"),
                opt_arg(args, "org"),
                opt_arg(args, "notes").unwrap_or(""),
                str_list_arg(args, "tags"),
            )
            .await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(contact).unwrap_or(Value::Null) })
    }
}

pub struct WebGet(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebGet {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.get".to_string(),
            description: "Fetch a page's text content.".to_string(),
            params: vec![ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true }],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self.0.get(arg(args, "url")?).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebSearch(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebSearch {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.search".to_string(),
            description: "Search the web.".to_string(),
            params: vec![ToolParam { name: "query".to_string(), description: "search text".to_string(), required: true }],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let results = self.0.search(arg(args, "query")?).await?;
        Ok(ToolOutput { success: true, output: json!(results) })
    }
}

pub struct WebClickSelector(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebClickSelector {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.click_selector".to_string(),
            description: "Click an element matching a CSS selector.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "selector".to_string(), description: "CSS selector".to_string(), required: true },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self.0.click_selector(arg(args, "url")?, arg(args, "selector")?).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebFill(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebFill {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.fill".to_string(),
            description: "Fill a form field matching a CSS selector.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "selector".to_string(), description: "CSS selector".to_string(), required: true },
                ToolParam { name: "value".to_string(), description: "value to enter".to_string(), required: true },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self.0.fill(arg(args, "url")?, arg(args, "selector")?, arg(args, "value")?).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebPost(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebPost {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.post".to_string(),
            description: "Submit a POST request to a URL.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "payload".to_string(), description: "JSON request body".to_string(), required: false },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let payload = args.get("payload").cloned().unwrap_or(Value::Null);
        let page = self.0.post(arg(args, "url")?, &payload).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebScreenshot(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebScreenshot {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.screenshot".to_string(),
            description: "Capture a screenshot of a rendered page.".to_string(),
            params: vec![ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true }],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self.0.screenshot(arg(args, "url")?).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebGetDom(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebGetDom {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.get_dom".to_string(),
            description: "Fetch a page's DOM and a screenshot reference for vision inspection.".to_string(),
            params: vec![ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true }],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self.0.get_dom(arg(args, "url")?).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebClickXy(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebClickXy {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.click_xy".to_string(),
            description: "Click at absolute page coordinates.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "x".to_string(), description: "x coordinate".to_string(), required: true },
                ToolParam { name: "y".to_string(), description: "y coordinate".to_string(), required: true },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self.0.click_xy(arg(args, "url")?, int_arg(args, "x", 0), int_arg(args, "y", 0)).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebClickXpath(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebClickXpath {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.click_xpath".to_string(),
            description: "Click an element matching an XPath expression.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "xpath".to_string(), description: "XPath expression".to_string(), required: true },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self.0.click_xpath(arg(args, "url")?, arg(args, "xpath")?).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebWaitFor(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebWaitFor {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.wait_for".to_string(),
            description: "Wait for an element matching a CSS selector to appear.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "selector".to_string(), description: "CSS selector".to_string(), required: true },
                ToolParam { name: "timeout_ms".to_string(), description: "timeout in milliseconds".to_string(), required: false },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page = self
            .0
            .wait_for(arg(args, "url")?, arg(args, "selector")?, int_arg(args, "timeout_ms", 5000) as u64)
            .await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebScroll(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebScroll {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.scroll".to_string(),
            description: "Scroll the page by a pixel offset.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "dx".to_string(), description: "horizontal offset".to_string(), required: false },
                ToolParam { name: "dy".to_string(), description: "vertical offset".to_string(), required: false },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let page =
            self.0.scroll(arg(args, "url")?, int_arg(args, "dx", 0), int_arg(args, "dy", 0)).await?;
        Ok(ToolOutput { success: true, output: serde_json::to_value(page).unwrap_or(Value::Null) })
    }
}

pub struct WebLocateBoundingBox(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebLocateBoundingBox {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.locate_bounding_box".to_string(),
            description: "Return the bounding box of an element matching a CSS selector.".to_string(),
            params: vec![
                ToolParam { name: "url".to_string(), description: "page url".to_string(), required: true },
                ToolParam { name: "selector".to_string(), description: "CSS selector".to_string(), required: true },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let bbox = self.0.locate_bounding_box(arg(args, "url")?, arg(args, "selector")?).await?;
        Ok(ToolOutput { success: true, output: bbox })
    }
}

pub struct WebCloseSession(pub Arc<dyn Web>);

#[async_trait]
impl Tool for WebCloseSession {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "web.close_session".to_string(),
            description: "Close a browser session.".to_string(),
            params: vec![ToolParam { name: "session_id".to_string(), description: "session id".to_string(), required: true }],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        self.0.close_session(arg(args, "session_id")?).await?;
        Ok(ToolOutput { success: true, output: json!({ "closed": true }) })
    }
}

pub struct ShellRun(pub Arc<dyn Shell>);

#[async_trait]
impl Tool for ShellRun {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "shell.run".to_string(),
            description: "Run a shell command through the safe executor.".to_string(),
            params: vec![
                ToolParam { name: "command".to_string(), description: "shell command".to_string(), required: true },
                ToolParam { name: "dry_run".to_string(), description: "preview only".to_string(), required: false },
            ],
        }
    }

    async fn call(&self, args: &Value) -> AgentResult<ToolOutput> {
        let dry_run = args.get("dry_run").and_then(Value::as_bool).unwrap_or(false);
        let stdout = self.0.run(arg(args, "command")?, dry_run).await?;
        Ok(ToolOutput { success: true, output: json!({ "stdout": stdout }) })
    }
}

/// Registers the full built-in tool set backed by the given capability
/// implementations (mock or real, interchangeably).
pub fn register_builtins(
    registry: &mut crate::ToolRegistry,
    calendar: Arc<dyn Calendar>,
    task: Arc<dyn Task>,
    contacts: Arc<dyn Contacts>,
    web: Arc<dyn Web>,
    shell: Arc<dyn Shell>,
) {
    registry.register(Box::new(CalendarCreateEvent(calendar.clone())));
    registry.register(Box::new(CalendarListEvents(calendar)));
    registry.register(Box::new(TaskCreate(task.clone())));
    registry.register(Box::new(TaskComplete(task)));
    registry.register(Box::new(ContactsFind(contacts.clone())));
    registry.register(Box::new(ContactsList(contacts.clone())));
    registry.register(Box::new(ContactsCreate(contacts)));
    registry.register(Box::new(WebGet(web.clone())));
    registry.register(Box::new(WebPost(web.clone())));
    registry.register(Box::new(WebSearch(web.clone())));
    registry.register(Box::new(WebScreenshot(web.clone())));
    registry.register(Box::new(WebGetDom(web.clone())));
    registry.register(Box::new(WebClickXy(web.clone())));
    registry.register(Box::new(WebClickSelector(web.clone())));
    registry.register(Box::new(WebClickXpath(web.clone())));
    registry.register(Box::new(WebFill(web.clone())));
    registry.register(Box::new(WebWaitFor(web.clone())));
    registry.register(Box::new(WebScroll(web.clone())));
    registry.register(Box::new(WebLocateBoundingBox(web.clone())));
    registry.register(Box::new(WebCloseSession(web)));
    registry.register(Box::new(ShellRun(shell)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCalendar, MockContacts, MockTask, MockWeb};
    use crate::ToolRegistry;

    #[tokio::test]
    async fn register_builtins_exposes_expected_names() {
        let mut registry = ToolRegistry::new();
        register_builtins(
            &mut registry,
            Arc::new(MockCalendar::new()),
            Arc::new(MockTask::new()),
            Arc::new(MockContacts::new()),
            Arc::new(MockWeb::new()),
            Arc::new(aigent_exec::SafeShellExecutor::new(std::env::temp_dir())),
        );
        assert!(registry.get("tasks.create").is_some());
        assert!(registry.get("web.search").is_some());
        assert!(registry.get("web.get_dom").is_some());
        assert!(registry.get("web.screenshot").is_some());
        assert!(registry.get("contacts.create").is_some());
        assert!(registry.get("contacts.list").is_some());
        assert!(registry.get("shell.run").is_some());
    }

    #[tokio::test]
    async fn task_create_tool_roundtrips_through_json() {
        let tool = TaskCreate(Arc::new(MockTask::new()));
        let output = tool.call(&json!({ "title": "buy milk" })).await.unwrap();
        assert!(output.success);
        assert_eq!(output.output["title"], "buy milk");
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid_argument() {
        let tool = TaskCreate(Arc::new(MockTask::new()));
        let err = tool.call(&json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArgument(_)));
    }
}
