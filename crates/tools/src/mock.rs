//! In-memory mock capability implementations for tests and offline runs.
//!
//! Grounded on `mock_tools.py`'s `MockCalendarTools`, `MockTaskTools`,
//! `MockContactsTools`, `MockWebTools`.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use aigent_core::{AgentError, AgentResult};

use crate::capability::{Calendar, CalendarEvent, Contact, Contacts, Task, TaskItem, Web, WebPage};

#[derive(Default)]
pub struct MockCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    next_id: Mutex<u64>,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> String {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        format!("evt-{id}")
    }
}

#[async_trait]
impl Calendar for MockCalendar {
    async fn create_event(
        &self,
        title: &str,
        start: &str,
        end: &str,
        attendees: Vec<String>,
        location: Option<&str>,
        notes: &str,
    ) -> AgentResult<CalendarEvent> {
        let event = CalendarEvent {
            id: self.next(),
            title: title.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            attendees,
            location: location.map(str::to_string),
            notes: notes.to_string(),
        };
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn list_events(&self, start: &str, end: &str) -> AgentResult<Vec<CalendarEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.start.as_str() >= start && e.end.as_str() <= end)
            .cloned()
            .collect())
    }

    async fn delete_event(&self, id: &str) -> AgentResult<()> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(AgentError::NotFound(format!("no such event: {id}")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTask {
    tasks: Mutex<Vec<TaskItem>>,
    next_id: Mutex<u64>,
}

impl MockTask {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> String {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        format!("task-{id}")
    }
}

#[async_trait]
impl Task for MockTask {
    async fn create_task(
        &self,
        title: &str,
        due: Option<&str>,
        priority: i64,
        notes: &str,
        links: Vec<String>,
    ) -> AgentResult<TaskItem> {
        let task = TaskItem {
            id: self.next(),
            title: title.to_string(),
            due: due.map(str::to_string),
            priority,
            notes: notes.to_string(),
            links,
            done: false,
        };
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, include_done: bool) -> AgentResult<Vec<TaskItem>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| include_done || !t.done)
            .cloned()
            .collect())
    }

    async fn complete_task(&self, id: &str) -> AgentResult<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.iter_mut().find(|t| t.id == id);
        match task {
            Some(t) => {
                t.done = true;
                Ok(())
            }
            None => Err(AgentError::NotFound(format!("no such task: {id}"))),
        }
    }
}

#[derive(Default)]
pub struct MockContacts {
    contacts: Mutex<Vec<Contact>>,
    next_id: Mutex<u64>,
}

impl MockContacts {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> String {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        format!("contact-{id}")
    }
}

#[async_trait]
impl Contacts for MockContacts {
    async fn list_contacts(&self) -> AgentResult<Vec<Contact>> {
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn find_contact(&self, query: &str) -> AgentResult<Vec<Contact>> {
        let q = query.to_lowercase();
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&q))
            .cloned()
            .collect())
    }

    async fn create_contact(
        &self,
        name: &str,
        emails: Vec<String>,
        phones: Vec<String>,
        org: Option<&str>,
        notes: &str,
        tags: Vec<String>,
    ) -> AgentResult<Contact> {
        let contact = Contact {
            id: self.next(),
            name: name.to_string(),
            emails,
            phones,
            org: org.map(str::to_string),
            notes: notes.to_string(),
            tags,
        };
        self.contacts.lock().unwrap().push(contact.clone());
        Ok(contact)
    }
}

/// Returns canned pages for known URLs; unknown URLs 404 via `NotFound`.
#[derive(Default)]
pub struct MockWeb {
    pages: Mutex<Vec<WebPage>>,
}

impl MockWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: WebPage) -> Self {
        self.pages.lock().unwrap().push(page);
        self
    }
}

#[async_trait]
impl Web for MockWeb {
    async fn get(&self, url: &str) -> AgentResult<WebPage> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.url == url)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("no mock page for {url}")))
    }

    async fn post(&self, url: &str, _payload: &Value) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn search(&self, query: &str) -> AgentResult<Vec<WebPage>> {
        let q = query.to_lowercase();
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&q) || p.text.to_lowercase().contains(&q))
            .cloned()
            .collect())
    }

    async fn screenshot(&self, url: &str) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn get_dom(&self, url: &str) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn click_xy(&self, url: &str, _x: i64, _y: i64) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn click_selector(&self, url: &str, _selector: &str) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn click_xpath(&self, url: &str, _xpath: &str) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn fill(&self, url: &str, _selector: &str, _value: &str) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn wait_for(&self, url: &str, _selector: &str, _timeout_ms: u64) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn scroll(&self, url: &str, _dx: i64, _dy: i64) -> AgentResult<WebPage> {
        self.get(url).await
    }

    async fn locate_bounding_box(&self, url: &str, _selector: &str) -> AgentResult<Value> {
        self.get(url).await?;
        Ok(json!({ "x": 0, "y": 0, "width": 0, "height": 0 }))
    }

    async fn close_session(&self, _session_id: &str) -> AgentResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calendar_create_then_list() {
        let cal = MockCalendar::new();
        cal.create_event(
            "standup",
            "2026-08-01T09:00",
            "2026-08-01T09:15",
            vec!["ada@example.com".to_string()],
            None,
            "",
        )
        .await
        .unwrap();
        let events = cal.list_events("2026-08-01T00:00", "2026-08-01T23:59").await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn task_complete_marks_done() {
        let tasks = MockTask::new();
        let t = tasks.create_task("write report", None, 0, "", Vec::new()).await.unwrap();
        tasks.complete_task(&t.id).await.unwrap();
        assert!(tasks.list_tasks(false).await.unwrap().is_empty());
        assert_eq!(tasks.list_tasks(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn task_complete_unknown_id_errors() {
        let tasks = MockTask::new();
        assert!(tasks.complete_task("missing").await.is_err());
    }

    #[tokio::test]
    async fn contacts_find_is_case_insensitive() {
        let contacts = MockContacts::new();
        contacts
            .create_contact("Ada Lovelace", vec!["ada@example.com".to_string()], Vec::new(), None, "", Vec::new())
            .await
            .unwrap();
        let found = contacts.find_contact("lovelace").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(contacts.list_contacts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn web_get_missing_url_not_found() {
        let web = MockWeb::new();
        assert!(web.get("https://example.com").await.is_err());
    }

    #[tokio::test]
    async fn web_search_matches_title_and_text() {
        let web = MockWeb::new().with_page(WebPage {
            url: "https://example.com".to_string(),
            title: "Rust".to_string(),
            text: "a systems language".to_string(),
            session_id: None,
        });
        assert_eq!(web.search("rust").await.unwrap().len(), 1);
        assert_eq!(web.search("systems").await.unwrap().len(), 1);
        assert_eq!(web.search("python").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn web_locate_bounding_box_returns_coordinates() {
        let web = MockWeb::new().with_page(WebPage {
            url: "https://example.com".to_string(),
            title: "Rust".to_string(),
            text: "a systems language".to_string(),
            session_id: None,
        });
        let bbox = web.locate_bounding_box("https://example.com", "#main").await.unwrap();
        assert!(bbox.get("width").is_some());
    }
}
