//! Rule-based intent classification, used to skip the LLM on obvious requests.
//!
//! Grounded on `deterministic_parser.py`'s keyword sets and field extractors,
//! extended with the `web_io`/`remember`/`inform` kinds the PEAL loop adds on
//! top of the original four (event/task/query/procedure).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const EVENT_KEYWORDS: &[&str] = &[
    "remind", "reminder", "schedule", "event", "meet", "meeting", "appointment", "call",
    "calendar", "alarm", "notify", "notification",
];
const TASK_KEYWORDS: &[&str] = &[
    "todo", "task", "do", "complete", "finish", "fix", "implement", "add", "create", "make",
    "build", "write", "update", "delete", "remove", "install", "setup", "configure",
];
const QUERY_KEYWORDS: &[&str] = &[
    "what", "when", "where", "who", "how", "why", "show", "list", "find", "search", "get",
    "tell", "explain", "describe",
];
const PROCEDURE_KEYWORDS: &[&str] =
    &["procedure", "workflow", "process", "steps", "run", "execute", "perform", "automate", "script"];
const WEB_IO_KEYWORDS: &[&str] = &["http://", "https://", "www.", "login", "sign in", "log in", "password"];
const REMEMBER_KEYWORDS: &[&str] = &["remember", "note that", "keep in mind", "don't forget", "fyi"];

const QUESTION_STARTERS: &[&str] = &["what", "when", "where", "who", "how", "why"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Event,
    Task,
    Query,
    Procedure,
    WebIo,
    Remember,
    Inform,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Event => "event",
            Intent::Task => "task",
            Intent::Query => "query",
            Intent::Procedure => "procedure",
            Intent::WebIo => "web_io",
            Intent::Remember => "remember",
            Intent::Inform => "inform",
        }
    }
}

fn at_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").unwrap())
}

fn relative_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bin\s+(\d+)\s+(minute|hour|min|hr)s?\b").unwrap())
}

/// Classifies free text into one of the seven PEAL intent kinds. Order of
/// checks matters: question words win over event/task keywords so "what is
/// my schedule?" doesn't get misread as an event.
pub fn infer_intent(instruction: &str) -> Intent {
    let text = instruction.to_lowercase();
    let trimmed = text.trim();

    let first_word = trimmed.split_whitespace().next().unwrap_or("");
    if QUESTION_STARTERS.contains(&first_word) {
        return Intent::Query;
    }
    if ["show", "list", "find", "search", "get"].iter().any(|kw| trimmed.starts_with(kw)) {
        return Intent::Query;
    }

    if WEB_IO_KEYWORDS.iter().any(|kw| trimmed.contains(kw)) {
        return Intent::WebIo;
    }
    if REMEMBER_KEYWORDS.iter().any(|kw| trimmed.contains(kw)) {
        return Intent::Remember;
    }
    if EVENT_KEYWORDS.iter().any(|kw| trimmed.contains(kw)) {
        return Intent::Event;
    }
    if PROCEDURE_KEYWORDS.iter().any(|kw| trimmed.contains(kw)) {
        return Intent::Procedure;
    }
    if TASK_KEYWORDS.iter().any(|kw| trimmed.contains(kw)) {
        return Intent::Task;
    }

    Intent::Inform
}

/// `{"time": "HH:MM" | "+Nm" | "+Nh" | "unspecified", "action": "..."}`
pub fn extract_event_fields(instruction: &str) -> HashMap<String, String> {
    let mut time_value = "unspecified".to_string();

    if Regex::new(r"(?i)\bat\s+midnight\b").unwrap().is_match(instruction) {
        time_value = "00:00".to_string();
    } else if Regex::new(r"(?i)\bat\s+noon\b").unwrap().is_match(instruction) {
        time_value = "12:00".to_string();
    } else if let Some(caps) = at_time_re().captures(instruction) {
        let mut hour: u32 = caps.get(1).unwrap().as_str().parse().unwrap_or(0);
        let minute: u32 = caps.get(2).map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0);
        let ampm = caps.get(3).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        if ampm == "pm" && hour < 12 {
            hour += 12;
        } else if ampm == "am" && hour == 12 {
            hour = 0;
        }
        time_value = format!("{hour:02}:{minute:02}");
    }

    if time_value == "unspecified" {
        if let Some(caps) = relative_time_re().captures(instruction) {
            let amount: u64 = caps.get(1).unwrap().as_str().parse().unwrap_or(0);
            let unit = caps.get(2).unwrap().as_str().to_lowercase();
            time_value = if unit == "hour" || unit == "hr" { format!("+{amount}h") } else { format!("+{amount}m") };
        }
    }

    let mut action = at_time_re().replace_all(instruction, "").to_string();
    action = Regex::new(r"(?i)\bat\s+(midnight|noon)\b").unwrap().replace_all(&action, "").to_string();
    action = relative_time_re().replace_all(&action, "").to_string();
    action = Regex::new(r"(?i)\b(remind me to|remind me|please|can you|could you)\b")
        .unwrap()
        .replace_all(&action, "")
        .to_string();
    action = Regex::new(r"(?i)\b(schedule|set|create)\s+(a\s+)?(reminder|event|meeting)\s*(to|for)?\b")
        .unwrap()
        .replace_all(&action, "")
        .to_string();
    let action = action.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '.').to_string();

    let mut fields = HashMap::new();
    fields.insert("time".to_string(), time_value);
    fields.insert("action".to_string(), if action.is_empty() { instruction.trim().to_string() } else { action });
    fields
}

/// `{"title": "...", "priority": "normal|high|low"}`
pub fn extract_task_fields(instruction: &str) -> HashMap<String, String> {
    let lower = instruction.to_lowercase();

    let priority = if ["urgent", "asap", "important", "critical", "high priority"].iter().any(|w| lower.contains(w)) {
        "high"
    } else if ["low priority", "whenever", "eventually", "someday"].iter().any(|w| lower.contains(w)) {
        "low"
    } else {
        "normal"
    };

    let mut title = Regex::new(r"(?i)\b(please|can you|could you|i need to|i want to)\b")
        .unwrap()
        .replace_all(instruction, "")
        .to_string();
    title = Regex::new(r"(?i)\b(urgent|asap|important|critical|high priority|low priority)\b")
        .unwrap()
        .replace_all(&title, "")
        .to_string();
    let title = title.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '.').to_string();

    let mut fields = HashMap::new();
    fields.insert("title".to_string(), if title.is_empty() { instruction.trim().to_string() } else { title });
    fields.insert("priority".to_string(), priority.to_string());
    fields
}

/// `{"query_type": "what|when|where|who|how|why|list", "subject": "..."}`
pub fn extract_query_fields(instruction: &str) -> HashMap<String, String> {
    let text = instruction.to_lowercase();
    let trimmed = text.trim();

    let mut query_type = "what".to_string();
    for qtype in QUESTION_STARTERS {
        if trimmed.starts_with(qtype) {
            query_type = qtype.to_string();
            break;
        }
    }
    if ["list", "show", "find", "search"].iter().any(|w| trimmed.contains(w)) {
        query_type = "list".to_string();
    }

    let subject = Regex::new(r"(?i)^(what|when|where|who|how|why|list|show|find|search)\s*(is|are|do|does|did|was|were|my|the)?\s*")
        .unwrap()
        .replace(instruction, "")
        .to_string();
    let subject = subject.trim_matches(|c: char| c.is_whitespace() || c == '?' || c == '.').to_string();

    let mut fields = HashMap::new();
    fields.insert("query_type".to_string(), query_type);
    fields.insert("subject".to_string(), if subject.is_empty() { instruction.trim().to_string() } else { subject });
    fields
}

/// Deterministic classify-and-extract in one step.
pub fn quick_parse(instruction: &str) -> (Intent, HashMap<String, String>) {
    let kind = infer_intent(instruction);
    let fields = match kind {
        Intent::Event => extract_event_fields(instruction),
        Intent::Task => extract_task_fields(instruction),
        Intent::Query => extract_query_fields(instruction),
        _ => {
            let mut fields = HashMap::new();
            fields.insert("description".to_string(), instruction.trim().to_string());
            fields
        }
    };
    (kind, fields)
}

/// Whether the rule-based classification is confident enough to skip the LLM.
pub fn is_obvious_intent(instruction: &str, kind: Intent) -> bool {
    let text = instruction.to_lowercase();
    let trimmed = text.trim();

    match kind {
        Intent::Event => {
            let has_time = Regex::new(r"(?i)\bat\s+\d|in\s+\d+\s+(minute|hour)|midnight|noon").unwrap().is_match(&text);
            let has_event_word =
                ["remind", "schedule", "meeting", "appointment", "alarm"].iter().any(|kw| text.contains(kw));
            has_time && has_event_word
        }
        Intent::Query => trimmed.split_whitespace().next().is_some_and(|w| QUESTION_STARTERS.contains(&w)),
        Intent::Task => {
            let action_verbs = ["create", "make", "add", "fix", "update", "delete", "remove", "install", "build"];
            trimmed.split_whitespace().take(2).any(|w| action_verbs.contains(&w))
        }
        Intent::Procedure => ["procedure", "workflow", "run the", "execute the"].iter().any(|kw| text.contains(kw)),
        Intent::WebIo | Intent::Remember | Intent::Inform => false,
    }
}

/// Confidence score in `[0, 1]` for the classification, combining keyword
/// density with the `is_obvious_intent` bonus.
pub fn confidence_score(instruction: &str, kind: Intent) -> f32 {
    let text = instruction.to_lowercase();
    let mut score: f32 = 0.5;

    let keywords: &[&str] = match kind {
        Intent::Event => EVENT_KEYWORDS,
        Intent::Task => TASK_KEYWORDS,
        Intent::Query => QUERY_KEYWORDS,
        Intent::Procedure => PROCEDURE_KEYWORDS,
        Intent::WebIo => WEB_IO_KEYWORDS,
        Intent::Remember => REMEMBER_KEYWORDS,
        Intent::Inform => &[],
    };
    let matches = keywords.iter().filter(|kw| text.contains(*kw)).count();
    score += (matches as f32 * 0.1).min(0.3);

    if is_obvious_intent(instruction, kind) {
        score += 0.2;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_word_wins_over_event_keyword() {
        assert_eq!(infer_intent("what is my schedule for tomorrow?"), Intent::Query);
    }

    #[test]
    fn remind_with_time_is_event() {
        assert_eq!(infer_intent("remind me to call mom at 3pm"), Intent::Event);
    }

    #[test]
    fn create_task_is_task() {
        assert_eq!(infer_intent("create a new task to fix the bug"), Intent::Task);
    }

    #[test]
    fn url_is_web_io() {
        assert_eq!(infer_intent("log in to https://example.com"), Intent::WebIo);
    }

    #[test]
    fn remember_keyword_is_remember() {
        assert_eq!(infer_intent("remember that I prefer window seats"), Intent::Remember);
    }

    #[test]
    fn default_is_inform() {
        assert_eq!(infer_intent("the sky is blue today"), Intent::Inform);
    }

    #[test]
    fn extract_event_fields_handles_pm_time() {
        let fields = extract_event_fields("remind me at 3pm to call mom");
        assert_eq!(fields["time"], "15:00");
        assert_eq!(fields["action"], "to call mom".trim());
    }

    #[test]
    fn extract_event_fields_handles_noon() {
        let fields = extract_event_fields("schedule meeting at noon");
        assert_eq!(fields["time"], "12:00");
    }

    #[test]
    fn extract_event_fields_handles_relative_time() {
        let fields = extract_event_fields("remind me in 30 minutes to stretch");
        assert_eq!(fields["time"], "+30m");
    }

    #[test]
    fn extract_task_fields_detects_high_priority() {
        let fields = extract_task_fields("this is urgent, fix the login bug");
        assert_eq!(fields["priority"], "high");
    }

    #[test]
    fn extract_query_fields_detects_list_type() {
        let fields = extract_query_fields("list my tasks for today");
        assert_eq!(fields["query_type"], "list");
    }

    #[test]
    fn quick_parse_routes_to_correct_extractor() {
        let (kind, fields) = quick_parse("remind me at 3pm to call mom");
        assert_eq!(kind, Intent::Event);
        assert_eq!(fields["time"], "15:00");
    }

    #[test]
    fn obvious_event_requires_time_and_keyword() {
        assert!(is_obvious_intent("remind me at 3pm to call mom", Intent::Event));
        assert!(!is_obvious_intent("call mom", Intent::Event));
    }

    #[test]
    fn confidence_score_is_bounded() {
        let score = confidence_score("remind me at 3pm to call mom about the meeting", Intent::Event);
        assert!(score > 0.5 && score <= 1.0);
    }
}
