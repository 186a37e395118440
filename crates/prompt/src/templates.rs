//! Plan-generation prompt text, grounded on `prompts.py`'s system/developer
//! prompts. The directives are condensed to this codebase's actual tool
//! catalog and plan wire shape rather than carried over verbatim.

use aigent_llm::ChatMessage;
use aigent_thinker::Intent;

pub const SYSTEM_PROMPT: &str = "\
You are an agentic personal assistant for a single user. Manage tasks, \
schedule, knowledge, and web actions, staying grounded in retrieved memory.

- Ground every plan in retrieved context (memory search, task/calendar \
listings). Say so when nothing relevant is found.
- Prefer concrete tool calls over advice. Avoid irreversible actions \
without confirmation; stage shell commands with dry_run first.
- Keep steps linear: no branching or loops in the emitted plan.
- Emit plans as strict JSON only. No prose, no Markdown fencing.";

pub const DEVELOPER_PROMPT: &str = "\
Technical contract for planning and tool use.

Tool catalog:
- tasks.create(title, due?, priority?, notes?, links?), tasks.complete(id)
- calendar.create_event(title, start, end, attendees?, location?, notes?), calendar.list_events(start, end)
- contacts.create(name, emails?, phones?, org?, notes?, tags?), contacts.find(query), contacts.list()
- web.get(url), web.post(url, payload?), web.search(query), web.screenshot(url), web.get_dom(url)
- web.click_selector(url, selector), web.click_xy(url, x, y), web.click_xpath(url, xpath)
- web.fill(url, selector, value), web.wait_for(url, selector, timeout_ms?), web.scroll(url, dx?, dy?)
- web.locate_bounding_box(url, selector), web.close_session(session_id)
- shell.run(command, dry_run?)
- memory.remember(text, kind?, labels?, props?)

Confidence policy: if plan confidence is below the configured threshold, \
the caller will ask the user before executing. If required details \
(URL, selectors, credentials) are missing, emit a single-step plan calling \
memory.remember with a prompt describing what's needed.

Plan format (strict JSON):
{\"intent\": \"<intent>\", \"steps\": [{\"tool\": \"<tool_name>\", \"params\": {...}, \"comment\": \"<why>\"}], \"confidence\": 0.0..1.0}";

/// Builds the message set sent to the LLM for plan generation: system +
/// developer directives, then the user's request annotated with its
/// classified intent and any pruned memory context.
pub fn build_plan_messages(request: &str, intent: Intent, context: &[String]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::system(DEVELOPER_PROMPT)];

    if !context.is_empty() {
        let joined = context.join("\n---\n");
        messages.push(ChatMessage::system(&format!("Relevant context:\n{joined}")));
    }

    messages.push(ChatMessage::user(&format!(
        "Intent: {}\nRequest: {request}",
        intent.as_str()
    )));

    messages
}

/// Builds an adaptation-loop re-plan request augmenting the original
/// request with the prior step's error.
pub fn build_adaptation_messages(
    request: &str,
    intent: Intent,
    context: &[String],
    prior_error: &str,
) -> Vec<ChatMessage> {
    let mut messages = build_plan_messages(request, intent, context);
    messages.push(ChatMessage::user(&format!(
        "The previous plan failed during execution with this error: {prior_error}\n\
         Produce a corrected plan that avoids the failure."
    )));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_messages_include_intent_and_request() {
        let messages = build_plan_messages("call mom at 3pm", Intent::Event, &[]);
        let last = messages.last().unwrap();
        assert!(last.content.contains("event"));
        assert!(last.content.contains("call mom at 3pm"));
    }

    #[test]
    fn plan_messages_include_context_when_present() {
        let messages = build_plan_messages("what's on my calendar", Intent::Query, &["meeting at noon".to_string()]);
        assert!(messages.iter().any(|m| m.content.contains("meeting at noon")));
    }

    #[test]
    fn adaptation_messages_include_prior_error() {
        let messages = build_adaptation_messages("fix the bug", Intent::Task, &[], "tool failure: timeout");
        let last = messages.last().unwrap();
        assert!(last.content.contains("timeout"));
    }
}
