//! Best-effort JSON extraction from LLM output.
//!
//! Even with `response_format: json_object` requested, providers sometimes
//! wrap the object in prose or a fenced code block; this is the treat as an
//! unreliable oracle, always validate shape before use guard.

/// Extracts the first valid JSON value from `response`, preferring a fenced
/// ` ```json ` block over a bare `{...}` span.
pub fn extract_json_object<T: serde::de::DeserializeOwned>(response: &str) -> Option<T> {
    if let Some(fence_start) = response.find("```json") {
        let after_fence = &response[fence_start + "```json".len()..];
        if let Some(json_start) = after_fence.find(|c: char| !c.is_whitespace()) {
            let json_body = &after_fence[json_start..];
            if let Some(fence_end) = json_body.find("```") {
                let json_str = json_body[..fence_end].trim();
                if let Ok(val) = serde_json::from_str(json_str) {
                    return Some(val);
                }
            }
        }
    }

    let trimmed = response.trim();
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                let candidate = &trimmed[start..=end];
                if let Ok(val) = serde_json::from_str(candidate) {
                    return Some(val);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Plan {
        intent: String,
    }

    #[test]
    fn extracts_fenced_json() {
        let raw = "Sure, here:\n```json\n{\"intent\":\"task\"}\n```";
        let plan: Plan = extract_json_object(raw).unwrap();
        assert_eq!(plan, Plan { intent: "task".into() });
    }

    #[test]
    fn extracts_bare_json() {
        let raw = r#"{"intent":"query"}"#;
        let plan: Plan = extract_json_object(raw).unwrap();
        assert_eq!(plan, Plan { intent: "query".into() });
    }

    #[test]
    fn fenced_takes_precedence_over_bare() {
        let raw = "bare {\"intent\":\"wrong\"}\n```json\n{\"intent\":\"right\"}\n```";
        let plan: Plan = extract_json_object(raw).unwrap();
        assert_eq!(plan, Plan { intent: "right".into() });
    }

    #[test]
    fn returns_none_for_plain_text() {
        assert!(extract_json_object::<Plan>("no json here").is_none());
    }

    #[test]
    fn returns_none_for_malformed_fence() {
        assert!(extract_json_object::<Plan>("```json\n{not valid}\n```").is_none());
    }
}
