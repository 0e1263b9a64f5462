//! JSON extraction from free-form model replies.
//!
//! Tried in order: a ```json fence, any ``` fence, the whole reply, then the
//! span from the first `{` to the last `}`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{LlmError, LlmResult};

fn json_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)```").ok())
        .as_ref()
}

fn any_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").ok())
        .as_ref()
}

fn fenced<'a>(re: Option<&Regex>, text: &'a str) -> Option<&'a str> {
    re?.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Pull the first parseable JSON object out of `reply`.
pub fn extract_json(reply: &str) -> LlmResult<Value> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(LlmError::EmptyReply);
    }

    let candidates = [
        fenced(json_fence(), reply),
        fenced(any_fence(), reply),
        Some(reply),
        outermost_object(reply),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
            return Ok(value);
        }
    }

    let preview: String = reply.chars().take(120).collect();
    Err(LlmError::Parse(format!("no JSON object in reply: {preview}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_fence() {
        let reply = "Here you go:\n```json\n{\"score\": 4, \"rationale\": \"ok\"}\n```\nThanks";
        assert_eq!(extract_json(reply).unwrap()["score"], json!(4));
    }

    #[test]
    fn test_bare_fence() {
        let reply = "```\n{\"score\": 2}\n```";
        assert_eq!(extract_json(reply).unwrap()["score"], json!(2));
    }

    #[test]
    fn test_whole_reply() {
        assert_eq!(extract_json(" {\"score\": 5} ").unwrap()["score"], json!(5));
    }

    #[test]
    fn test_embedded_object() {
        let reply = "Score follows {\"score\": 3, \"details\": {\"x\": 1}} as requested.";
        let v = extract_json(reply).unwrap();
        assert_eq!(v["details"]["x"], json!(1));
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        assert!(matches!(extract_json("[1, 2, 3]"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_empty_reply() {
        assert!(matches!(extract_json("   "), Err(LlmError::EmptyReply)));
    }
}
