//! Response Extractor
//!
//! Recovers a JSON payload from free-form model output. Strategies are tried
//! in order and the first one that parses wins:
//!
//! 1. a fenced block tagged `json`
//! 2. the span from the first `{` to the last `}`
//!
//! Parse failures never escape; they just move on to the next strategy.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Key used when plain text has to be wrapped into an object.
pub const PLAIN_TEXT_KEY: &str = "Analysis Results";

fn fenced_json() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("fenced json pattern is valid")
    })
}

/// Either a parsed JSON value or raw text wrapped as `{ "Analysis Results": text }`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedResult {
    Parsed(Value),
    PlainText(String),
}

impl ExtractedResult {
    pub fn into_value(self) -> Value {
        match self {
            ExtractedResult::Parsed(value) => value,
            ExtractedResult::PlainText(text) => {
                let mut wrapper = serde_json::Map::new();
                wrapper.insert(PLAIN_TEXT_KEY.to_string(), Value::String(text));
                Value::Object(wrapper)
            }
        }
    }
}

/// Returns the JSON embedded in `raw`, or `None` when no strategy succeeds.
pub fn extract_json(raw: &str) -> Option<Value> {
    if let Some(captures) = fenced_json().captures(raw) {
        if let Some(body) = captures.get(1) {
            match serde_json::from_str(body.as_str()) {
                Ok(value) => return Some(value),
                Err(e) => warn!(error = %e, "Fenced JSON block did not parse, trying brace span"),
            }
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str(&raw[start..=end]) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Brace-delimited span did not parse as JSON");
            None
        }
    }
}

/// Like [`extract_json`], but falls back to the plain-text wrapper.
pub fn extract_or_wrap(raw: &str) -> ExtractedResult {
    match extract_json(raw) {
        Some(value) => ExtractedResult::Parsed(value),
        None => ExtractedResult::PlainText(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "Opportunities": [
                { "headline": "Expand", "explanation": "Grow into adjacent markets." }
            ],
            "score": 7,
            "nested": { "ok": true, "text": "brace } inside" }
        })
    }

    #[test]
    fn test_fenced_block() {
        let raw = format!("Here you go:\n```json\n{}\n```\nThanks!", sample());
        assert_eq!(extract_json(&raw), Some(sample()));
    }

    #[test]
    fn test_brace_span_with_noise() {
        let raw = format!("noise {} noise", sample());
        assert_eq!(extract_json(&raw), Some(sample()));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_broken_fence_falls_through_to_braces() {
        // The fence holds garbage, but the whole string still has a parseable span.
        let raw = "```json\nnot json\n``` {\"fundamentals\": \"ok\"}";
        assert_eq!(extract_json(raw), Some(json!({ "fundamentals": "ok" })));
    }

    #[test]
    fn test_unparseable_span_is_none() {
        assert_eq!(extract_json("{ this is not: json }"), None);
    }

    #[test]
    fn test_fence_wins_over_surrounding_braces() {
        let raw = "{prefix} ```json\n{\"a\": 1}\n``` {suffix}";
        assert_eq!(extract_json(raw), Some(json!({ "a": 1 })));
    }

    #[test]
    fn test_extract_or_wrap() {
        assert_eq!(
            extract_or_wrap("```json\n{\"fundamentals\":\"ok\"}\n```"),
            ExtractedResult::Parsed(json!({ "fundamentals": "ok" }))
        );

        let wrapped = extract_or_wrap("just prose").into_value();
        assert_eq!(wrapped, json!({ "Analysis Results": "just prose" }));
    }
}
