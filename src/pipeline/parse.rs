//! Turn the model's `extracted_data` text into JSON.
//!
//! Models are told to answer with a bare JSON object but still wrap it in
//! a ```` ```json ```` fence now and then. The fence is stripped before
//! parsing; anything that still is not JSON is kept verbatim under
//! `raw_extraction` so no answer is lost.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::warn;

/// Key used for replies that are not valid JSON.
pub const RAW_EXTRACTION: &str = "raw_extraction";

/// Page confidence for a reply that parsed as JSON.
pub const CONFIDENCE_PARSED: f32 = 1.0;
/// Page confidence for a reply kept as raw text.
pub const CONFIDENCE_RAW: f32 = 0.8;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Parsed model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedData {
    pub value: Value,
    /// False when the reply was kept as `raw_extraction`.
    pub is_json: bool,
}

impl ParsedData {
    pub fn confidence(&self) -> f32 {
        if self.is_json {
            CONFIDENCE_PARSED
        } else {
            CONFIDENCE_RAW
        }
    }
}

/// Parse `raw` as JSON, falling back to `{"raw_extraction": raw}`.
pub fn parse_extracted_data(raw: &str) -> ParsedData {
    let body = strip_outer_fence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(value) => ParsedData {
            value,
            is_json: true,
        },
        Err(e) => {
            let preview: String = raw.chars().take(200).collect();
            warn!("JSON parsing failed: {} (raw output: {}...)", e, preview);
            ParsedData {
                value: json!({ RAW_EXTRACTION: raw }),
                is_json: false,
            }
        }
    }
}

fn strip_outer_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_OUTER_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_object() {
        let p = parse_extracted_data(r#"{"name": "Jane", "age": 41}"#);
        assert!(p.is_json);
        assert_eq!(p.value["age"], json!(41));
        assert_eq!(p.confidence(), 1.0);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let p = parse_extracted_data("```json\n{\"a\": [1, 2]}\n```");
        assert!(p.is_json);
        assert_eq!(p.value, json!({"a": [1, 2]}));

        let p = parse_extracted_data("  ```\n{\"b\": true}```  ");
        assert_eq!(p.value, json!({"b": true}));
    }

    #[test]
    fn key_order_follows_the_reply() {
        let p = parse_extracted_data(r#"{"vendor": "ACME", "total": 3, "date": "2024-01-01"}"#);
        let keys: Vec<&str> = p.value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["vendor", "total", "date"]);
        assert_eq!(
            serde_json::to_string(&p.value).unwrap(),
            r#"{"vendor":"ACME","total":3,"date":"2024-01-01"}"#
        );
    }

    #[test]
    fn prose_is_kept_raw() {
        let p = parse_extracted_data("The invoice total is $12.");
        assert!(!p.is_json);
        assert_eq!(p.value, json!({"raw_extraction": "The invoice total is $12."}));
        assert_eq!(p.confidence(), 0.8);
    }

    #[test]
    fn truncated_json_is_kept_raw() {
        let p = parse_extracted_data("{\"a\": ");
        assert_eq!(p.value[RAW_EXTRACTION], json!("{\"a\": "));
    }
}
