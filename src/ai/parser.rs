use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));

/// Extract the outermost `{ ... }` span from model output and parse it.
///
/// Models wrap JSON in prose or code fences; the span runs from the first
/// `{` to the last `}`. Returns `None` when no object parses.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let span = JSON_OBJECT.find(raw)?;
    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "AI output contained no parseable JSON object");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let raw = "Here is the report:\n```json\n{\"compliance\": \"85%\", \"correlations\": [\"a\", \"b\"]}\n```";
        let obj = extract_json_object(raw).unwrap();
        assert_eq!(obj["compliance"], "85%");
        assert_eq!(obj["correlations"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn nested_objects_kept_whole() {
        let raw = "{\"a\": {\"b\": 1}, \"c\": 2} trailing";
        let obj = extract_json_object(raw).unwrap();
        assert_eq!(obj["a"]["b"], 1);
        assert_eq!(obj["c"], 2);
    }

    #[test]
    fn no_braces_is_none() {
        assert!(extract_json_object("plain prose answer").is_none());
    }

    #[test]
    fn broken_json_is_none() {
        assert!(extract_json_object("{\"compliance\": 85%,}").is_none());
    }

    #[test]
    fn two_objects_span_is_not_json() {
        assert!(extract_json_object("{\"a\":1} and {\"b\":2}").is_none());
    }
}
