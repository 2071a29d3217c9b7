//! Lenient extraction of structured values from model output

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Find the first JSON object embedded in `text`.
///
/// Models often wrap JSON in prose or Markdown fences, so this scans for
/// each `{` and tries to parse a balanced object from there.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    for (start, _) in text.match_indices('{') {
        let Some(end) = balanced_end(&text[start..]) else {
            continue;
        };
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..start + end]) {
            return Some(value);
        }
    }
    None
}

/// Byte length of the balanced `{...}` prefix of `s`, honouring string literals
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// First decimal number appearing in `text`
pub fn first_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").ok())
        .as_ref()?;
    re.find(text).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object() {
        assert_eq!(
            extract_json_object(r#"{"requested_count": 7}"#),
            Some(json!({"requested_count": 7}))
        );
    }

    #[test]
    fn test_object_in_fenced_prose() {
        let text = "Sure! Here you go:\n```json\n{\"relevance_score\": 0.82, \"note\": \"a } brace\"}\n```";
        assert_eq!(
            extract_json_object(text),
            Some(json!({"relevance_score": 0.82, "note": "a } brace"}))
        );
    }

    #[test]
    fn test_skips_broken_prefix() {
        let text = "{not json} then {\"a\": 1}";
        assert_eq!(extract_json_object(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_no_object() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("about 12 papers"), Some(12.0));
        assert_eq!(first_number("score: 0.75/1"), Some(0.75));
        assert_eq!(first_number("none"), None);
    }
}
