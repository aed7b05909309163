//! Tolerant decoding of model replies into a flat string-to-string map.
//!
//! Model output is JSON-shaped at best: it may arrive wrapped in markdown
//! fences, prefixed with commentary, truncated mid-object, or with numeric
//! values where strings were requested. Decoding never fails; callers get
//! whatever partial structure was recoverable, and the response checker
//! decides whether that is good enough.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static PAIR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""((?:\\.|[^"\\])*)"\s*:\s*"((?:\\.|[^"\\])*)""#).expect("valid pair regex")
});

/// Decode `text` into a flat map, best effort. Returns an empty map when
/// nothing resembling a JSON object can be recovered.
pub fn safe_decode(text: &str) -> HashMap<String, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return HashMap::new();
    }

    if let Some(map) = decode_object(trimmed) {
        return map;
    }

    // Second chance: the outermost '{' .. '}' span, which sheds markdown
    // fences and leading prose in one cut.
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(map) = decode_object(&trimmed[start..=end]) {
                return map;
            }
        }
    }

    // Last resort: scrape individual "key": "value" pairs, which salvages
    // the completed lines of a truncated reply.
    scrape_pairs(trimmed)
}

fn decode_object(text: &str) -> Option<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
    )
}

// Replies sometimes deserialize values as numbers or booleans; coerce them
// to strings rather than dropping the line.
fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn scrape_pairs(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for caps in PAIR_REGEX.captures_iter(text) {
        let key = unescape(&caps[1]);
        let value = unescape(&caps[2]);
        map.entry(key).or_insert(value);
    }
    map
}

fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
