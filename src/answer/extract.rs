//! Extraction of the structured answer from model output
//!
//! Accepts a fenced ```json block or a bare object. Parse failures fall
//! back to a low-confidence wrap of the raw text rather than an error.

use serde_json::Value;

/// Structured fields pulled from the model's JSON reply
#[derive(Debug, Clone)]
pub struct ParsedAnswer {
    pub answer: String,
    pub key_points: Vec<String>,
    pub sources: Vec<String>,
    pub confidence: f32,
    pub summary: String,
    /// False when the reply was unparseable and wrapped as-is
    pub parsed: bool,
}

/// Confidence assigned to unparseable replies
const FALLBACK_CONFIDENCE: f32 = 0.3;

/// Pull the answer object out of a model reply
pub fn extract_answer(reply: &str) -> ParsedAnswer {
    match find_json_object(reply).and_then(|json| serde_json::from_str::<Value>(&json).ok()) {
        Some(value) => from_value(&value, reply),
        None => fallback(reply),
    }
}

fn find_json_object(reply: &str) -> Option<String> {
    // fenced code block first
    if let Some(start) = reply.find("```json") {
        let rest = &reply[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }
    // bare object: first '{' through last '}'
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end > start {
        Some(reply[start..=end].to_string())
    } else {
        None
    }
}

fn from_value(value: &Value, raw: &str) -> ParsedAnswer {
    let answer = match value.get("answer") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => return fallback(raw),
    };

    let key_points = value
        .get("key_points")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let sources = value
        .get("sources")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(source_id).collect())
        .unwrap_or_default();

    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .map(|c| (c as f32).clamp(0.0, 1.0))
        .unwrap_or(0.5);

    let summary = value
        .get("summary")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    ParsedAnswer {
        answer,
        key_points,
        sources,
        confidence,
        summary,
        parsed: true,
    }
}

/// Sources may arrive as plain ids or as {"video_id": ...} objects
fn source_id(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("video_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

fn fallback(raw: &str) -> ParsedAnswer {
    let clean: String = raw.trim().chars().take(1000).collect();
    ParsedAnswer {
        answer: clean,
        key_points: Vec::new(),
        sources: Vec::new(),
        confidence: FALLBACK_CONFIDENCE,
        summary: String::new(),
        parsed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        let reply = r#"{"answer": "yes", "key_points": ["a", "b"], "sources": ["v1"], "confidence": 0.9, "summary": "short"}"#;
        let parsed = extract_answer(reply);
        assert!(parsed.parsed);
        assert_eq!(parsed.answer, "yes");
        assert_eq!(parsed.key_points, vec!["a", "b"]);
        assert_eq!(parsed.sources, vec!["v1"]);
        assert_eq!(parsed.confidence, 0.9);
    }

    #[test]
    fn test_fenced_block() {
        let reply = "Here you go:\n```json\n{\"answer\": \"fenced\", \"confidence\": 0.7}\n```";
        let parsed = extract_answer(reply);
        assert!(parsed.parsed);
        assert_eq!(parsed.answer, "fenced");
    }

    #[test]
    fn test_object_with_surrounding_prose() {
        let reply = "Sure! {\"answer\": \"embedded\", \"confidence\": 0.6} Hope that helps.";
        let parsed = extract_answer(reply);
        assert!(parsed.parsed);
        assert_eq!(parsed.answer, "embedded");
    }

    #[test]
    fn test_unparseable_falls_back() {
        let parsed = extract_answer("plain prose with no json at all");
        assert!(!parsed.parsed);
        assert_eq!(parsed.confidence, FALLBACK_CONFIDENCE);
        assert!(parsed.answer.contains("plain prose"));
    }

    #[test]
    fn test_missing_answer_field_falls_back() {
        let parsed = extract_answer(r#"{"confidence": 0.9}"#);
        assert!(!parsed.parsed);
    }

    #[test]
    fn test_object_sources() {
        let reply = r#"{"answer": "x", "sources": [{"video_id": "v7", "relevance": "r"}, "v8"]}"#;
        let parsed = extract_answer(reply);
        assert_eq!(parsed.sources, vec!["v7", "v8"]);
    }

    #[test]
    fn test_confidence_clamped() {
        let parsed = extract_answer(r#"{"answer": "x", "confidence": 3.5}"#);
        assert_eq!(parsed.confidence, 1.0);
    }

    #[test]
    fn test_missing_confidence_defaults() {
        let parsed = extract_answer(r#"{"answer": "x"}"#);
        assert_eq!(parsed.confidence, 0.5);
    }
}
