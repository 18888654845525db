// src/summary/coerce.rs
//! Turning free-form model output into a validated `SummaryResult`.
//!
//! Extraction is a heuristic: slice from the first `{` to the last `}` and parse strictly.
//! A `}` inside a string literal after the real object can mis-slice; that case is left to
//! the repair call.

use serde_json::Value;
use thiserror::Error;

use super::{SummaryResult, THEME_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailureKind {
    /// The candidate text is not JSON.
    Syntax,
    /// Valid JSON, wrong shape.
    Shape,
}

#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ParseFailure {
    pub kind: ParseFailureKind,
    pub reason: String,
    /// The model output exactly as received.
    pub raw_text: String,
}

impl ParseFailure {
    fn syntax(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            kind: ParseFailureKind::Syntax,
            reason: reason.into(),
            raw_text: raw.to_string(),
        }
    }

    fn shape(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            kind: ParseFailureKind::Shape,
            reason: reason.into(),
            raw_text: raw.to_string(),
        }
    }
}

/// The first-`{`-to-last-`}` slice of `raw`, or `raw` itself when no such pair exists.
pub fn extract_json_slice(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    }
}

/// Parse and validate model output as a `SummaryResult`.
pub fn extract_json(raw: &str) -> Result<SummaryResult, ParseFailure> {
    let candidate = extract_json_slice(raw);

    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| ParseFailure::syntax(format!("invalid JSON: {e}"), raw))?;

    validate_shape(&value).map_err(|reason| ParseFailure::shape(reason, raw))?;

    serde_json::from_value(value)
        .map_err(|e| ParseFailure::shape(format!("schema mismatch: {e}"), raw))
}

/// Field-level checks with messages a human can act on. Runs before serde so the reason
/// names the offending field instead of a byte offset.
fn validate_shape(v: &Value) -> Result<(), String> {
    let obj = v
        .as_object()
        .ok_or_else(|| "top-level value is not an object".to_string())?;

    match obj.get("date_range") {
        Some(Value::String(_)) => {}
        Some(_) => return Err("date_range must be a string".into()),
        None => return Err("missing field date_range".into()),
    }

    match obj.get("total_items") {
        Some(n) if n.as_u64().is_some() => {}
        Some(_) => return Err("total_items must be a non-negative integer".into()),
        None => return Err("missing field total_items".into()),
    }

    let themes = match obj.get("top_themes") {
        Some(Value::Array(a)) => a,
        Some(_) => return Err("top_themes must be an array".into()),
        None => return Err("missing field top_themes".into()),
    };
    if themes.len() != THEME_COUNT {
        return Err(format!(
            "top_themes must contain exactly {THEME_COUNT} items, got {}",
            themes.len()
        ));
    }

    for (i, t) in themes.iter().enumerate() {
        let t = t
            .as_object()
            .ok_or_else(|| format!("top_themes[{i}] is not an object"))?;
        for key in ["theme", "summary", "evidence_quote"] {
            match t.get(key) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(format!("top_themes[{i}].{key} must be a string")),
                None => return Err(format!("top_themes[{i}] missing field {key}")),
            }
        }
        check_enum(t.get("sentiment"), i, "sentiment", SENTIMENTS)?;
        check_enum(t.get("urgency"), i, "urgency", URGENCIES)?;
    }
    Ok(())
}

const SENTIMENTS: &[&str] = &["positive", "neutral", "negative", "mixed"];
const URGENCIES: &[&str] = &["low", "medium", "high"];

fn check_enum(v: Option<&Value>, i: usize, key: &str, allowed: &[&str]) -> Result<(), String> {
    match v.and_then(Value::as_str) {
        Some(s) if allowed.contains(&s) => Ok(()),
        Some(s) => Err(format!(
            "top_themes[{i}].{key} '{s}' is not one of {}",
            allowed.join("|")
        )),
        None => Err(format!("top_themes[{i}] missing string field {key}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{Sentiment, Urgency};
    use serde_json::json;

    fn theme(sentiment: &str, urgency: &str) -> Value {
        json!({
            "theme": "Docs",
            "summary": "Rate limit docs confuse users.",
            "sentiment": sentiment,
            "urgency": urgency,
            "evidence_quote": "Rate limiting docs are confusing."
        })
    }

    fn valid() -> Value {
        json!({
            "date_range": "a to b",
            "total_items": 5,
            "top_themes": [
                theme("negative", "high"),
                theme("mixed", "medium"),
                theme("positive", "low")
            ]
        })
    }

    #[test]
    fn slice_strips_leading_and_trailing_prose() {
        let raw = "Sure! Here you go: {\"a\": {\"b\": 1}} Hope that helps.";
        assert_eq!(extract_json_slice(raw), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn slice_leaves_text_without_braces_untouched() {
        assert_eq!(extract_json_slice("no json here"), "no json here");
        assert_eq!(extract_json_slice("} backwards {"), "} backwards {");
    }

    #[test]
    fn parses_plain_valid_object() {
        let out = extract_json(&valid().to_string()).unwrap();
        assert_eq!(out.total_items, 5);
        assert_eq!(out.top_themes.len(), 3);
        assert_eq!(out.top_themes[0].sentiment, Sentiment::Negative);
        assert_eq!(out.top_themes[2].urgency, Urgency::Low);
    }

    #[test]
    fn parses_object_inside_markdown_fence_and_commentary() {
        let raw = format!(
            "Here is the analysis:\n```json\n{}\n```\nLet me know if you need more.",
            serde_json::to_string_pretty(&valid()).unwrap()
        );
        let out = extract_json(&raw).unwrap();
        assert_eq!(out.date_range, "a to b");
    }

    #[test]
    fn truncated_output_is_a_syntax_failure() {
        let raw = r#"{"date_range": "a to b", "total_items": 5, "top_themes": [{"theme": "Docs"}"#;
        let err = extract_json(raw).unwrap_err();
        assert_eq!(err.kind, ParseFailureKind::Syntax);
        assert_eq!(err.raw_text, raw);
    }

    #[test]
    fn trailing_comma_is_a_syntax_failure() {
        let err = extract_json(r#"{"date_range": "x",}"#).unwrap_err();
        assert_eq!(err.kind, ParseFailureKind::Syntax);
    }

    #[test]
    fn wrong_theme_count_is_a_shape_failure() {
        for n in [0usize, 2, 4] {
            let mut v = valid();
            v["top_themes"] = Value::Array((0..n).map(|_| theme("neutral", "low")).collect());
            let err = extract_json(&v.to_string()).unwrap_err();
            assert_eq!(err.kind, ParseFailureKind::Shape, "n={n}");
            assert!(err.reason.contains("exactly 3"), "{}", err.reason);
        }
    }

    #[test]
    fn enum_values_are_enforced() {
        let mut v = valid();
        v["top_themes"][1]["sentiment"] = json!("angry");
        let err = extract_json(&v.to_string()).unwrap_err();
        assert_eq!(err.kind, ParseFailureKind::Shape);
        assert!(err.reason.contains("sentiment"));

        let mut v = valid();
        v["top_themes"][0]["urgency"] = json!("critical");
        assert_eq!(extract_json(&v.to_string()).unwrap_err().kind, ParseFailureKind::Shape);
    }

    #[test]
    fn every_enum_member_is_accepted() {
        for s in ["positive", "neutral", "negative", "mixed"] {
            for u in ["low", "medium", "high"] {
                let mut v = valid();
                v["top_themes"][0] = theme(s, u);
                assert!(extract_json(&v.to_string()).is_ok(), "{s}/{u}");
            }
        }
    }

    #[test]
    fn quote_array_is_rejected() {
        let mut v = valid();
        v["top_themes"][0]["evidence_quote"] = json!(["one", "two"]);
        let err = extract_json(&v.to_string()).unwrap_err();
        assert!(err.reason.contains("evidence_quote"));
    }

    #[test]
    fn negative_or_missing_total_is_rejected() {
        let mut v = valid();
        v["total_items"] = json!(-1);
        assert_eq!(extract_json(&v.to_string()).unwrap_err().kind, ParseFailureKind::Shape);

        let mut v = valid();
        v.as_object_mut().unwrap().remove("total_items");
        let err = extract_json(&v.to_string()).unwrap_err();
        assert!(err.reason.contains("total_items"));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let mut v = valid();
        v["model_notes"] = json!("ignored");
        assert!(extract_json(&v.to_string()).is_ok());
    }
}
