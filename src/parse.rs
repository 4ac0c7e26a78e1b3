//! Tolerant parsing of model output.
//!
//! Model output is untrusted and variable; the final JSON handed to callers
//! is always structurally valid, but conformance to a kind's schema is
//! best-effort only. Parsing runs three stages, each unit-testable:
//!
//! 1. strict JSON decode of the whole response;
//! 2. best-effort recovery: extract the first balanced `{...}` span (models
//!    often wrap JSON in prose or code fences) and decode that;
//! 3. fallback wrap: `{"analysis": <raw text>}`.
//!
//! Stage 3 cannot fail, so this module never errors.

use serde_json::Value;

/// Strict whole-string decode. Accepts only a JSON object (a bare string or
/// number is not a useful analysis payload).
pub fn parse_strict(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

/// Locate the first balanced `{...}` span, honoring JSON string literals and
/// escapes so braces inside strings don't unbalance the scan.
pub fn extract_balanced_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse model output into a JSON object, degrading to `{"analysis": raw}`
/// if neither strict decoding nor balanced-span recovery succeeds.
pub fn parse_result(raw: &str) -> Value {
    if let Some(v) = parse_strict(raw) {
        return v;
    }
    if let Some(span) = extract_balanced_object(raw) {
        if let Some(v) = parse_strict(span) {
            return v;
        }
    }
    serde_json::json!({ "analysis": raw })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_accepts_clean_object() {
        let v = parse_strict(r#"{"overallRiskScore": 7}"#).unwrap();
        assert_eq!(v["overallRiskScore"], 7);
    }

    #[test]
    fn strict_rejects_non_object() {
        assert!(parse_strict("\"just a string\"").is_none());
        assert!(parse_strict("42").is_none());
        assert!(parse_strict("not json at all").is_none());
    }

    #[test]
    fn strict_tolerates_surrounding_whitespace() {
        assert!(parse_strict("  \n{\"a\": 1}\n ").is_some());
    }

    #[test]
    fn balanced_extraction_skips_leading_prose() {
        let raw = "Here is the analysis you asked for:\n{\"a\": {\"b\": 2}}\nHope that helps!";
        assert_eq!(extract_balanced_object(raw), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn balanced_extraction_ignores_braces_inside_strings() {
        let raw = r#"note {"clause": "see {section 4}", "n": 1} tail"#;
        let span = extract_balanced_object(raw).unwrap();
        let v = parse_strict(span).unwrap();
        assert_eq!(v["n"], 1);
    }

    #[test]
    fn balanced_extraction_handles_escaped_quotes() {
        let raw = r#"{"quote": "he said \"{\" and left"}"#;
        let span = extract_balanced_object(raw).unwrap();
        assert!(parse_strict(span).is_some());
    }

    #[test]
    fn unterminated_object_yields_none() {
        assert_eq!(extract_balanced_object("{\"a\": 1"), None);
        assert_eq!(extract_balanced_object("no braces here"), None);
    }

    #[test]
    fn parse_result_recovers_fenced_json() {
        let raw = "```json\n{\"summary\": \"ok\"}\n```";
        let v = parse_result(raw);
        assert_eq!(v["summary"], "ok");
    }

    #[test]
    fn parse_result_never_fails_on_garbage() {
        let raw = "The contract looks fine overall. { unclosed";
        let v = parse_result(raw);
        assert_eq!(v["analysis"], raw);
    }

    #[test]
    fn parse_result_wraps_plain_prose() {
        let raw = "This agreement has a termination clause with 30 days notice.";
        let v = parse_result(raw);
        assert_eq!(v, serde_json::json!({ "analysis": raw }));
    }
}
