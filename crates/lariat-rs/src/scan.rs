//! Incremental tool-call detection inside accumulating generated text.
//!
//! The scanner is fed a growing buffer of model output and returns every
//! completed call object found so far, wherever it sits — a call may be
//! interleaved with narrative text on either side, and the model may quote
//! string literals with single quotes. Malformed candidates are skipped
//! silently and scanning continues; error tolerance here is policy, since
//! the upstream model gives no syntax guarantees.

use serde_json::{Map, Value};

/// A completed structured call detected in generated text.
///
/// `raw_span` is the exact substring (of the quote-normalized buffer) that
/// decoded into this call. The orchestrator substitutes symbolic result
/// references into it and re-decodes before dispatch, so it must round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: Map<String, Value>,
    pub raw_span: String,
}

/// Normalize single-quote string delimiters to double quotes.
///
/// Applied to the whole buffer before decoding. Replacement is global:
/// apostrophes inside narrative text are rewritten too, which is harmless —
/// narrative never decodes as a call object.
pub fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

/// Find every completed call object in `buffer`.
///
/// Attempts a JSON decode at successive offsets, skipping ahead on failure
/// until the buffer is exhausted. A top-level object decode can only
/// succeed at a `{`, so the scan jumps brace to brace rather than byte by
/// byte. A successful decode consumes its whole span; nested objects inside
/// a decoded call are not re-scanned.
///
/// A decoded object qualifies as a call only if its `name` field is a
/// string. Arguments come from `parameters` if that key is present, else
/// `arguments`, else the empty map.
pub fn find_calls(buffer: &str) -> Vec<ToolCall> {
    let text = normalize_quotes(buffer);
    let bytes = text.as_bytes();
    let mut calls = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'{' {
            pos += 1;
            continue;
        }
        #[allow(clippy::string_slice)] // pos sits on an ASCII `{`
        let tail = &text[pos..];
        let mut stream = serde_json::Deserializer::from_str(tail).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                #[allow(clippy::string_slice)] // byte_offset is a valid boundary
                let raw_span = &tail[..consumed];
                if let Some(call) = call_from_value(&value, raw_span) {
                    calls.push(call);
                }
                pos += consumed;
            }
            _ => {
                // Malformed or incomplete candidate: skip and keep scanning.
                pos += 1;
            }
        }
    }
    calls
}

/// Interpret a decoded JSON value as a call, if it qualifies.
fn call_from_value(value: &Value, raw_span: &str) -> Option<ToolCall> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.to_string();
    let args = extract_args(object);
    Some(ToolCall {
        name,
        args,
        raw_span: raw_span.to_string(),
    })
}

/// Argument payload: `parameters` if present, else `arguments`, else empty.
/// A payload that is not an object is treated as empty.
pub(crate) fn extract_args(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .get("parameters")
        .or_else(|| object.get("arguments"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_call_embedded_in_narrative() {
        let buffer = r#"Sure, let me check. {"name": "get_date", "parameters": {}} There you go."#;
        let calls = find_calls(buffer);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_date");
        assert!(calls[0].args.is_empty());
        assert_eq!(calls[0].raw_span, r#"{"name": "get_date", "parameters": {}}"#);
    }

    #[test]
    fn normalizes_single_quoted_payloads() {
        let buffer = "{'name': 'calculator', 'parameters': {'expression': '2+2'}}";
        let calls = find_calls(buffer);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "calculator");
        assert_eq!(calls[0].args["expression"], json!("2+2"));
    }

    #[test]
    fn reads_arguments_when_parameters_absent() {
        let calls = find_calls(r#"{"name": "echo", "arguments": {"text": "hi"}}"#);
        assert_eq!(calls[0].args["text"], json!("hi"));
    }

    #[test]
    fn parameters_key_wins_over_arguments() {
        let calls =
            find_calls(r#"{"name": "echo", "parameters": {"a": 1}, "arguments": {"b": 2}}"#);
        assert_eq!(calls[0].args.len(), 1);
        assert_eq!(calls[0].args["a"], json!(1));
    }

    #[test]
    fn missing_payload_defaults_to_empty() {
        let calls = find_calls(r#"{"name": "get_date"}"#);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].args.is_empty());
    }

    #[test]
    fn non_object_payload_is_empty() {
        let calls = find_calls(r#"{"name": "echo", "parameters": "oops"}"#);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].args.is_empty());
    }

    #[test]
    fn objects_without_name_are_ignored() {
        let buffer = r#"{"kind": "note"} {"name": "real", "parameters": {}}"#;
        let calls = find_calls(buffer);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "real");
    }

    #[test]
    fn non_string_name_is_ignored() {
        assert!(find_calls(r#"{"name": 42}"#).is_empty());
    }

    #[test]
    fn finds_multiple_calls() {
        let buffer = concat!(
            r#"first {"name": "a", "parameters": {"x": 1}}"#,
            r#" and then {"name": "b", "arguments": {"y": 2}} done"#,
        );
        let calls = find_calls(buffer);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "a");
        assert_eq!(calls[1].name, "b");
    }

    #[test]
    fn nested_objects_are_not_rescanned() {
        let buffer = r#"{"name": "compare", "parameters": {"expressions": {"left": "1+1"}}}"#;
        let calls = find_calls(buffer);
        // One call; the nested {"left": ...} object is part of its span.
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "compare");
    }

    #[test]
    fn incomplete_object_is_not_detected() {
        assert!(find_calls(r#"{"name": "calculator", "parameters": {"expr"#).is_empty());
    }

    #[test]
    fn malformed_candidate_does_not_hide_later_call() {
        let buffer = r#"{broken json} {"name": "ok", "parameters": {}}"#;
        let calls = find_calls(buffer);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ok");
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        assert!(find_calls("").is_empty());
        assert!(find_calls("plain narrative text").is_empty());
    }
}
