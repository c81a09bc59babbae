//! Response decoding and envelope unwrapping.
//!
//! Every CloudStack response wraps its payload in one command-specific key,
//! e.g. `{"listzonesresponse": {...}}`. The key's name carries nothing.

use serde_json::Value;

use crate::error::DecodeError;

/// Decode `raw` and strip the single-key envelope.
///
/// Zero or several top-level keys leave the structure as it is.
pub fn parse(raw: &[u8], declares_json: bool) -> Result<Value, DecodeError> {
    if !declares_json {
        return Err(decode_error(raw));
    }
    let data: Value = serde_json::from_slice(raw).map_err(|_| decode_error(raw))?;
    Ok(unwrap(data))
}

/// Whether a declared content type announces JSON.
///
/// CloudStack has served JSON as `text/javascript`, so that counts too.
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence == "text/javascript" || essence.ends_with("+json")
}

/// Strip a single-key wrapper; anything else is returned as is.
pub fn unwrap(data: Value) -> Value {
    match data {
        Value::Object(map) if map.len() == 1 => map
            .into_iter()
            .next()
            .map(|(_, payload)| payload)
            .unwrap_or_default(),
        other => other,
    }
}

fn decode_error(raw: &[u8]) -> DecodeError {
    let raw = String::from_utf8_lossy(raw).into_owned();
    tracing::debug!(content = %raw, "server did not return json content");
    DecodeError { raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_single_key() {
        let payload = parse(br#"{"fooresponse": {"text": "hi"}}"#, true).unwrap();
        assert_eq!(payload, json!({"text": "hi"}));
    }

    #[test]
    fn wrapper_name_is_irrelevant() {
        let payload = parse(br#"{"anything": [1, 2]}"#, true).unwrap();
        assert_eq!(payload, json!([1, 2]));
    }

    #[test]
    fn multiple_keys_pass_through() {
        let payload = parse(br#"{"a": 1, "b": 2}"#, true).unwrap();
        assert_eq!(payload, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn empty_object_passes_through() {
        assert_eq!(parse(b"{}", true).unwrap(), json!({}));
    }

    #[test]
    fn non_object_passes_through() {
        assert_eq!(parse(b"[1]", true).unwrap(), json!([1]));
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let err = parse(b"This is not a json response!", true).unwrap_err();
        assert_eq!(err.raw, "This is not a json response!");
    }

    #[test]
    fn non_json_content_type_is_decode_error() {
        let err = parse(br#"{"a": {"b": 1}}"#, false).unwrap_err();
        assert_eq!(err.raw, r#"{"a": {"b": 1}}"#);
    }

    #[test]
    fn json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=UTF-8"));
        assert!(is_json_content_type("text/javascript;charset=UTF-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/plain; charset=utf-8"));
        assert!(!is_json_content_type("text/html"));
    }
}
