//! Hashing helpers: SHA-256 hex digests and canonical JSON.
//!
//! [`canonical_json`] renders a JSON value with object keys sorted at every
//! nesting level, so two mappings that hold the same pairs in a different
//! insertion order always produce the same text (and therefore the same
//! digest).

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Render `value` as compact JSON with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> =
                map.iter().map(|(k, v)| (k, canonical_json(v))).collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn consistent_output() {
        let data = b"hello world";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": true, "y": null}, "c": [ {"k": 2, "j": 1} ]});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"y":null,"z":true},"b":1,"c":[{"j":1,"k":2}]}"#
        );
    }

    #[test]
    fn canonical_json_ignores_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("width".into(), json!(512));
        first.insert("steps".into(), json!(25));
        first.insert("seed".into(), Value::Null);

        let mut second = serde_json::Map::new();
        second.insert("seed".into(), Value::Null);
        second.insert("steps".into(), json!(25));
        second.insert("width".into(), json!(512));

        assert_ne!(
            Value::Object(first.clone()).to_string(),
            Value::Object(second.clone()).to_string(),
            "insertion order is preserved by the map itself"
        );
        assert_eq!(
            canonical_json(&Value::Object(first)),
            canonical_json(&Value::Object(second))
        );
    }

    #[test]
    fn canonical_json_escapes_strings() {
        assert_eq!(canonical_json(&json!("a\"b")), r#""a\"b""#);
        assert_eq!(canonical_json(&json!({"k\"": 1})), r#"{"k\"":1}"#);
    }
}
