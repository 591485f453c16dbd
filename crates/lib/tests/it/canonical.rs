//! Canonical JSON comparison tests

use docmap::canonical::{canonical_eq, canonicalize, decode, is_empty_object, to_canonical_string};
use serde_json::json;

#[test]
fn test_canonical_eq_ignores_key_order_at_every_level() {
    let a = json!({"b": {"y": 1, "x": [1, {"q": 1, "p": 2}]}, "a": null});
    let b = json!({"a": null, "b": {"x": [1, {"p": 2, "q": 1}], "y": 1}});
    assert!(canonical_eq(&a, &b));
    assert_eq!(to_canonical_string(&a), to_canonical_string(&b));
}

#[test]
fn test_array_order_is_significant() {
    assert!(!canonical_eq(&json!([1, 2]), &json!([2, 1])));
}

#[test]
fn test_canonicalize_sorts_nested_keys() {
    let value = canonicalize(&json!({"z": {"b": 1, "a": 2}, "m": 0}));
    assert_eq!(value.to_string(), r#"{"m":0,"z":{"a":2,"b":1}}"#);
}

#[test]
fn test_decode_reports_malformed_input() {
    assert_eq!(decode(r#"{"a": [1]}"#).unwrap(), json!({"a": [1]}));

    let err = decode("{not json").unwrap_err();
    assert!(err.is_decode_error());

    let err: docmap::Error = err.into();
    assert_eq!(err.module(), "canonical");
}

#[test]
fn test_empty_object_is_distinct_from_empty_array() {
    assert!(is_empty_object(&json!({})));
    assert!(!is_empty_object(&json!([])));
    assert!(!is_empty_object(&json!({"a": null})));
}
