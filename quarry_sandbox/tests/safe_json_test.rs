//! Hardened JSON reads and writes through the sandbox.

mod common;

use common::{Fixture, as_str};
use quarry_sandbox::{FsErrorKind, JsonSchema, WriteOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct SavedQuery {
    name: String,
    terms: Vec<String>,
    limit: u32,
}

#[test]
fn test_write_json_then_read_json() {
    let fx = Fixture::new();
    let doc = json!({"name": "weekly", "terms": ["rust", "sandbox"], "limit": 20});

    fx.sandbox
        .write_json(&fx.path("query.json"), &doc, WriteOptions::new())
        .unwrap();
    assert_eq!(fx.sandbox.read_json(&fx.path("query.json"), None).unwrap(), doc);

    let text = std::fs::read_to_string(fx.root.join("query.json")).unwrap();
    assert!(text.ends_with("}\n"), "pretty output ends with a newline");
    assert!(text.contains("\n  \"name\""));
}

#[test]
fn test_typed_round_trip() {
    let fx = Fixture::new();
    let query = SavedQuery {
        name: "daily".into(),
        terms: vec!["tokio".into()],
        limit: 5,
    };
    fx.sandbox
        .write_json(&fx.path("q/typed.json"), &query, WriteOptions::new().with_create_parents(true))
        .unwrap();

    let back: SavedQuery = fx.sandbox.read_json_as(&fx.path("q/typed.json")).unwrap();
    assert_eq!(back, query);
}

#[test]
fn test_read_json_as_reports_shape_mismatch() {
    let fx = Fixture::new();
    fx.write_file("wrong.json", br#"{"name": "x", "terms": "not-a-list", "limit": 1}"#);
    let err = fx
        .sandbox
        .read_json_as::<SavedQuery>(&fx.path("wrong.json"))
        .unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::SchemaValidationError);
}

// ============= Prototype pollution =============

#[test]
fn test_proto_key_is_rejected() {
    let fx = Fixture::new();
    fx.write_file("evil.json", br#"{"__proto__": {"isAdmin": true}}"#);
    let err = fx.sandbox.read_json(&fx.path("evil.json"), None).unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::PrototypePollutionDetected);
    assert!(err.is_security_violation());
}

#[test]
fn test_forbidden_keys_are_rejected_at_any_depth() {
    let fx = Fixture::new();
    for (name, body) in [
        ("ctor.json", r#"{"a": {"b": {"constructor": {"prototype": 1}}}}"#),
        ("proto.json", r#"[1, 2, {"x": [{"prototype": null}]}]"#),
        ("deep.json", r#"{"l1": {"l2": {"l3": {"__proto__": {}}}}}"#),
    ] {
        fx.write_file(name, body.as_bytes());
        assert_eq!(
            fx.sandbox.read_json(&fx.path(name), None).unwrap_err().kind(),
            FsErrorKind::PrototypePollutionDetected,
            "{name}"
        );
    }
}

#[test]
fn test_unicode_escaped_forbidden_key_is_rejected() {
    let fx = Fixture::new();
    fx.write_file("escaped.json", br#"{"safe": {"\u005f_proto__": {"x": 1}}}"#);
    assert_eq!(
        fx.sandbox
            .read_json(&fx.path("escaped.json"), None)
            .unwrap_err()
            .kind(),
        FsErrorKind::PrototypePollutionDetected
    );
}

#[test]
fn test_similar_keys_are_allowed() {
    let fx = Fixture::new();
    fx.write_file("fine.json", br#"{"proto": 1, "constructors": [], "my_prototype_id": 3}"#);
    assert!(fx.sandbox.read_json(&fx.path("fine.json"), None).is_ok());
}

// ============= Parse failures =============

#[test]
fn test_malformed_json_is_parse_error() {
    let fx = Fixture::new();
    for (name, body) in [
        ("trunc.json", &b"{\"a\": [1, 2"[..]),
        ("trailing.json", &b"{} {}"[..]),
        ("binary.json", &[0xff, 0xfe, b'{', b'}'][..]),
        ("empty.json", &b""[..]),
    ] {
        fx.write_file(name, body);
        assert_eq!(
            fx.sandbox.read_json(&fx.path(name), None).unwrap_err().kind(),
            FsErrorKind::JsonParseError,
            "{name}"
        );
    }
}

#[test]
fn test_read_json_respects_size_limit() {
    let fx = Fixture::with_limit(8);
    fx.write_file("big.json", br#"{"key": "value"}"#);
    assert_eq!(
        fx.sandbox.read_json(&fx.path("big.json"), None).unwrap_err().kind(),
        FsErrorKind::FileTooLarge
    );
}

// ============= Schemas =============

fn query_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "limit"],
        "properties": {
            "name": { "type": "string" },
            "limit": { "type": "integer", "minimum": 1 }
        }
    })
}

#[test]
fn test_schema_accepts_matching_document() {
    let fx = Fixture::new();
    fx.write_file("ok.json", br#"{"name": "n", "limit": 3}"#);
    let schema = JsonSchema::compile(&query_schema()).unwrap();
    assert!(fx.sandbox.read_json(&fx.path("ok.json"), Some(&schema)).is_ok());
}

#[test]
fn test_schema_rejects_mismatched_document() {
    let fx = Fixture::new();
    fx.write_file("bad.json", br#"{"name": 7, "limit": 0}"#);
    let schema = JsonSchema::compile(&query_schema()).unwrap();

    let err = fx
        .sandbox
        .read_json(&fx.path("bad.json"), Some(&schema))
        .unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::SchemaValidationError);
    assert!(!err.is_security_violation());
}

#[test]
fn test_pollution_is_reported_before_schema() {
    let fx = Fixture::new();
    fx.write_file("both.json", br#"{"__proto__": 1}"#);
    let schema = JsonSchema::compile(&query_schema()).unwrap();
    assert_eq!(
        fx.sandbox
            .read_json(&fx.path("both.json"), Some(&schema))
            .unwrap_err()
            .kind(),
        FsErrorKind::PrototypePollutionDetected
    );
}

#[test]
fn test_closure_validator() {
    let fx = Fixture::new();
    fx.write_file("list.json", b"[1, 2, 3]");
    let non_empty = |v: &Value| match v.as_array() {
        Some(items) if !items.is_empty() => Ok(()),
        _ => Err(vec!["expected a non-empty array".to_string()]),
    };
    assert!(fx.sandbox.read_json(&fx.path("list.json"), Some(&non_empty)).is_ok());

    fx.write_file("empty-list.json", b"[]");
    let err = fx
        .sandbox
        .read_json(&fx.path("empty-list.json"), Some(&non_empty))
        .unwrap_err();
    assert!(err.message().contains("expected a non-empty array"));
}

#[test]
fn test_load_schema_from_inside_root() {
    let fx = Fixture::new();
    fx.sandbox
        .write_json(&fx.path("schema.json"), &query_schema(), WriteOptions::new())
        .unwrap();
    fx.write_file("doc.json", br#"{"name": "n"}"#);

    let schema = fx.sandbox.load_schema(&fx.path("schema.json")).unwrap();
    assert_eq!(
        fx.sandbox
            .read_json(&fx.path("doc.json"), Some(&schema))
            .unwrap_err()
            .kind(),
        FsErrorKind::SchemaValidationError
    );
}

#[test]
fn test_load_schema_is_sandboxed_too() {
    let fx = Fixture::new();
    let outside = fx.outside.join("schema.json");
    std::fs::write(&outside, query_schema().to_string()).unwrap();
    assert_eq!(
        fx.sandbox.load_schema(as_str(&outside)).unwrap_err().kind(),
        FsErrorKind::PathViolation
    );
}

#[test]
fn test_invalid_schema_document() {
    let fx = Fixture::new();
    fx.write_file("broken-schema.json", br#"{"type": 42}"#);
    assert_eq!(
        fx.sandbox
            .load_schema(&fx.path("broken-schema.json"))
            .unwrap_err()
            .kind(),
        FsErrorKind::SchemaValidationError
    );
}

// ============= Serialization =============

#[test]
fn test_unserializable_value_is_serialize_error() {
    let fx = Fixture::new();
    let mut tuple_keys = HashMap::new();
    tuple_keys.insert((1, 2), "pair");

    let err = fx
        .sandbox
        .write_json(&fx.path("tuples.json"), &tuple_keys, WriteOptions::new())
        .unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::JsonSerializeError);
    assert!(!fx.root.join("tuples.json").exists());
}

#[test]
fn test_write_json_validates_before_serializing() {
    let fx = Fixture::new();
    let mut tuple_keys = HashMap::new();
    tuple_keys.insert((1, 2), "pair");
    assert_eq!(
        fx.sandbox
            .write_json("../escape.json", &tuple_keys, WriteOptions::new())
            .unwrap_err()
            .kind(),
        FsErrorKind::PathTraversal
    );
}

#[test]
fn test_write_json_enforces_size_limit() {
    let fx = Fixture::with_limit(10);
    let err = fx
        .sandbox
        .write_json(&fx.path("big.json"), &json!({"k": "a long string value"}), WriteOptions::new())
        .unwrap_err();
    assert_eq!(err.kind(), FsErrorKind::ContentTooLarge);
}
