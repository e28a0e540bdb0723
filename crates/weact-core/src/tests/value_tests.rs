use super::*;
use serde_json::json;

#[test]
fn same_distinguishes_identity_from_equality() {
    let a = Value::from(json!({"x": [1, 2]}));
    let b = Value::from(json!({"x": [1, 2]}));
    let alias = a.clone();

    assert!(a.same(&alias));
    assert!(!a.same(&b));
    assert_eq!(a, b);

    assert!(Value::from(3).same(&Value::from(3.0)));
    assert!(Value::from("s").same(&Value::from(String::from("s"))));
    assert!(!Value::Null.same(&Value::from(false)));
}

#[test]
fn object_equality_ignores_field_order() {
    let a: Value = [("a", 1), ("b", 2)].into_iter().collect();
    let b: Value = [("b", 2), ("a", 1)].into_iter().collect();
    assert_eq!(a, b);
    assert_eq!(hash_one(&a), hash_one(&b));
    assert_ne!(a, Value::from(json!({"a": 1})));
}

#[test]
fn object_mut_copies_shared_storage() {
    let original = Value::from(json!({"n": 1}));
    let mut edited = original.clone();
    edited
        .object_mut()
        .expect("object")
        .insert("n".into(), Value::from(2));

    assert_eq!(original.get("n"), Some(&Value::from(1)));
    assert_eq!(edited.get("n"), Some(&Value::from(2)));
    assert!(!original.same(&edited));
}

#[test]
fn accessors_match_kinds() {
    let value = Value::from(json!({"flag": true, "n": 4, "s": "hi", "list": [null]}));
    assert_eq!(value.kind(), "object");
    assert_eq!(value.get("flag").and_then(Value::as_bool), Some(true));
    assert_eq!(value.get("n").and_then(Value::as_i64), Some(4));
    assert_eq!(value.get("s").and_then(Value::as_str), Some("hi"));
    assert!(value.get("list").and_then(|list| list.at(0)).is_some_and(Value::is_null));
    assert_eq!(value.get("missing"), None);
    assert!(value.is_container());
    assert!(!Value::from(1.5).is_container());
    assert_eq!(Value::from(1.5).as_i64(), None);
}

#[test]
fn display_is_compact_json() {
    let value = Value::from(json!({"a": [1, 2.5, "x\"y"], "b": null, "c": {"d": false}}));
    assert_eq!(
        value.to_string(),
        r#"{"a":[1,2.5,"x\"y"],"b":null,"c":{"d":false}}"#
    );
}

#[test]
fn converts_to_and_from_serde_json() {
    let source = json!({"title": "todo", "done": false, "tags": ["a", "b"], "order": 3});
    let value = Value::from(source.clone());
    assert_eq!(serde_json::Value::from(&value), source);
    assert_eq!(serde_json::to_value(&value).unwrap(), source);
}

#[test]
fn option_and_vec_conversions() {
    assert_eq!(Value::from(None::<i32>), Value::Null);
    assert_eq!(Value::from(Some("x")), Value::from("x"));
    assert_eq!(Value::from(vec![1, 2]), Value::from(json!([1, 2])));
}

#[test]
fn display_matches_serialized_json() {
    let value = Value::from(json!({"big": 4.0e15, "huge": 1.0e17, "frac": 0.25, "neg": -3}));
    let serialized = serde_json::to_string(&value).expect("serializes");
    assert_eq!(value.to_string(), serialized);
    assert_eq!(
        Value::from(json!({"big": 4.0e15, "frac": 0.25})).to_string(),
        r#"{"big":4000000000000000,"frac":0.25}"#
    );
    assert_eq!(Value::Number(f64::NAN).to_string(), "null");
}
