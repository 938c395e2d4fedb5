use super::*;

#[test]
fn numeric_kinds_compare_after_widening() {
    assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
    assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
    assert!(!Value::Int(3).loose_eq(&Value::Text("3".to_string())));
}

#[test]
fn compare_rejects_mismatched_kinds_and_null() {
    assert_eq!(Value::Text("a".into()).compare(&Value::Int(1)), None);
    assert_eq!(Value::Null.compare(&Value::Null), None);
    assert!(Value::Null.loose_eq(&Value::Null));
}

#[test]
fn record_fields_are_addressable_by_name() {
    let value = Value::record([("age", Value::Int(40)), ("name", Value::from("ann"))]);

    assert_eq!(value.field("age"), Some(&Value::Int(40)));
    assert_eq!(value.field("missing"), None);
    assert_eq!(value.kind(), ValueKind::Record);
}

#[test]
fn display_quotes_text_and_renders_collections() {
    let value = Value::from(vec![Value::Int(1), Value::from("x"), Value::Null]);
    assert_eq!(value.to_string(), r#"[1, "x", null]"#);

    let record = Value::record([("a", Value::Bool(true))]);
    assert_eq!(record.to_string(), "{ a: true }");
}

#[test]
fn option_maps_none_to_null() {
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some(7i64)), Value::Int(7));
}
