//! Value kinds, field kinds and coercion.

use trellis_foundation::{FieldKind, Value, ValueKind};

#[test]
fn values_report_their_kind() {
    assert_eq!(Value::Null.kind(), ValueKind::Null);
    assert_eq!(Value::from(true).kind(), ValueKind::Bool);
    assert_eq!(Value::from(3).kind(), ValueKind::Int);
    assert_eq!(Value::from(2.5).kind(), ValueKind::Float);
    assert_eq!(Value::from("x").kind(), ValueKind::String);
    assert_eq!(Value::from(vec![Value::from(1)]).kind(), ValueKind::List);
}

#[test]
fn numeric_accessors_promote_ints() {
    assert_eq!(Value::from(4).as_number(), Some(4.0));
    assert_eq!(Value::from(4.5).as_number(), Some(4.5));
    assert_eq!(Value::from("4").as_number(), None);
    assert!(Value::from(1).is_numeric());
    assert!(!Value::Null.is_numeric());
}

#[test]
fn float_fields_accept_and_promote_ints() {
    assert!(FieldKind::Float.accepts(&Value::from(3)));
    assert_eq!(FieldKind::Float.coerce(Value::from(3)), Some(Value::Float(3.0)));
    assert!(!FieldKind::Int.accepts(&Value::from(3.0)));
}

#[test]
fn null_is_accepted_by_every_field_kind() {
    for kind in [FieldKind::Int, FieldKind::Float, FieldKind::Bool, FieldKind::String] {
        assert!(kind.accepts(&Value::Null));
    }
}

#[test]
fn mismatched_kinds_are_rejected() {
    assert_eq!(FieldKind::Bool.coerce(Value::from("true")), None);
    assert_eq!(FieldKind::String.coerce(Value::from(1)), None);
}

#[test]
fn debug_quotes_strings_and_display_does_not() {
    let value = Value::from("U1");
    assert_eq!(format!("{value:?}"), "\"U1\"");
    assert_eq!(value.to_string(), "U1");
    assert_eq!(format!("{:?}", Value::Float(110.0)), "110.0");
    assert_eq!(Value::Null.to_string(), "null");
}
