//! Type declarations and fact validation.

use trellis_foundation::{ErrorKind, Fact, FieldKind, TypeDecl, TypeSchema, Value};

fn schema() -> TypeSchema {
    TypeSchema::new()
        .with_type(TypeDecl::new("Person").with_field("active", FieldKind::Bool))
        .with_type(
            TypeDecl::new("Order")
                .with_field("customer_id", FieldKind::String)
                .with_field("amount", FieldKind::Float),
        )
}

#[test]
fn conforming_fact_promotes_numeric_fields() {
    let schema = schema();
    let order = Fact::new("O1", "Order")
        .with_field("customer_id", "P1")
        .with_field("amount", 40);
    let stored = schema.require("Order").unwrap().conform(&order).unwrap();
    assert_eq!(stored.field("amount"), Some(&Value::Float(40.0)));
}

#[test]
fn undeclared_field_is_rejected() {
    let schema = schema();
    let fact = Fact::new("P1", "Person").with_field("age", 30);
    let err = schema.require("Person").unwrap().conform(&fact).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownField { .. }));
}

#[test]
fn mistyped_field_is_rejected() {
    let schema = schema();
    let fact = Fact::new("P1", "Person").with_field("active", "yes");
    let err = schema.require("Person").unwrap().conform(&fact).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FieldTypeMismatch { .. }));
}

#[test]
fn unknown_type_is_reported() {
    let err = schema().require("Invoice").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownType("Invoice".to_string()));
}

#[test]
fn duplicate_type_declaration_fails() {
    let mut schema = schema();
    let err = schema.declare(TypeDecl::new("Order")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateType(_)));
    assert_eq!(schema.len(), 2);
}

#[test]
fn id_always_resolves() {
    let person = Fact::new("P1", "Person");
    assert!(schema().require("Person").unwrap().resolves("id"));
    assert_eq!(person.resolve("id"), Some(Value::from("P1")));
    assert_eq!(person.resolve("active"), None);
}

#[test]
fn declared_id_field_wins_over_fact_id() {
    let fact = Fact::new("key-1", "User").with_field("id", "U1");
    assert_eq!(fact.resolve("id"), Some(Value::from("U1")));
    assert_eq!(fact.id().as_str(), "key-1");
}
