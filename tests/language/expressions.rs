//! Expression evaluation against bound facts.

use trellis_foundation::{ErrorKind, Fact, Value};
use trellis_language::{Bindings, Evaluator, Expr};

fn user() -> Fact {
    Fact::new("U1", "User")
        .with_field("age", 25)
        .with_field("name", "Ada")
        .with_field("score", 7.5)
}

fn eval(expr: &Expr) -> trellis_foundation::Result<Value> {
    let fact = user();
    let bindings = Bindings::new().with_fact("u", &fact);
    Evaluator::new().evaluate(expr, &bindings)
}

#[test]
fn comparisons_promote_numbers() {
    assert_eq!(eval(&Expr::field("u", "age").ge(18)).unwrap(), Value::Bool(true));
    assert_eq!(eval(&Expr::field("u", "age").equals(25.0)).unwrap(), Value::Bool(true));
    assert_eq!(eval(&Expr::field("u", "score").lt(8)).unwrap(), Value::Bool(true));
}

#[test]
fn cross_kind_comparison_is_a_type_mismatch() {
    let err = eval(&Expr::field("u", "age").gt("old")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    let err = eval(&Expr::field("u", "name").equals(1)).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn null_equals_only_null() {
    assert_eq!(eval(&Expr::lit(Value::Null).equals(Value::Null)).unwrap(), Value::Bool(true));
    assert_eq!(eval(&Expr::field("u", "age").equals(Value::Null)).unwrap(), Value::Bool(false));
}

#[test]
fn arithmetic_keeps_ints_and_divides_to_float() {
    assert_eq!(eval(&Expr::field("u", "age").plus(5)).unwrap(), Value::Int(30));
    assert_eq!(eval(&Expr::field("u", "age").divided_by(2)).unwrap(), Value::Float(12.5));
    assert_eq!(eval(&Expr::lit(i64::MAX).plus(1)).unwrap(), Value::Int(i64::MAX));
    assert_eq!(eval(&Expr::lit("a").plus("b")).unwrap(), Value::from("ab"));
}

#[test]
fn division_by_zero_is_reported() {
    let err = eval(&Expr::field("u", "age").divided_by(0)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
    let err = eval(&Expr::field("u", "age").modulo(0)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
}

#[test]
fn logical_operators_require_booleans() {
    let ok = Expr::field("u", "age").ge(18).and(Expr::field("u", "name").equals("Ada"));
    assert_eq!(eval(&ok).unwrap(), Value::Bool(true));
    let bad = Expr::negation(Expr::field("u", "age"));
    assert!(matches!(eval(&bad).unwrap_err().kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn contains_and_membership() {
    assert_eq!(eval(&Expr::field("u", "name").contains("da")).unwrap(), Value::Bool(true));
    let tiers = Expr::list([Expr::lit("Ada"), Expr::lit(3)]);
    assert_eq!(eval(&Expr::field("u", "name").is_in(tiers)).unwrap(), Value::Bool(true));
}

#[test]
fn unbound_names_and_missing_fields() {
    let err = eval(&Expr::field("o", "amount").gt(1)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownVariable("o".to_string()));
    let err = eval(&Expr::field("u", "email").equals("x")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownField { .. }));
    let err = eval(&Expr::var("total")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownVariable("total".to_string()));
}

#[test]
fn named_values_are_visible() {
    let fact = user();
    let total = Value::Float(110.0);
    let bindings = Bindings::new().with_fact("u", &fact).with_value("total", &total);
    let expr = Expr::var("total").gt(100.0);
    assert!(Evaluator::new().test(&expr, &bindings).unwrap());
}

#[test]
fn test_all_short_circuits() {
    let fact = user();
    let bindings = Bindings::new().with_fact("u", &fact);
    let exprs = [Expr::field("u", "age").lt(18), Expr::field("u", "age").gt("old")];
    assert!(!Evaluator::new().test_all(&exprs, &bindings).unwrap());
}

#[test]
fn non_boolean_condition_is_rejected() {
    let fact = user();
    let bindings = Bindings::new().with_fact("u", &fact);
    assert!(Evaluator::new().test(&Expr::field("u", "age"), &bindings).is_err());
}
