//! Built-in functions called through expressions.

use trellis_foundation::{ErrorKind, Value};
use trellis_language::{Bindings, Evaluator, Expr, FunctionTable};

fn call(name: &str, args: impl IntoIterator<Item = Expr>) -> trellis_foundation::Result<Value> {
    Evaluator::new().evaluate(&Expr::call(name, args), &Bindings::new())
}

#[test]
fn string_functions() {
    assert_eq!(call("LENGTH", [Expr::lit("trellis")]).unwrap(), Value::Int(7));
    assert_eq!(call("UPPER", [Expr::lit("abc")]).unwrap(), Value::from("ABC"));
    assert_eq!(call("LOWER", [Expr::lit("ABC")]).unwrap(), Value::from("abc"));
    assert_eq!(call("TRIM", [Expr::lit("  x ")]).unwrap(), Value::from("x"));
    assert_eq!(
        call("SUBSTRING", [Expr::lit("trellis"), Expr::lit(0), Expr::lit(4)]).unwrap(),
        Value::from("trel")
    );
}

#[test]
fn math_functions() {
    assert_eq!(call("ABS", [Expr::lit(-3)]).unwrap(), Value::Int(3));
    assert_eq!(call("ROUND", [Expr::lit(2.5)]).unwrap(), Value::Float(3.0));
    assert_eq!(call("FLOOR", [Expr::lit(2.7)]).unwrap(), Value::Float(2.0));
    assert_eq!(call("CEIL", [Expr::lit(2.1)]).unwrap(), Value::Float(3.0));
    assert_eq!(
        call("MAX", [Expr::lit(1), Expr::lit(4), Expr::lit(2)]).unwrap(),
        Value::Int(4)
    );
    assert_eq!(call("MIN", [Expr::lit(1.5), Expr::lit(4)]).unwrap(), Value::Float(1.5));
}

#[test]
fn unknown_function_and_arity() {
    let err = call("NOPE", []).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownFunction("NOPE".to_string()));
    let err = call("UPPER", []).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArityMismatch { .. }));
}

#[test]
fn wrong_argument_kind() {
    let err = call("UPPER", [Expr::lit(3)]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn builtin_table_lists_every_function() {
    let table = FunctionTable::builtins();
    for name in [
        "LENGTH", "UPPER", "LOWER", "TRIM", "SUBSTRING", "ABS", "ROUND", "FLOOR", "CEIL", "MIN",
        "MAX",
    ] {
        assert!(table.contains(name), "missing {name}");
    }
}
