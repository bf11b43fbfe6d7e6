//! Accumulation semantics: empty inputs, recomputation, filters, overflow.

use std::sync::{Arc, Mutex};

use trellis_engine::Session;
use trellis_foundation::{Diagnostic, DiagnosticCode, Fact, FieldKind, Severity, TypeDecl, TypeSchema, Value};
use trellis_language::{Accumulation, Expr, Rule, RuleSet};

fn schema() -> TypeSchema {
    TypeSchema::new()
        .with_type(TypeDecl::new("Person").with_field("id", FieldKind::String))
        .with_type(
            TypeDecl::new("Order")
                .with_field("customer_id", FieldKind::String)
                .with_field("amount", FieldKind::Float)
                .with_field("sku", FieldKind::String),
        )
}

fn order(id: &str, customer: &str, amount: f64) -> Fact {
    Fact::new(id, "Order")
        .with_field("customer_id", customer)
        .with_field("amount", amount)
}

fn report(accumulation: Accumulation) -> RuleSet {
    let name = Arc::clone(&accumulation.name);
    RuleSet::new().with_rule(
        Rule::new("report")
            .accumulate(accumulation)
            .then("report", [Expr::var(name)]),
    )
}

fn arguments(session: &Session) -> Vec<Value> {
    session
        .activations()
        .into_iter()
        .flat_map(|a| a.arguments)
        .collect()
}

#[test]
fn empty_input_sentinels() {
    let sum = Session::new(schema(), &report(Accumulation::sum("o", "Order", "amount"))).unwrap();
    assert_eq!(arguments(&sum), vec![Value::Float(0.0)]);

    let count = Session::new(schema(), &report(Accumulation::count("o", "Order"))).unwrap();
    assert_eq!(arguments(&count), vec![Value::Int(0)]);

    let avg = Session::new(schema(), &report(Accumulation::avg("o", "Order", "amount"))).unwrap();
    assert_eq!(arguments(&avg), vec![Value::Null]);

    let min = Session::new(schema(), &report(Accumulation::min("o", "Order", "amount"))).unwrap();
    assert!(min.activations().is_empty());
}

#[test]
fn every_change_replaces_the_aggregate_token() {
    let mut session =
        Session::new(schema(), &report(Accumulation::avg("o", "Order", "amount"))).unwrap();
    session.submit(order("O1", "P1", 10.0)).unwrap();
    session.submit(order("O2", "P1", 30.0)).unwrap();
    assert_eq!(arguments(&session), vec![Value::Float(20.0)]);
    session.retract("O1").unwrap();
    assert_eq!(arguments(&session), vec![Value::Float(30.0)]);
    assert_eq!(session.activations().len(), 1);
}

#[test]
fn max_over_strings() {
    let mut session =
        Session::new(schema(), &report(Accumulation::max("o", "Order", "sku"))).unwrap();
    session
        .submit(Fact::new("O1", "Order").with_field("sku", "apple"))
        .unwrap();
    session
        .submit(Fact::new("O2", "Order").with_field("sku", "pear"))
        .unwrap();
    assert_eq!(arguments(&session), vec![Value::from("pear")]);
    session.retract("O2").unwrap();
    assert_eq!(arguments(&session), vec![Value::from("apple")]);
    session.retract("O1").unwrap();
    assert!(session.activations().is_empty());
}

#[test]
fn filtered_aggregate_per_left_token() {
    let rules = RuleSet::new().with_rule(
        Rule::new("spend")
            .pattern("p", "Person")
            .accumulate(
                Accumulation::sum("o", "Order", "amount")
                    .named("total")
                    .filter(Expr::field("o", "customer_id").equals(Expr::field("p", "id"))),
            )
            .then("spend", [Expr::field("p", "id"), Expr::var("total")]),
    );
    let mut session = Session::new(schema(), &rules).unwrap();
    session.submit(Fact::new("P1", "Person").with_field("id", "P1")).unwrap();
    session.submit(Fact::new("P2", "Person").with_field("id", "P2")).unwrap();
    session.submit(order("O1", "P1", 5.0)).unwrap();
    session.submit(order("O2", "P1", 7.5)).unwrap();
    session.submit(order("O3", "P2", 1.0)).unwrap();

    let mut rendered: Vec<_> = session.activations().iter().map(ToString::to_string).collect();
    rendered.sort();
    assert_eq!(rendered, vec![r#"spend("P1", 12.5)"#, r#"spend("P2", 1.0)"#]);
}

#[test]
fn saturated_sum_is_reported() {
    let log = Arc::new(Mutex::new(Vec::<Diagnostic>::new()));
    let mut session =
        Session::new(schema(), &report(Accumulation::sum("o", "Order", "amount"))).unwrap();
    session.set_sink(Arc::clone(&log));
    session.submit(order("O1", "P1", f64::MAX)).unwrap();
    session.submit(order("O2", "P1", f64::MAX)).unwrap();

    assert_eq!(arguments(&session), vec![Value::Float(f64::MAX)]);
    let log = log.lock().unwrap();
    let overflow: Vec<_> = log
        .iter()
        .filter(|d| d.code == DiagnosticCode::AggregateOverflow)
        .collect();
    assert_eq!(overflow.len(), 1);
    assert_eq!(overflow[0].severity, Severity::Error);
}

#[test]
fn aggregate_guard_between_joins() {
    let rules = RuleSet::new().with_rule(
        Rule::new("vip")
            .pattern("p", "Person")
            .accumulate(
                Accumulation::count("o", "Order")
                    .named("orders")
                    .filter(Expr::field("o", "customer_id").equals(Expr::field("p", "id"))),
            )
            .when(Expr::var("orders").ge(2))
            .then("vip", [Expr::field("p", "id"), Expr::var("orders")]),
    );
    let mut session = Session::new(schema(), &rules).unwrap();
    session.submit(Fact::new("P1", "Person").with_field("id", "P1")).unwrap();
    session.submit(order("O1", "P1", 1.0)).unwrap();
    assert!(session.activations().is_empty());
    session.submit(order("O2", "P1", 1.0)).unwrap();
    let rendered: Vec<_> = session.activations().iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec![r#"vip("P1", 2)"#]);
}
