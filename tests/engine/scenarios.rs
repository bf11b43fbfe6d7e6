//! End-to-end seed scenarios.

use std::collections::BTreeSet;

use trellis_engine::Session;
use trellis_foundation::{Fact, FieldKind, TypeDecl, TypeSchema};
use trellis_language::{Accumulation, Expr, Rule, RuleSet};

fn rendered(session: &Session) -> BTreeSet<String> {
    session.activations().iter().map(ToString::to_string).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn person(id: &str) -> Fact {
    Fact::new(id, "Person").with_field("id", id)
}

fn order(id: &str, customer: &str) -> Fact {
    Fact::new(id, "Order")
        .with_field("id", id)
        .with_field("customer_id", customer)
}

fn people_and_orders() -> TypeSchema {
    TypeSchema::new()
        .with_type(TypeDecl::new("Person").with_field("id", FieldKind::String))
        .with_type(
            TypeDecl::new("Order")
                .with_field("id", FieldKind::String)
                .with_field("customer_id", FieldKind::String),
        )
}

fn link_rule() -> Rule {
    Rule::new("link")
        .pattern("p", "Person")
        .pattern("o", "Order")
        .when(Expr::field("p", "id").equals(Expr::field("o", "customer_id")))
        .then("link", [Expr::field("p", "id"), Expr::field("o", "id")])
}

fn linked_session() -> Session {
    let mut session = Session::new(people_and_orders(), &RuleSet::new().with_rule(link_rule()))
        .unwrap();
    session.submit(person("P1")).unwrap();
    session.submit(person("P2")).unwrap();
    session.submit(order("O1", "P1")).unwrap();
    session.submit(order("O2", "P2")).unwrap();
    session.submit(order("O3", "P1")).unwrap();
    session
}

// =============================================================================
// Alpha
// =============================================================================

#[test]
fn simple_alpha_filter() {
    let schema = TypeSchema::new().with_type(
        TypeDecl::new("User")
            .with_field("id", FieldKind::String)
            .with_field("age", FieldKind::Int),
    );
    let rules = RuleSet::new().with_rule(
        Rule::new("adult")
            .pattern("u", "User")
            .when(Expr::field("u", "age").ge(18))
            .then("adult", [Expr::field("u", "id")]),
    );
    let mut session = Session::new(schema, &rules).unwrap();
    session
        .submit(Fact::new("U1", "User").with_field("id", "U1").with_field("age", 25))
        .unwrap();
    session
        .submit(Fact::new("U2", "User").with_field("id", "U2").with_field("age", 10))
        .unwrap();
    assert_eq!(rendered(&session), set(&[r#"adult("U1")"#]));
}

// =============================================================================
// Joins
// =============================================================================

#[test]
fn binary_join() {
    let session = linked_session();
    assert_eq!(
        rendered(&session),
        set(&[r#"link("P1", "O1")"#, r#"link("P1", "O3")"#, r#"link("P2", "O2")"#])
    );
    assert_eq!(session.activations().len(), 3);
}

#[test]
fn incremental_retract() {
    let mut session = linked_session();
    session.retract("O1").unwrap();
    assert_eq!(
        rendered(&session),
        set(&[r#"link("P1", "O3")"#, r#"link("P2", "O2")"#])
    );
}

#[test]
fn join_order_of_assertion_does_not_matter() {
    let mut session = Session::new(people_and_orders(), &RuleSet::new().with_rule(link_rule()))
        .unwrap();
    session.submit(order("O1", "P1")).unwrap();
    session.submit(order("O3", "P1")).unwrap();
    session.submit(person("P1")).unwrap();
    session.submit(order("O2", "P2")).unwrap();
    session.submit(person("P2")).unwrap();
    assert_eq!(rendered(&session), rendered(&linked_session()));
}

// =============================================================================
// Negation and Existence
// =============================================================================

#[test]
fn negation() {
    let schema = TypeSchema::new().with_type(
        TypeDecl::new("Person")
            .with_field("id", FieldKind::String)
            .with_field("active", FieldKind::Bool),
    );
    let rules = RuleSet::new().with_rule(
        Rule::new("alive")
            .pattern("p", "Person")
            .not([Expr::field("p", "active").equals(false)])
            .then("alive", [Expr::field("p", "id")]),
    );
    let mut session = Session::new(schema, &rules).unwrap();
    session
        .submit(Fact::new("P1", "Person").with_field("id", "P1").with_field("active", true))
        .unwrap();
    session
        .submit(Fact::new("P2", "Person").with_field("id", "P2").with_field("active", false))
        .unwrap();
    assert_eq!(rendered(&session), set(&[r#"alive("P1")"#]));
}

#[test]
fn existence() {
    let rules = RuleSet::new().with_rule(
        Rule::new("has_orders")
            .pattern("p", "Person")
            .exists_matching(
                "o",
                "Order",
                [Expr::field("o", "customer_id").equals(Expr::field("p", "id"))],
            )
            .then("has_orders", [Expr::field("p", "id")]),
    );
    let mut session = Session::new(people_and_orders(), &rules).unwrap();
    session.submit(person("P1")).unwrap();
    session.submit(person("P2")).unwrap();
    session.submit(order("O1", "P1")).unwrap();
    assert_eq!(rendered(&session), set(&[r#"has_orders("P1")"#]));

    session.submit(order("O2", "P2")).unwrap();
    assert_eq!(
        rendered(&session),
        set(&[r#"has_orders("P1")"#, r#"has_orders("P2")"#])
    );

    session.retract("O1").unwrap();
    assert_eq!(rendered(&session), set(&[r#"has_orders("P2")"#]));
}

#[test]
fn existence_fires_once_per_token() {
    let rules = RuleSet::new().with_rule(
        Rule::new("has_orders")
            .pattern("p", "Person")
            .exists_matching(
                "o",
                "Order",
                [Expr::field("o", "customer_id").equals(Expr::field("p", "id"))],
            )
            .then("has_orders", [Expr::field("p", "id")]),
    );
    let mut session = Session::new(people_and_orders(), &rules).unwrap();
    session.submit(person("P1")).unwrap();
    session.submit(order("O1", "P1")).unwrap();
    session.submit(order("O2", "P1")).unwrap();
    assert_eq!(session.activations().len(), 1);
    session.retract("O1").unwrap();
    assert_eq!(session.activations().len(), 1);
    session.retract("O2").unwrap();
    assert!(session.activations().is_empty());
}

#[test]
fn negated_pattern_with_variable() {
    let rules = RuleSet::new().with_rule(
        Rule::new("idle")
            .pattern("p", "Person")
            .not_matching(
                "o",
                "Order",
                [Expr::field("o", "customer_id").equals(Expr::field("p", "id"))],
            )
            .then("idle", [Expr::field("p", "id")]),
    );
    let mut session = Session::new(people_and_orders(), &rules).unwrap();
    session.submit(person("P1")).unwrap();
    assert_eq!(rendered(&session), set(&[r#"idle("P1")"#]));
    session.submit(order("O1", "P1")).unwrap();
    assert!(session.activations().is_empty());
    session.retract("O1").unwrap();
    assert_eq!(rendered(&session), set(&[r#"idle("P1")"#]));
}

// =============================================================================
// Aggregation
// =============================================================================

#[test]
fn aggregation() {
    let schema = TypeSchema::new().with_type(
        TypeDecl::new("Order")
            .with_field("id", FieldKind::String)
            .with_field("amount", FieldKind::Float),
    );
    let total = "SUM(o.amount)";
    let rules = RuleSet::new().with_rule(
        Rule::new("big_total")
            .accumulate(Accumulation::sum("o", "Order", "amount"))
            .when(Expr::var(total).gt(100.0))
            .then("big_total", [Expr::var(total)]),
    );
    let mut session = Session::new(schema, &rules).unwrap();
    session
        .submit(Fact::new("O1", "Order").with_field("id", "O1").with_field("amount", 40.0))
        .unwrap();
    assert!(session.activations().is_empty());
    session
        .submit(Fact::new("O2", "Order").with_field("id", "O2").with_field("amount", 70.0))
        .unwrap();
    assert_eq!(rendered(&session), set(&["big_total(110.0)"]));

    session.retract("O2").unwrap();
    assert!(session.activations().is_empty());
}

// =============================================================================
// Rules Without Patterns
// =============================================================================

#[test]
fn rule_without_patterns_fires_immediately() {
    let rules = RuleSet::new().with_rule(Rule::new("boot"));
    let mut session = Session::new(people_and_orders(), &rules).unwrap();
    assert_eq!(rendered(&session), set(&["boot()"]));
    session.submit(person("P1")).unwrap();
    assert_eq!(session.activations().len(), 1);
    session.reset();
    assert_eq!(rendered(&session), set(&["boot()"]));
}
