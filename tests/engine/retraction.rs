//! Retraction cascades and fact lifecycle.

use std::collections::BTreeSet;

use trellis_engine::{Session, SessionState};
use trellis_foundation::{ErrorKind, Fact, FieldKind, TypeDecl, TypeSchema};
use trellis_language::{Expr, Rule, RuleSet};

fn schema() -> TypeSchema {
    TypeSchema::new()
        .with_type(TypeDecl::new("Person").with_field("id", FieldKind::String))
        .with_type(
            TypeDecl::new("Order")
                .with_field("id", FieldKind::String)
                .with_field("customer_id", FieldKind::String),
        )
        .with_type(
            TypeDecl::new("Item")
                .with_field("order_id", FieldKind::String)
                .with_field("sku", FieldKind::String),
        )
}

fn person(id: &str) -> Fact {
    Fact::new(id, "Person").with_field("id", id)
}

fn order(id: &str, customer: &str) -> Fact {
    Fact::new(id, "Order")
        .with_field("id", id)
        .with_field("customer_id", customer)
}

fn item(id: &str, order: &str, sku: &str) -> Fact {
    Fact::new(id, "Item")
        .with_field("order_id", order)
        .with_field("sku", sku)
}

fn link() -> Rule {
    Rule::new("link")
        .pattern("p", "Person")
        .pattern("o", "Order")
        .when(Expr::field("p", "id").equals(Expr::field("o", "customer_id")))
        .then("link", [Expr::field("p", "id"), Expr::field("o", "id")])
}

fn lonely() -> Rule {
    Rule::new("lonely")
        .pattern("p", "Person")
        .not_matching(
            "o",
            "Order",
            [Expr::field("o", "customer_id").equals(Expr::field("p", "id"))],
        )
        .then("lonely", [Expr::field("p", "id")])
}

fn shipped() -> Rule {
    Rule::new("shipped")
        .pattern("p", "Person")
        .pattern("o", "Order")
        .pattern("i", "Item")
        .when(Expr::field("p", "id").equals(Expr::field("o", "customer_id")))
        .when(Expr::field("i", "order_id").equals(Expr::field("o", "id")))
        .then("shipped", [Expr::field("p", "id"), Expr::field("i", "sku")])
}

fn session(rules: Vec<Rule>) -> Session {
    let mut set = RuleSet::new();
    for rule in rules {
        set = set.with_rule(rule);
    }
    Session::new(schema(), &set).unwrap()
}

fn rendered(session: &Session) -> BTreeSet<String> {
    session.activations().iter().map(ToString::to_string).collect()
}

#[test]
fn unknown_fact_is_not_found() {
    let mut session = session(vec![link()]);
    let err = session.retract("ghost").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound("ghost".to_string()));
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn retracting_twice_fails_the_second_time() {
    let mut session = session(vec![link()]);
    session.submit(person("P1")).unwrap();
    let fact = session.retract("P1").unwrap();
    assert_eq!(fact.id().as_str(), "P1");
    assert!(session.retract("P1").is_err());
    assert!(session.lookup("P1").is_err());
}

#[test]
fn duplicate_ids_are_rejected_until_retracted() {
    let mut session = session(vec![link()]);
    session.submit(person("P1")).unwrap();
    let err = session.submit(person("P1")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateId("P1".to_string()));

    session.retract("P1").unwrap();
    session.submit(person("P1")).unwrap();
    assert_eq!(session.stats().facts, 1);
}

#[test]
fn left_retraction_removes_every_descendant() {
    let mut session = session(vec![link()]);
    session.submit(person("P1")).unwrap();
    session.submit(order("O1", "P1")).unwrap();
    session.submit(order("O2", "P1")).unwrap();
    assert_eq!(session.activations().len(), 2);

    session.retract("P1").unwrap();
    assert!(session.activations().is_empty());

    session.submit(person("P1")).unwrap();
    assert_eq!(session.activations().len(), 2);
}

#[test]
fn middle_of_three_way_join() {
    let mut session = session(vec![shipped()]);
    session.submit(person("P1")).unwrap();
    session.submit(order("O1", "P1")).unwrap();
    session.submit(item("I1", "O1", "lamp")).unwrap();
    session.submit(item("I2", "O1", "desk")).unwrap();
    assert_eq!(
        rendered(&session),
        [r#"shipped("P1", "desk")"#, r#"shipped("P1", "lamp")"#]
            .iter()
            .map(|s| (*s).to_string())
            .collect()
    );

    session.retract("O1").unwrap();
    assert!(session.activations().is_empty());

    session.submit(order("O1", "P1")).unwrap();
    assert_eq!(session.activations().len(), 2);
}

#[test]
fn negation_reenables_on_retraction() {
    let mut session = session(vec![lonely()]);
    session.submit(person("P1")).unwrap();
    assert_eq!(session.activations_for("lonely").len(), 1);

    session.submit(order("O1", "P1")).unwrap();
    session.submit(order("O2", "P1")).unwrap();
    assert!(session.activations_for("lonely").is_empty());

    session.retract("O1").unwrap();
    assert!(session.activations_for("lonely").is_empty());

    session.retract("O2").unwrap();
    assert_eq!(session.activations_for("lonely").len(), 1);
}

#[test]
fn tokens_return_to_baseline() {
    let mut session = session(vec![link(), lonely(), shipped()]);
    let baseline = session.stats();

    session.submit(person("P1")).unwrap();
    session.submit(order("O1", "P1")).unwrap();
    session.submit(item("I1", "O1", "lamp")).unwrap();
    for id in ["I1", "O1", "P1"] {
        session.retract(id).unwrap();
    }

    let after = session.stats();
    assert_eq!(after.tokens, baseline.tokens);
    assert_eq!(after.left_entries, baseline.left_entries);
    assert_eq!(after.right_entries, baseline.right_entries);
    assert!(session.activations().is_empty());
}

#[test]
fn counters_track_lifecycle() {
    let mut session = session(vec![link()]);
    session.submit(person("P1")).unwrap();
    session.submit(order("O1", "P1")).unwrap();
    session.retract("O1").unwrap();

    let counters = session.counters();
    assert_eq!(counters.facts_submitted, 2);
    assert_eq!(counters.facts_retracted, 1);
    assert_eq!(counters.activations_added, 1);
    assert_eq!(counters.activations_removed, 1);
    assert!(counters.tokens_removed >= 1);
}

#[test]
fn retraction_restores_the_ordered_activation_list() {
    let seen = Rule::new("seen")
        .pattern("p", "Person")
        .then("seen", [Expr::field("p", "id")]);
    let mut session = session(vec![seen, lonely()]);
    session.submit(person("P1")).unwrap();
    session.submit(person("P2")).unwrap();
    let ordered = |session: &Session| -> Vec<String> {
        session.activations().iter().map(ToString::to_string).collect()
    };
    let before = ordered(&session);
    assert_eq!(
        before,
        vec![r#"seen("P1")"#, r#"lonely("P1")"#, r#"seen("P2")"#, r#"lonely("P2")"#]
    );

    session.submit(order("O1", "P1")).unwrap();
    session.retract("O1").unwrap();
    assert_eq!(ordered(&session), before);
    assert_eq!(session.activations_for("lonely")[0].facts[0].as_str(), "P1");
}
