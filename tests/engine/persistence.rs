//! Saving memories to a store and restoring a session from it.

use std::sync::{Arc, Mutex};

use trellis_engine::{InMemoryStore, MemorySnapshot, MemoryStore, Session, SessionConfig};
use trellis_foundation::{Diagnostic, DiagnosticCode, ErrorKind, Fact, FieldKind, TypeDecl, TypeSchema};
use trellis_language::{Accumulation, Expr, Rule, RuleSet};

fn schema() -> TypeSchema {
    TypeSchema::new()
        .with_type(TypeDecl::new("Person").with_field("id", FieldKind::String))
        .with_type(
            TypeDecl::new("Order")
                .with_field("customer_id", FieldKind::String)
                .with_field("amount", FieldKind::Float),
        )
}

fn rules() -> RuleSet {
    RuleSet::new()
        .with_rule(
            Rule::new("spend")
                .pattern("p", "Person")
                .accumulate(
                    Accumulation::sum("o", "Order", "amount")
                        .filter(Expr::field("o", "customer_id").equals(Expr::field("p", "id")))
                        .named("total"),
                )
                .when(Expr::var("total").gt(0))
                .then("spend", [Expr::field("p", "id"), Expr::var("total")]),
        )
        .with_rule(
            Rule::new("idle")
                .pattern("p", "Person")
                .not_matching(
                    "o",
                    "Order",
                    [Expr::field("o", "customer_id").equals(Expr::field("p", "id"))],
                )
                .then("idle", [Expr::field("p", "id")]),
        )
}

fn person(id: &str) -> Fact {
    Fact::new(id, "Person").with_field("id", id)
}

fn order(id: &str, customer: &str, amount: f64) -> Fact {
    Fact::new(id, "Order")
        .with_field("customer_id", customer)
        .with_field("amount", amount)
}

fn populated() -> Session {
    let mut session = Session::new(schema(), &rules()).unwrap();
    session.submit(person("P1")).unwrap();
    session.submit(person("P2")).unwrap();
    session.submit(order("O1", "P1", 40.0)).unwrap();
    session.submit(order("O2", "P1", 70.0)).unwrap();
    session.submit(order("O3", "P2", 5.0)).unwrap();
    session.retract("O3").unwrap();
    session
}

fn rendered(session: &Session) -> Vec<String> {
    let mut items: Vec<_> = session.activations().iter().map(ToString::to_string).collect();
    items.sort();
    items
}

#[test]
fn save_writes_every_memory() {
    let mut session = populated();
    let mut store = InMemoryStore::new();
    session.save(&mut store).unwrap();

    let root = session.network().root();
    match store.load(root).unwrap() {
        Some(MemorySnapshot::Facts(facts)) => assert_eq!(facts.len(), 4),
        other => panic!("unexpected root snapshot: {other:?}"),
    }
    let with_memory = session
        .network()
        .nodes()
        .iter()
        .filter(|node| session.network().snapshot(node.id()).is_some())
        .count();
    assert_eq!(store.len(), with_memory);
}

#[test]
fn restore_reproduces_memories() {
    let mut session = populated();
    let mut store = InMemoryStore::new();
    session.save(&mut store).unwrap();

    let mut fresh = Session::new(schema(), &rules()).unwrap();
    fresh.restore(&store).unwrap();
    assert_eq!(rendered(&fresh), rendered(&session));
    assert_eq!(
        rendered(&fresh),
        vec![r#"idle("P2")"#.to_string(), r#"spend("P1", 110.0)"#.to_string()]
    );

    for node in session.network().nodes() {
        let before = session.network().snapshot(node.id());
        let after = fresh.network().snapshot(node.id());
        match (before, after) {
            (Some(a), Some(b)) => assert!(a.same_contents(&b), "node {}", node.id()),
            (None, None) => {}
            _ => panic!("memory presence differs at {}", node.id()),
        }
    }
}

#[test]
fn restore_replaces_existing_facts() {
    let mut session = populated();
    let mut store = InMemoryStore::new();
    session.save(&mut store).unwrap();

    let mut other = Session::new(schema(), &rules()).unwrap();
    other.submit(person("P9")).unwrap();
    other.restore(&store).unwrap();
    assert!(other.lookup("P9").is_err());
    assert_eq!(other.stats().facts, 4);
}

#[test]
fn restored_session_keeps_working() {
    let mut session = populated();
    let mut store = InMemoryStore::new();
    session.save(&mut store).unwrap();

    let mut fresh = Session::new(schema(), &rules()).unwrap();
    fresh.restore(&store).unwrap();
    fresh.submit(order("O4", "P2", 3.0)).unwrap();
    assert!(fresh.activations_for("idle").is_empty());
    assert_eq!(fresh.activations_for("spend").len(), 2);
}

#[test]
fn mismatch_reports_node() {
    let mut session = populated();
    let mut store = InMemoryStore::new();
    session.save(&mut store).unwrap();
    let terminal = session.network().plan("idle").unwrap().terminal;
    store.save(terminal, &MemorySnapshot::Tokens(Vec::new())).unwrap();

    let diagnostics: Arc<Mutex<Vec<Diagnostic>>> = Arc::default();
    let mut fresh = Session::new(schema(), &rules()).unwrap();
    fresh.set_sink(Arc::clone(&diagnostics));
    let err = fresh.restore(&store).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Storage(_)));

    let diagnostics = diagnostics.lock().unwrap();
    let mismatch: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::RestoreMismatch)
        .collect();
    assert_eq!(mismatch.len(), 1);
    assert_eq!(
        mismatch[0].context.get("node").map(String::as_str),
        Some(terminal.to_string().as_str())
    );
}

#[test]
fn verification_can_be_skipped() {
    let mut session = populated();
    let mut store = InMemoryStore::new();
    session.save(&mut store).unwrap();
    let terminal = session.network().plan("idle").unwrap().terminal;
    store.save(terminal, &MemorySnapshot::Tokens(Vec::new())).unwrap();

    let config = SessionConfig::new().skip_restore_verification();
    let mut fresh = Session::with_config(schema(), &rules(), config).unwrap();
    fresh.restore(&store).unwrap();
    assert_eq!(fresh.activations_for("idle").len(), 1);
}

#[test]
fn store_contents_survive_deletion_of_other_nodes() {
    let mut session = populated();
    let mut store = InMemoryStore::new();
    session.save(&mut store).unwrap();
    let root = session.network().root();
    for id in store.list().unwrap() {
        if id != root {
            assert!(store.delete(id).unwrap());
        }
    }
    assert_eq!(store.list().unwrap(), vec![root]);

    let mut fresh = Session::new(schema(), &rules()).unwrap();
    fresh.restore(&store).unwrap();
    assert_eq!(rendered(&fresh), rendered(&session));
}
