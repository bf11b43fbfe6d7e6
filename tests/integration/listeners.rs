//! Listeners reacting to activations through the agenda.

use std::sync::{Arc, Mutex};

use trellis_engine::{Activation, ActivationListener, Agenda, InMemoryStore, Session};
use trellis_foundation::{Diagnostic, DiagnosticCode, Fact, FieldKind, Severity, TypeDecl, TypeSchema};
use trellis_language::{Expr, Rule, RuleSet};

fn schema() -> TypeSchema {
    TypeSchema::new()
        .with_type(
            TypeDecl::new("User")
                .with_field("id", FieldKind::String)
                .with_field("age", FieldKind::Int),
        )
        .with_type(TypeDecl::new("Badge").with_field("owner", FieldKind::String))
}

fn rules() -> RuleSet {
    RuleSet::new()
        .with_rule(
            Rule::new("adult")
                .pattern("u", "User")
                .when(Expr::field("u", "age").ge(18))
                .then("adult", [Expr::field("u", "id")]),
        )
        .with_rule(
            Rule::new("badged")
                .pattern("b", "Badge")
                .then("badged", [Expr::field("b", "owner")]),
        )
}

fn user(id: &str, age: i64) -> Fact {
    Fact::new(id, "User").with_field("id", id).with_field("age", age)
}

fn owner(activation: &Activation) -> String {
    activation
        .arguments
        .first()
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Issues a badge for every adult and revokes it when the user stops
/// matching.
struct Badger;

impl ActivationListener for Badger {
    fn activated(&mut self, activation: &Activation, agenda: &mut Agenda) {
        if &*activation.rule == "adult" {
            let owner = owner(activation);
            agenda.submit(Fact::new(format!("badge-{owner}"), "Badge").with_field("owner", owner));
        }
    }

    fn deactivated(&mut self, activation: &Activation, agenda: &mut Agenda) {
        if &*activation.rule == "adult" {
            agenda.retract(format!("badge-{}", owner(activation)));
        }
    }
}

/// Records every event as `+activation` or `-activation`.
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ActivationListener for Recorder {
    fn activated(&mut self, activation: &Activation, _: &mut Agenda) {
        self.events.lock().unwrap().push(format!("+{activation}"));
    }

    fn deactivated(&mut self, activation: &Activation, _: &mut Agenda) {
        self.events.lock().unwrap().push(format!("-{activation}"));
    }
}

#[test]
fn listener_commands_cascade() {
    let mut session = Session::new(schema(), &rules()).unwrap();
    session.add_listener(Badger);
    session.submit(user("U1", 30)).unwrap();
    session.submit(user("U2", 12)).unwrap();

    assert!(session.lookup("badge-U1").is_ok());
    assert!(session.lookup("badge-U2").is_err());
    assert_eq!(session.activations_for("badged").len(), 1);

    session.retract("U1").unwrap();
    assert!(session.lookup("badge-U1").is_err());
    assert!(session.activations_for("badged").is_empty());
}

#[test]
fn events_arrive_in_propagation_order() {
    let recorder = Recorder::default();
    let mut session = Session::new(schema(), &rules()).unwrap();
    session.add_listener(Badger);
    session.add_listener(recorder.clone());

    session.submit(user("U1", 30)).unwrap();
    session.retract("U1").unwrap();
    assert_eq!(
        recorder.events(),
        vec![
            r#"+adult("U1")"#.to_string(),
            r#"+badged("U1")"#.to_string(),
            r#"-adult("U1")"#.to_string(),
            r#"-badged("U1")"#.to_string(),
        ]
    );
}

#[test]
fn closures_observe_additions() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut session = Session::new(schema(), &rules()).unwrap();
    session.add_listener(move |activation: &Activation, _: &mut Agenda| {
        sink.lock().unwrap().push(activation.rule.to_string());
    });

    session.submit(user("U1", 30)).unwrap();
    session.retract("U1").unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["adult".to_string()]);
}

#[test]
fn failed_commands_become_diagnostics() {
    let diagnostics: Arc<Mutex<Vec<Diagnostic>>> = Arc::default();
    let mut session = Session::new(schema(), &rules()).unwrap();
    session.set_sink(Arc::clone(&diagnostics));
    session.add_listener(|_: &Activation, agenda: &mut Agenda| agenda.retract("nobody"));

    session.submit(user("U1", 30)).unwrap();
    let diagnostics = diagnostics.lock().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, DiagnosticCode::ListenerCommandFailed);
    assert_eq!(diagnostics[0].severity, Severity::Error);
}

#[test]
fn restore_does_not_notify() {
    let mut original = Session::new(schema(), &rules()).unwrap();
    original.submit(user("U1", 30)).unwrap();
    let mut store = InMemoryStore::new();
    original.save(&mut store).unwrap();

    let recorder = Recorder::default();
    let mut restored = Session::new(schema(), &rules()).unwrap();
    restored.add_listener(recorder.clone());
    restored.restore(&store).unwrap();
    assert_eq!(restored.activations().len(), 1);
    assert!(recorder.events().is_empty());
}
