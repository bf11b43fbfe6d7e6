//! The debug layer attached to a live session.

use std::sync::{Arc, Mutex};

use trellis_debug::{DiagnosticFormatter, DiagnosticLog, HumanFormatter, JsonFormatter, NetworkDiagram};
use trellis_engine::{Session, SessionConfig};
use trellis_foundation::{DiagnosticCode, Fact, FieldKind, Severity, TypeDecl, TypeSchema};
use trellis_language::{Expr, Rule, RuleSet};

fn schema() -> TypeSchema {
    TypeSchema::new().with_type(
        TypeDecl::new("Score")
            .with_field("points", FieldKind::Int)
            .with_field("games", FieldKind::Int),
    )
}

fn rules() -> RuleSet {
    RuleSet::new()
        .with_rule(
            Rule::new("strong")
                .pattern("s", "Score")
                .when(Expr::field("s", "points").divided_by(Expr::field("s", "games")).gt(10))
                .then("strong", [Expr::field("s", "id")]),
        )
        .with_rule(
            Rule::new("played")
                .pattern("s", "Score")
                .when(Expr::field("s", "games").gt(0))
                .then("played", [Expr::field("s", "id")]),
        )
}

fn score(id: &str, points: i64, games: i64) -> Fact {
    Fact::new(id, "Score")
        .with_field("points", points)
        .with_field("games", games)
}

fn logged_session(config: SessionConfig) -> (Session, Arc<Mutex<DiagnosticLog>>) {
    let log = Arc::new(Mutex::new(DiagnosticLog::new(16)));
    let mut session = Session::with_config(schema(), &rules(), config).unwrap();
    session.set_sink(Arc::clone(&log));
    (session, log)
}

#[test]
fn log_collects_evaluation_failures() {
    let (mut session, log) = logged_session(SessionConfig::new());
    session.submit(score("S1", 50, 2)).unwrap();
    session.submit(score("S2", 50, 0)).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log.by_code(DiagnosticCode::DivisionByZero).len(), 1);
    assert_eq!(log.for_rule("strong").len(), 1);
    assert!(log.for_rule("played").is_empty());
    assert_eq!(session.activations().len(), 2);
    assert_eq!(session.counters().diagnostics_emitted, 1);
}

#[test]
fn severity_filter_applies_before_the_log() {
    let (mut session, log) = logged_session(SessionConfig::new().min_severity(Severity::Error));
    session.submit(score("S1", 50, 0)).unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn log_evicts_old_failures() {
    let (mut session, log) = logged_session(SessionConfig::new());
    for i in 0..20 {
        session.submit(score(&format!("S{i}"), 1, 0)).unwrap();
    }
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 16);
    let stats = log.stats();
    assert_eq!(stats.dropped, 4);
    assert_eq!(stats.by_severity.get(&Severity::Warn), Some(&16));
}

#[test]
fn formatters_render_session_output() {
    let (mut session, log) = logged_session(SessionConfig::new());
    session.submit(score("S1", 50, 0)).unwrap();
    session.submit(score("S2", 50, 2)).unwrap();

    let log = log.lock().unwrap();
    let records = log.recent(1);
    let human = HumanFormatter::new().with_context().format_many(&records);
    assert!(human.starts_with("WARN  division_by_zero: "));
    assert!(human.contains("rules=strong"));

    let json = JsonFormatter::new().format_many(&records);
    assert!(json.contains(r#""code":"division_by_zero""#));

    let activation = session.activations_for("strong").remove(0);
    assert_eq!(
        HumanFormatter::new().format_activation(&activation),
        r#"strong("S2") <- strong [S2]"#
    );
}

#[test]
fn diagram_reflects_memory() {
    let (mut session, _log) = logged_session(SessionConfig::new());
    session.submit(score("S1", 50, 2)).unwrap();
    let text = NetworkDiagram::new()
        .with_memory()
        .with_rules()
        .render(session.network());
    assert!(text.contains("type Score"));
    assert!(text.contains("[played, strong]") || text.contains("[strong, played]"));
    assert_eq!(text.matches("terminal").count(), 2);
    assert!(text.contains("(L1 R0)"));
}
