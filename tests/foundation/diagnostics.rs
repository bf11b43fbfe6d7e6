//! Diagnostics and sinks.

use std::sync::{Arc, Mutex};

use trellis_foundation::{
    Diagnostic, DiagnosticCode, DiagnosticSink, Error, ErrorKind, NullSink, Severity, TracingSink,
};

#[test]
fn severity_is_ordered() {
    assert!(Severity::Debug < Severity::Info);
    assert!(Severity::Info < Severity::Warn);
    assert!(Severity::Warn < Severity::Error);
}

#[test]
fn diagnostic_from_error_maps_the_code() {
    let err = Error::new(ErrorKind::DivisionByZero).in_source("rule ratio");
    let diagnostic = Diagnostic::from_error(Severity::Warn, &err);
    assert_eq!(diagnostic.code, DiagnosticCode::DivisionByZero);
    assert_eq!(diagnostic.context.get("source").map(String::as_str), Some("rule ratio"));
}

#[test]
fn display_includes_context() {
    let diagnostic = Diagnostic::new(Severity::Error, DiagnosticCode::RestoreMismatch, "differs")
        .with("node", "#3");
    assert_eq!(diagnostic.to_string(), "[error] restore_mismatch: differs (node=#3)");
}

#[test]
fn shared_vec_sink_collects() {
    let shared = Arc::new(Mutex::new(Vec::new()));
    let mut sink = Arc::clone(&shared);
    sink.emit(Diagnostic::new(Severity::Warn, DiagnosticCode::TypeMismatch, "a"));
    sink.emit(Diagnostic::new(Severity::Info, DiagnosticCode::UnknownField, "b"));
    assert_eq!(shared.lock().unwrap().len(), 2);
}

#[test]
fn tracing_and_null_sinks_accept_everything() {
    let mut tracing_sink = TracingSink;
    let mut null_sink = NullSink;
    for severity in [Severity::Debug, Severity::Info, Severity::Warn, Severity::Error] {
        let diagnostic = Diagnostic::new(severity, DiagnosticCode::InvariantViolation, "x");
        tracing_sink.emit(diagnostic.clone());
        null_sink.emit(diagnostic);
    }
}
