//! Error construction and display.

use trellis_foundation::{Error, ErrorContext, ErrorKind, FieldKind, SemanticLimit, ValueKind};

#[test]
fn constructors_set_the_kind() {
    assert_eq!(
        Error::duplicate_id("U1").kind,
        ErrorKind::DuplicateId("U1".to_string())
    );
    assert_eq!(Error::not_found("U9").kind, ErrorKind::NotFound("U9".to_string()));
    assert!(matches!(
        Error::unresolved_variable("r1", "o").kind,
        ErrorKind::UnresolvedVariable { .. }
    ));
}

#[test]
fn messages_name_the_subject() {
    let err = Error::unknown_field("Order", "total");
    let msg = err.to_string();
    assert!(msg.contains("Order"));
    assert!(msg.contains("total"));

    let err = Error::type_mismatch(">", ValueKind::Int, ValueKind::String);
    assert!(err.to_string().contains('>'));

    let err = Error::field_type_mismatch("User", "age", FieldKind::Int, ValueKind::Bool);
    assert!(err.to_string().contains("User.age"));
}

#[test]
fn context_is_attached() {
    let err = Error::unknown_type("Ghost").with_context(
        ErrorContext::new()
            .with_source("rule haunted")
            .with_frame("pattern g"),
    );
    let ctx = err.context.unwrap();
    assert_eq!(ctx.source.as_deref(), Some("rule haunted"));
    assert_eq!(ctx.stack, vec!["pattern g".to_string()]);
}

#[test]
fn only_internal_errors_poison() {
    assert!(Error::internal("token store out of sync").is_fatal());
    assert!(!Error::storage("disk full").is_fatal());
    assert!(!Error::new(ErrorKind::PoisonedSession).is_fatal());
    assert!(
        !Error::limit_exceeded(SemanticLimit::MaxAgendaCommands { limit: 1, rule: None })
            .is_fatal()
    );
}
