//! Diagnostics: non-fatal problems reported while the network runs.
//!
//! Evaluation failures inside nodes never abort propagation. They are turned
//! into [`Diagnostic`]s and handed to a [`DiagnosticSink`]. The default sink,
//! [`TracingSink`], forwards everything to the `tracing` ecosystem.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Severity {
    /// Detailed internals.
    Debug,
    /// Notable but expected events.
    Info,
    /// A condition or argument failed to evaluate.
    #[default]
    Warn,
    /// A failure the host should look at.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// DiagnosticCode
// =============================================================================

/// Machine-readable diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DiagnosticCode {
    /// Operand kinds incompatible with an operator or aggregate.
    TypeMismatch,
    /// Field missing on a fact.
    UnknownField,
    /// Variable not bound in the evaluation context.
    UnknownVariable,
    /// Division or remainder by zero.
    DivisionByZero,
    /// Call of an unknown function.
    UnknownFunction,
    /// Function called with the wrong number of arguments.
    ArityMismatch,
    /// A numeric aggregate saturated.
    AggregateOverflow,
    /// A command queued by an activation listener failed.
    ListenerCommandFailed,
    /// A restored memory differs from its saved snapshot.
    RestoreMismatch,
    /// An internal invariant was violated.
    InvariantViolation,
}

impl DiagnosticCode {
    /// Returns the stable snake-case name of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TypeMismatch => "type_mismatch",
            Self::UnknownField => "unknown_field",
            Self::UnknownVariable => "unknown_variable",
            Self::DivisionByZero => "division_by_zero",
            Self::UnknownFunction => "unknown_function",
            Self::ArityMismatch => "arity_mismatch",
            Self::AggregateOverflow => "aggregate_overflow",
            Self::ListenerCommandFailed => "listener_command_failed",
            Self::RestoreMismatch => "restore_mismatch",
            Self::InvariantViolation => "invariant_violation",
        }
    }

    /// Maps an evaluation error kind to its diagnostic code.
    #[must_use]
    pub const fn for_error(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::TypeMismatch { .. } | ErrorKind::FieldTypeMismatch { .. } => {
                Self::TypeMismatch
            }
            ErrorKind::UnknownField { .. } => Self::UnknownField,
            ErrorKind::UnknownVariable(_) | ErrorKind::UnresolvedVariable { .. } => {
                Self::UnknownVariable
            }
            ErrorKind::DivisionByZero => Self::DivisionByZero,
            ErrorKind::UnknownFunction(_) => Self::UnknownFunction,
            ErrorKind::ArityMismatch { .. } => Self::ArityMismatch,
            ErrorKind::Internal(_) | ErrorKind::PoisonedSession => Self::InvariantViolation,
            _ => Self::ListenerCommandFailed,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Diagnostic
// =============================================================================

/// A single reported problem.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    /// How serious the problem is.
    pub severity: Severity,
    /// Category.
    pub code: DiagnosticCode,
    /// Human-readable description.
    pub message: String,
    /// Extra key/value detail (rule, node, fact ids).
    pub context: BTreeMap<String, String>,
}

impl Diagnostic {
    /// Creates a diagnostic with an empty context.
    #[must_use]
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Creates a warning from an evaluation error.
    #[must_use]
    pub fn from_error(severity: Severity, error: &Error) -> Self {
        let mut diagnostic = Self::new(
            severity,
            DiagnosticCode::for_error(&error.kind),
            error.to_string(),
        );
        if let Some(source) = error.context.as_ref().and_then(|c| c.source.as_ref()) {
            diagnostic = diagnostic.with("source", source);
        }
        diagnostic
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if !self.context.is_empty() {
            write!(f, " (")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Receiver for diagnostics.
pub trait DiagnosticSink: Send {
    /// Accepts one diagnostic.
    fn emit(&mut self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` at the matching level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        let Diagnostic {
            severity,
            code,
            message,
            context,
        } = diagnostic;
        let code = code.as_str();
        match severity {
            Severity::Debug => tracing::debug!(code, ?context, "{message}"),
            Severity::Info => tracing::info!(code, ?context, "{message}"),
            Severity::Warn => tracing::warn!(code, ?context, "{message}"),
            Severity::Error => tracing::error!(code, ?context, "{message}"),
        }
    }
}

/// Discards every diagnostic.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _diagnostic: Diagnostic) {}
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Shared sink, so a host can keep a handle and read what a session wrote.
impl<S: DiagnosticSink> DiagnosticSink for Arc<Mutex<S>> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(diagnostic);
    }
}
