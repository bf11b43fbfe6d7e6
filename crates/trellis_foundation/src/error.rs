//! Error types for the Trellis rule engine.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::types::{FieldKind, ValueKind};

/// The main error type for Trellis operations.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Attaches a source (rule or node name), creating a context if needed.
    #[must_use]
    pub fn in_source(mut self, source: impl Into<String>) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_source(source));
        self
    }

    /// Creates an unknown type error.
    #[must_use]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownType(name.into()))
    }

    /// Creates a field type mismatch error.
    #[must_use]
    pub fn field_type_mismatch(
        type_name: impl Into<String>,
        field: impl Into<String>,
        expected: FieldKind,
        actual: ValueKind,
    ) -> Self {
        Self::new(ErrorKind::FieldTypeMismatch {
            type_name: type_name.into(),
            field: field.into(),
            expected,
            actual,
        })
    }

    /// Creates an unresolved variable error.
    #[must_use]
    pub fn unresolved_variable(rule: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedVariable {
            rule: rule.into(),
            variable: variable.into(),
        })
    }

    /// Creates a duplicate fact id error.
    #[must_use]
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateId(id.into()))
    }

    /// Creates a fact not found error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound(id.into()))
    }

    /// Creates an unknown field error.
    #[must_use]
    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownField {
            type_name: type_name.into(),
            field: field.into(),
        })
    }

    /// Creates a runtime type mismatch error.
    #[must_use]
    pub fn type_mismatch(operation: impl Into<String>, lhs: ValueKind, rhs: ValueKind) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            operation: operation.into(),
            lhs,
            rhs,
        })
    }

    /// Creates an unknown variable error.
    #[must_use]
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownVariable(name.into()))
    }

    /// Creates an arity mismatch error.
    #[must_use]
    pub fn arity_mismatch(function: impl Into<String>, expected: impl Into<String>, actual: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch {
            function: function.into(),
            expected: expected.into(),
            actual,
        })
    }

    /// Creates an internal invariant violation error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Creates a storage backend error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage(message.into()))
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Returns true for errors that must poison a session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal(_))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // =========================================================================
    // Schema errors (build time)
    // =========================================================================
    /// A rule, fact, or declaration names a type that was never declared.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A value does not match the declared kind of its field.
    #[error("field type mismatch: {type_name}.{field} expects {expected}, got {actual}")]
    FieldTypeMismatch {
        /// The declared type.
        type_name: String,
        /// The offending field.
        field: String,
        /// The declared field kind.
        expected: FieldKind,
        /// The kind of the supplied value.
        actual: ValueKind,
    },

    /// A condition references a variable that is not bound at its position.
    #[error("unresolved variable `{variable}` in rule {rule}")]
    UnresolvedVariable {
        /// The rule being compiled.
        rule: String,
        /// The variable that could not be resolved.
        variable: String,
    },

    /// Types cannot be declared once facts have been asserted.
    #[error("schema is sealed: cannot declare type {0} after the first assertion")]
    SealedSchema(String),

    /// A type name was declared twice.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// Two rules share a name.
    #[error("duplicate rule: {0}")]
    DuplicateRule(String),

    /// A rule binds the same variable name twice.
    #[error("duplicate variable `{variable}` in rule {rule}")]
    DuplicateVariable {
        /// The rule being compiled.
        rule: String,
        /// The repeated variable name.
        variable: String,
    },

    /// A field is not declared on its type.
    #[error("unknown field: {type_name}.{field}")]
    UnknownField {
        /// The type that was queried.
        type_name: String,
        /// The field name that was not found.
        field: String,
    },

    // =========================================================================
    // Assertion errors (recoverable)
    // =========================================================================
    /// A fact with this identifier is already asserted.
    #[error("duplicate fact id: {0}")]
    DuplicateId(String),

    /// No fact with this identifier is asserted.
    #[error("fact not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Evaluation errors (reported as diagnostics inside the network)
    // =========================================================================
    /// Operand kinds are incompatible with the operation.
    #[error("type mismatch in {operation}: {lhs} and {rhs}")]
    TypeMismatch {
        /// The operator or function applied.
        operation: String,
        /// Kind of the left (or only) operand.
        lhs: ValueKind,
        /// Kind of the right operand.
        rhs: ValueKind,
    },

    /// A variable is not bound in the evaluation context.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Call of a function that does not exist.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments to a function.
    #[error("arity mismatch in {function}: expected {expected}, got {actual}")]
    ArityMismatch {
        /// The function called.
        function: String,
        /// Description of expected arity.
        expected: String,
        /// Actual number of arguments.
        actual: usize,
    },

    // =========================================================================
    // Session and persistence errors
    // =========================================================================
    /// The session was poisoned by an earlier fatal error.
    #[error("session is poisoned; call reset() before further use")]
    PoisonedSession,

    /// A persistence backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// Internal invariant violation (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Listener-issued commands drained in a single submit or retract.
    MaxAgendaCommands {
        /// The configured limit.
        limit: usize,
        /// Rule whose activation queued the command that crossed the limit.
        rule: Option<String>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxAgendaCommands { limit, rule } => {
                write!(f, "max agenda commands ({limit}) exceeded")?;
                if let Some(rule) = rule {
                    write!(f, " after activation of {rule}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Rule or node name.
    pub source: Option<String>,
    /// Chain of operations that led to the error, outermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "at {source}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}

/// Result type alias for Trellis operations.
pub type Result<T> = std::result::Result<T, Error>;
