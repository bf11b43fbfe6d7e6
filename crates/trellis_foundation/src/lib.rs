//! Core values, facts, schemas, errors and diagnostics for Trellis.
//!
//! This crate provides:
//! - [`Value`] - The tagged value carried by fact fields and expressions
//! - [`Fact`] and [`FactId`] - Typed, immutable records
//! - [`TypeSchema`] - Type declarations that facts are checked against
//! - [`Error`] - Rich error types with context
//! - [`Diagnostic`] and [`DiagnosticSink`] - Non-fatal problem reporting

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod diagnostic;
pub mod error;
pub mod fact;
pub mod schema;
pub mod types;
pub mod value;

pub use diagnostic::{Diagnostic, DiagnosticCode, DiagnosticSink, NullSink, Severity, TracingSink};
pub use error::{Error, ErrorContext, ErrorKind, Result, SemanticLimit};
pub use fact::{Fact, FactId};
pub use schema::{FieldDecl, TypeDecl, TypeSchema};
pub use types::{FieldKind, ValueKind};
pub use value::Value;
