//! Diagnostic logs, formatters, and network diagrams for Trellis.
//!
//! This crate provides:
//! - [`DiagnosticLog`] - A bounded ring buffer sink with queries
//! - [`HumanFormatter`] and [`JsonFormatter`] - Diagnostic output formats
//! - [`NetworkDiagram`] - A text rendering of a compiled network

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod diagram;
pub mod format;
pub mod log;

pub use diagram::NetworkDiagram;
pub use format::{DiagnosticFormatter, HumanFormatter, JsonFormatter};
pub use log::{DiagnosticLog, DiagnosticLogStats, DiagnosticRecord};
