//! Integration tests for Layer 0: Foundation
//!
//! Tests for core types: Value, Fact, TypeSchema, Error, and Diagnostic.

mod diagnostics;
mod errors;
mod schema;
mod values;
