//! Integration tests for Layer 1: Language
//!
//! Tests for expression evaluation, built-in functions, and rule structures.

mod expressions;
mod functions;
