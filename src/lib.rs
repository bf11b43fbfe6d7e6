//! Trellis - Incremental RETE rule engine
//!
//! This crate re-exports all layers of the Trellis system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: trellis_debug      — Diagnostic log, formatters, network diagram
//! Layer 2: trellis_engine     — Network builder, propagation, sessions
//! Layer 1: trellis_language   — Expression and rule AST, evaluator
//! Layer 0: trellis_foundation — Core types (Value, Fact, Error, Diagnostic)
//! ```

pub use trellis_debug as debug;
pub use trellis_engine as engine;
pub use trellis_foundation as foundation;
pub use trellis_language as language;
