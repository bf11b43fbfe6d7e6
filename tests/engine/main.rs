//! Integration tests for Layer 2: Engine
//!
//! Tests for network compilation, propagation, retraction, and sessions.

mod aggregates;
mod persistence;
mod retraction;
mod scenarios;
