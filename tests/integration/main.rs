//! Cross-layer integration tests for Trellis
//!
//! Tests that verify correct interaction between multiple crates.

mod debug;
mod listeners;
