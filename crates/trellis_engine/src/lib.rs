//! RETE discrimination network, propagation, and sessions for Trellis.
//!
//! This crate provides:
//! - [`NetworkBuilder`] - Compiles rules into a shared node graph
//! - [`Network`] - The node arena with incremental assert/retract propagation
//! - [`Session`] - Serialized access, listeners, diagnostics and persistence
//! - [`MemoryStore`] - Pluggable storage for node memory snapshots
//! - [`NetworkStats`] - Structural and memory statistics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod builder;
pub mod config;
pub mod listener;
pub mod memory;
pub mod network;
pub mod node;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod stats;
pub mod token;

pub use builder::{ConditionPlacement, NetworkBuilder, RulePlan};
pub use config::SessionConfig;
pub use listener::{ActivationEvent, ActivationListener, Agenda, Command};
pub use memory::WorkingMemory;
pub use network::Network;
pub use node::{Activation, Aggregate, Node, NodeId, NodeKind};
pub use persistence::{InMemoryStore, MemorySnapshot, MemoryStore, TokenSnapshot};
pub use registry::{FactKey, FactRegistry};
pub use session::{Session, SessionState};
pub use stats::{NetworkStats, RuleInfo, SessionCounters};
pub use token::{Token, TokenId, TokenStore};
