//! Not and Exists nodes.
//!
//! Both keep, for every left token, the set of right facts that currently
//! satisfy the conditions. A Not node passes a token while that set is
//! empty; an Exists node while it is not. Each pass is a fresh child token,
//! so a token that flips back and forth gets a new identity every time.

use std::collections::BTreeSet;
use std::sync::Arc;

use trellis_language::Expr;

use crate::memory::WorkingMemory;
use crate::registry::FactKey;
use crate::token::TokenId;

/// Per-left-token state.
#[derive(Clone, Debug, Default)]
pub struct QuantifiedState {
    /// Right facts satisfying the conditions for this token.
    pub matched: BTreeSet<FactKey>,
    /// Child token currently emitted for this token.
    pub output: Option<TokenId>,
}

/// Shared state of Not and Exists nodes.
#[derive(Clone, Debug)]
pub struct QuantifiedNode {
    /// Variable bound to the right fact while testing.
    pub variable: Arc<str>,
    /// Conditions, sorted by canonical text.
    pub conditions: Vec<Expr>,
    /// Left tokens and their match sets.
    pub left: WorkingMemory<TokenId, QuantifiedState>,
    /// Right facts.
    pub right: WorkingMemory<FactKey, ()>,
}

impl QuantifiedNode {
    pub(crate) fn new(variable: Arc<str>, mut conditions: Vec<Expr>) -> Self {
        conditions.sort_by_cached_key(Expr::canonical);
        Self {
            variable,
            conditions,
            left: WorkingMemory::new(),
            right: WorkingMemory::new(),
        }
    }

    pub(crate) fn label(&self) -> String {
        format!(
            "{} {}",
            self.variable,
            super::render_conditions(&self.conditions)
        )
    }
}

/// Whether a token with `matches` satisfying facts passes the node.
pub(crate) const fn passes(negated: bool, matches: usize) -> bool {
    if negated { matches == 0 } else { matches > 0 }
}
