//! Join nodes: inner join of the token stream with a fact stream.

use std::sync::Arc;

use trellis_language::Expr;

use crate::memory::WorkingMemory;
use crate::registry::FactKey;
use crate::token::TokenId;

/// Joins left tokens with right facts under ANDed conditions. The joined
/// fact is bound to `variable`.
#[derive(Clone, Debug)]
pub struct JoinNode {
    /// Variable bound to the right fact.
    pub variable: Arc<str>,
    /// Join conditions, sorted by canonical text.
    pub conditions: Vec<Expr>,
    /// Tokens received on the left input.
    pub left: WorkingMemory<TokenId, ()>,
    /// Facts received on the right input.
    pub right: WorkingMemory<FactKey, ()>,
}

impl JoinNode {
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
            "join {} {}",
            self.variable,
            super::render_conditions(&self.conditions)
        )
    }
}
