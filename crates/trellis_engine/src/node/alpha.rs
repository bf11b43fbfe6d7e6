//! Alpha nodes: single-fact filters.

use std::sync::Arc;

use trellis_language::Expr;

use crate::memory::WorkingMemory;
use crate::registry::FactKey;

/// Filters facts of one type by a predicate over a single variable.
///
/// The predicate is the conjunction of `predicate`, kept in canonical
/// order so identical filters from different rules compare equal.
#[derive(Clone, Debug)]
pub struct AlphaNode {
    /// Type of the filtered facts.
    pub type_name: Arc<str>,
    /// Variable the predicate is written against.
    pub variable: Arc<str>,
    /// Conjuncts, sorted by canonical text.
    pub predicate: Vec<Expr>,
    /// Facts that passed the predicate.
    pub memory: WorkingMemory<FactKey, ()>,
}

impl AlphaNode {
    pub(crate) fn new(type_name: Arc<str>, variable: Arc<str>, mut predicate: Vec<Expr>) -> Self {
        predicate.sort_by_cached_key(Expr::canonical);
        Self {
            type_name,
            variable,
            predicate,
            memory: WorkingMemory::new(),
        }
    }

    pub(crate) fn label(&self) -> String {
        format!(
            "alpha {}: {} {}",
            self.variable,
            self.type_name,
            super::render_conditions(&self.predicate)
        )
    }
}
