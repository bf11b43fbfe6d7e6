//! Terminal nodes: activation sinks.

use std::fmt;
use std::sync::Arc;

use trellis_foundation::{FactId, Value};
use trellis_language::{Action, Expr};

use crate::memory::WorkingMemory;
use crate::token::TokenId;

/// A rule match: the rule, its action, the facts that matched and the
/// action arguments evaluated against them.
#[derive(Clone, Debug, PartialEq)]
pub struct Activation {
    /// Rule name.
    pub rule: Arc<str>,
    /// Action name.
    pub action: Arc<str>,
    /// Token that produced the activation.
    pub token: TokenId,
    /// Matched facts in pattern order.
    pub facts: Vec<FactId>,
    /// Evaluated action arguments.
    pub arguments: Vec<Value>,
}

/// Renders as `action(arg, ...)`, strings quoted.
impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.action)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg:?}")?;
        }
        write!(f, ")")
    }
}

/// Holds the activations of one rule.
#[derive(Clone, Debug)]
pub struct TerminalNode {
    /// Rule name.
    pub rule: Arc<str>,
    /// Action template.
    pub action: Action,
    /// Conditions only evaluable once every clause is bound, such as tests
    /// on aggregates placed after the last join.
    pub guards: Vec<Expr>,
    /// Activations by token, in arrival order.
    pub memory: WorkingMemory<TokenId, Activation>,
}

impl TerminalNode {
    pub(crate) fn new(rule: Arc<str>, action: Action, mut guards: Vec<Expr>) -> Self {
        guards.sort_by_cached_key(Expr::canonical);
        Self {
            rule,
            action,
            guards,
            memory: WorkingMemory::new(),
        }
    }

    pub(crate) fn label(&self) -> String {
        if self.guards.is_empty() {
            format!("terminal {} => {}", self.rule, self.action)
        } else {
            format!(
                "terminal {} {} => {}",
                self.rule,
                super::render_conditions(&self.guards),
                self.action
            )
        }
    }
}
