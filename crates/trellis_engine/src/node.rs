//! Network nodes.
//!
//! Nodes live in one arena owned by the [`Network`](crate::Network) and refer
//! to each other by [`NodeId`]. A node's `children` are the nodes it feeds:
//!
//! - root: the beta nodes that receive the initial token
//! - type node: its alpha nodes
//! - alpha node: the beta nodes it feeds on their right input
//! - beta node: the nodes that receive its tokens on their left input

pub mod accumulate;
pub mod alpha;
pub mod join;
pub mod quantified;
pub mod terminal;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use accumulate::{Aggregate, AccumulateNode, AccumulateState};
pub use alpha::AlphaNode;
pub use join::JoinNode;
pub use quantified::{QuantifiedNode, QuantifiedState};
pub use terminal::{Activation, TerminalNode};

use crate::token::TokenId;

/// Index of a node in the network arena. Stable for the session lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single entry point of the network.
#[derive(Clone, Debug, Default)]
pub struct RootNode {
    /// Token with no facts that seeds every rule chain.
    pub initial: Option<TokenId>,
    /// Type nodes by type name.
    pub types: BTreeMap<Arc<str>, NodeId>,
}

/// Stateless per-type dispatcher.
#[derive(Clone, Debug)]
pub struct TypeNode {
    /// Dispatched type.
    pub type_name: Arc<str>,
}

/// Node variants.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Network entry.
    Root(RootNode),
    /// Per-type fan-out.
    Type(TypeNode),
    /// Single-fact filter.
    Alpha(AlphaNode),
    /// Inner join of tokens and facts.
    Join(JoinNode),
    /// Passes tokens with no matching fact.
    Not(QuantifiedNode),
    /// Passes tokens with at least one matching fact.
    Exists(QuantifiedNode),
    /// Enriches tokens with an aggregate.
    Accumulate(AccumulateNode),
    /// Activation sink.
    Terminal(TerminalNode),
}

impl NodeKind {
    /// Returns the lower-case variant name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Root(_) => "root",
            Self::Type(_) => "type",
            Self::Alpha(_) => "alpha",
            Self::Join(_) => "join",
            Self::Not(_) => "not",
            Self::Exists(_) => "exists",
            Self::Accumulate(_) => "accumulate",
            Self::Terminal(_) => "terminal",
        }
    }

    /// Returns true for nodes with a left token input.
    #[must_use]
    pub const fn is_beta(&self) -> bool {
        matches!(
            self,
            Self::Join(_) | Self::Not(_) | Self::Exists(_) | Self::Accumulate(_)
        )
    }
}

/// A node in the arena.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) children: Vec<NodeId>,
    pub(crate) left_parent: Option<NodeId>,
    pub(crate) right_parent: Option<NodeId>,
    pub(crate) rules: Vec<Arc<str>>,
    pub(crate) layout: Arc<[Arc<str>]>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, layout: Arc<[Arc<str>]>) -> Self {
        Self {
            id,
            kind,
            children: Vec::new(),
            left_parent: None,
            right_parent: None,
            rules: Vec::new(),
            layout,
        }
    }

    /// Returns the node identifier.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the variant and its state.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the nodes this node feeds, in creation order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns the node feeding the left (token) input.
    #[must_use]
    pub fn left_parent(&self) -> Option<NodeId> {
        self.left_parent
    }

    /// Returns the alpha node feeding the right (fact) input.
    #[must_use]
    pub fn right_parent(&self) -> Option<NodeId> {
        self.right_parent
    }

    /// Returns the rules that use this node.
    #[must_use]
    pub fn rules(&self) -> &[Arc<str>] {
        &self.rules
    }

    /// Returns true if more than one rule uses this node.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.rules.len() > 1
    }

    /// Variable names of the fact positions in tokens this node emits.
    #[must_use]
    pub fn layout(&self) -> &[Arc<str>] {
        &self.layout
    }

    /// Returns `(left, right)` memory sizes. Alpha memories count as right,
    /// terminal memories as left.
    #[must_use]
    pub fn memory_sizes(&self) -> (usize, usize) {
        match &self.kind {
            NodeKind::Root(_) | NodeKind::Type(_) => (0, 0),
            NodeKind::Alpha(alpha) => (0, alpha.memory.len()),
            NodeKind::Join(join) => (join.left.len(), join.right.len()),
            NodeKind::Not(q) | NodeKind::Exists(q) => (q.left.len(), q.right.len()),
            NodeKind::Accumulate(acc) => (acc.left.len(), acc.right.len()),
            NodeKind::Terminal(terminal) => (terminal.memory.len(), 0),
        }
    }

    /// One-line description used by diagrams and logs.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Root(_) => "root".to_string(),
            NodeKind::Type(t) => format!("type {}", t.type_name),
            NodeKind::Alpha(alpha) => alpha.label(),
            NodeKind::Join(join) => join.label(),
            NodeKind::Not(q) => format!("not {}", q.label()),
            NodeKind::Exists(q) => format!("exists {}", q.label()),
            NodeKind::Accumulate(acc) => acc.label(),
            NodeKind::Terminal(terminal) => terminal.label(),
        }
    }

    pub(crate) fn clear_memory(&mut self) {
        match &mut self.kind {
            NodeKind::Root(root) => root.initial = None,
            NodeKind::Type(_) => {}
            NodeKind::Alpha(alpha) => alpha.memory.clear(),
            NodeKind::Join(join) => {
                join.left.clear();
                join.right.clear();
            }
            NodeKind::Not(q) | NodeKind::Exists(q) => {
                q.left.clear();
                q.right.clear();
            }
            NodeKind::Accumulate(acc) => {
                acc.left.clear();
                acc.right.clear();
            }
            NodeKind::Terminal(terminal) => terminal.memory.clear(),
        }
    }
}

/// Renders a condition list as `[c1, c2]`.
pub(crate) fn render_conditions(conditions: &[trellis_language::Expr]) -> String {
    let parts: Vec<String> = conditions.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}
