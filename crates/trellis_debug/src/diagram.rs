//! Text rendering of a compiled network.
//!
//! The diagram has two sections. The alpha section lists every type node
//! with its alpha filters and the beta nodes each filter feeds. The beta
//! section walks the left-input chains from the root down to the
//! terminals. Shared nodes are printed in full once and referenced by id
//! afterwards.

use std::collections::BTreeSet;
use std::fmt::Write;

use trellis_engine::{Network, Node, NodeId, NodeKind};

/// Renders a [`Network`] as an indented tree.
#[derive(Clone, Debug, Default)]
pub struct NetworkDiagram {
    /// Whether to append `L/R` memory sizes.
    pub show_memory: bool,
    /// Whether to append the rules using each node.
    pub show_rules: bool,
}

impl NetworkDiagram {
    /// Creates a diagram showing structure only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to show memory sizes.
    #[must_use]
    pub fn with_memory(mut self) -> Self {
        self.show_memory = true;
        self
    }

    /// Builder method to show rule membership.
    #[must_use]
    pub fn with_rules(mut self) -> Self {
        self.show_rules = true;
        self
    }

    /// Renders the whole network.
    #[must_use]
    pub fn render(&self, network: &Network) -> String {
        let mut out = String::new();
        let Some(root) = network.node(network.root()) else {
            return out;
        };

        let _ = writeln!(out, "alpha network");
        if let NodeKind::Root(state) = root.kind() {
            for &type_id in state.types.values() {
                let Some(type_node) = network.node(type_id) else {
                    continue;
                };
                let _ = writeln!(out, "  {}", self.line(type_node));
                for &alpha_id in type_node.children() {
                    if let Some(alpha) = network.node(alpha_id) {
                        let _ = write!(out, "    {}", self.line(alpha));
                        if !alpha.children().is_empty() {
                            let _ = write!(out, " -> {}", ids(alpha.children()));
                        }
                        out.push('\n');
                    }
                }
            }
        }

        let _ = writeln!(out, "beta network");
        let _ = writeln!(out, "  {}", self.line(root));
        let mut seen = BTreeSet::new();
        let children = root.children();
        for (i, &child) in children.iter().enumerate() {
            self.walk(network, child, "  ", i + 1 == children.len(), &mut seen, &mut out);
        }
        out
    }

    fn walk(
        &self,
        network: &Network,
        id: NodeId,
        prefix: &str,
        last: bool,
        seen: &mut BTreeSet<NodeId>,
        out: &mut String,
    ) {
        let Some(node) = network.node(id) else {
            return;
        };
        let branch = if last { "`-- " } else { "|-- " };
        if !seen.insert(id) {
            let _ = writeln!(out, "{prefix}{branch}{id} (shared, see above)");
            return;
        }
        let _ = write!(out, "{prefix}{branch}{}", self.line(node));
        if let Some(right) = node.right_parent() {
            let _ = write!(out, " <- {right}");
        }
        out.push('\n');

        let nested = format!("{prefix}{}", if last { "    " } else { "|   " });
        let children = node.children();
        for (i, &child) in children.iter().enumerate() {
            self.walk(network, child, &nested, i + 1 == children.len(), seen, out);
        }
    }

    fn line(&self, node: &Node) -> String {
        let mut line = format!("{} {}", node.id(), node.label());
        if self.show_memory && !matches!(node.kind(), NodeKind::Root(_) | NodeKind::Type(_)) {
            let (left, right) = node.memory_sizes();
            let _ = write!(line, " (L{left} R{right})");
        }
        if self.show_rules && !node.rules().is_empty() {
            let _ = write!(line, " [{}]", node.rules().join(", "));
        }
        line
    }
}

fn ids(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
