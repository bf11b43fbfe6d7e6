//! Network statistics and per-session counters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::network::Network;
use crate::node::NodeId;

/// Running totals for a session. Counters survive [`reset`](crate::Session::reset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Facts successfully asserted.
    pub facts_submitted: u64,
    /// Facts successfully retracted.
    pub facts_retracted: u64,
    /// Tokens created, including initial tokens.
    pub tokens_created: u64,
    /// Tokens removed by retraction.
    pub tokens_removed: u64,
    /// Activations stored by terminals.
    pub activations_added: u64,
    /// Activations dropped by terminals.
    pub activations_removed: u64,
    /// Diagnostics delivered to the sink.
    pub diagnostics_emitted: u64,
}

/// Shape and occupancy of a network at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Node count per kind name.
    pub nodes_by_kind: BTreeMap<&'static str, usize>,
    /// Total node count, root included.
    pub total_nodes: usize,
    /// Nodes used by more than one rule.
    pub shared_nodes: usize,
    /// Entries across left memories (terminal activations included).
    pub left_entries: usize,
    /// Entries across right and alpha memories.
    pub right_entries: usize,
    /// Live tokens.
    pub tokens: usize,
    /// Asserted facts.
    pub facts: usize,
}

impl NetworkStats {
    /// Collects statistics from a network.
    #[must_use]
    pub fn collect(network: &Network) -> Self {
        let mut stats = Self {
            tokens: network.tokens().len(),
            facts: network.registry().len(),
            ..Self::default()
        };
        for node in network.nodes() {
            *stats.nodes_by_kind.entry(node.kind().name()).or_default() += 1;
            stats.total_nodes += 1;
            if node.is_shared() {
                stats.shared_nodes += 1;
            }
            let (left, right) = node.memory_sizes();
            stats.left_entries += left;
            stats.right_entries += right;
        }
        stats
    }

    /// Number of nodes of one kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.nodes_by_kind.get(kind).copied().unwrap_or(0)
    }
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} nodes (", self.total_nodes)?;
        for (i, (kind, count)) in self.nodes_by_kind.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{kind}: {count}")?;
        }
        write!(
            f,
            "), {} shared, {} facts, {} tokens",
            self.shared_nodes, self.facts, self.tokens
        )
    }
}

/// Nodes used by one rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleInfo {
    /// Rule name.
    pub name: Arc<str>,
    /// Every node on the rule's path, in creation order of first use.
    pub nodes: Vec<NodeId>,
    /// The rule's terminal.
    pub terminal: NodeId,
    /// Nodes this rule shares, with the number of rules using each.
    pub shared: Vec<(NodeId, usize)>,
}

impl RuleInfo {
    pub(crate) fn collect(network: &Network, rule: &str) -> Option<Self> {
        let plan = network.plan(rule)?;
        let shared = plan
            .nodes
            .iter()
            .filter_map(|id| network.node(*id))
            .filter(|node| node.is_shared())
            .map(|node| (node.id(), node.rules().len()))
            .collect();
        Some(Self {
            name: Arc::clone(&plan.rule),
            nodes: plan.nodes.clone(),
            terminal: plan.terminal,
            shared,
        })
    }
}
