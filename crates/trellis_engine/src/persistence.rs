//! Memory snapshots and the store they are saved to.
//!
//! A snapshot captures one node memory by fact identifier, so it survives
//! a session rebuild. The root's snapshot is the list of asserted facts,
//! which is all a restore needs; the other snapshots let the restore check
//! that replaying the facts reproduced every memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_foundation::{Error, ErrorKind, Fact, FactId, Result, Value};

use crate::node::NodeId;

/// A token by the identifiers of its facts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// Fact identifiers in position order.
    pub facts: Vec<FactId>,
    /// Synthetic values.
    pub synthetic: Vec<(String, Value)>,
}

/// Contents of one node memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MemorySnapshot {
    /// Root: every asserted fact in assertion order.
    Facts(Vec<Fact>),
    /// Alpha: the facts that passed the predicate.
    FactRefs(Vec<FactId>),
    /// Join, not, exists and accumulate nodes.
    Beta {
        /// Left tokens.
        left: Vec<TokenSnapshot>,
        /// Right facts.
        right: Vec<FactId>,
    },
    /// Terminal: tokens holding an activation.
    Tokens(Vec<TokenSnapshot>),
}

impl MemorySnapshot {
    /// Number of entries in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Facts(facts) => facts.len(),
            Self::FactRefs(ids) => ids.len(),
            Self::Beta { left, right } => left.len() + right.len(),
            Self::Tokens(tokens) => tokens.len(),
        }
    }

    /// Returns true if the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if both snapshots hold the same entries, ignoring order.
    ///
    /// Replaying facts reproduces memory contents, but tokens re-emitted by
    /// negation after a retraction may land in a different position.
    #[must_use]
    pub fn same_contents(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }

    fn normalized(&self) -> Self {
        fn sort_ids(ids: &[FactId]) -> Vec<FactId> {
            let mut ids = ids.to_vec();
            ids.sort();
            ids
        }
        fn sort_tokens(tokens: &[TokenSnapshot]) -> Vec<TokenSnapshot> {
            let mut tokens = tokens.to_vec();
            tokens.sort_by_cached_key(|t| format!("{t:?}"));
            tokens
        }
        match self {
            Self::Facts(facts) => {
                let mut facts = facts.clone();
                facts.sort_by(|a, b| a.id().cmp(b.id()));
                Self::Facts(facts)
            }
            Self::FactRefs(ids) => Self::FactRefs(sort_ids(ids)),
            Self::Beta { left, right } => Self::Beta {
                left: sort_tokens(left),
                right: sort_ids(right),
            },
            Self::Tokens(tokens) => Self::Tokens(sort_tokens(tokens)),
        }
    }
}

/// Storage for node memory snapshots.
pub trait MemoryStore {
    /// Stores a snapshot, replacing any previous one for the node.
    ///
    /// # Errors
    /// `Storage` or `Serialization` on backend failure.
    fn save(&mut self, node: NodeId, snapshot: &MemorySnapshot) -> Result<()>;

    /// Loads the snapshot of a node.
    ///
    /// # Errors
    /// `Storage` or `Serialization` on backend failure.
    fn load(&self, node: NodeId) -> Result<Option<MemorySnapshot>>;

    /// Deletes the snapshot of a node, returning whether one existed.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    fn delete(&mut self, node: NodeId) -> Result<bool>;

    /// Lists the nodes with a snapshot, in ascending order.
    ///
    /// # Errors
    /// `Storage` on backend failure.
    fn list(&self) -> Result<Vec<NodeId>>;
}

/// A [`MemoryStore`] keeping MessagePack-encoded snapshots in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    entries: BTreeMap<NodeId, Vec<u8>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total encoded size in bytes.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl MemoryStore for InMemoryStore {
    fn save(&mut self, node: NodeId, snapshot: &MemorySnapshot) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(snapshot).map_err(|e| {
            Error::new(ErrorKind::Serialization(format!("encoding node {node}: {e}")))
        })?;
        self.entries.insert(node, bytes);
        Ok(())
    }

    fn load(&self, node: NodeId) -> Result<Option<MemorySnapshot>> {
        let Some(bytes) = self.entries.get(&node) else {
            return Ok(None);
        };
        rmp_serde::from_slice(bytes).map(Some).map_err(|e| {
            Error::new(ErrorKind::Serialization(format!("decoding node {node}: {e}")))
        })
    }

    fn delete(&mut self, node: NodeId) -> Result<bool> {
        Ok(self.entries.remove(&node).is_some())
    }

    fn list(&self) -> Result<Vec<NodeId>> {
        Ok(self.entries.keys().copied().collect())
    }
}
