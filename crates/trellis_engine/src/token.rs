//! Tokens: partial matches flowing through the beta network.
//!
//! All tokens live in a single [`TokenStore`]. Each token records the token
//! it was derived from and the fact it joined, and the store keeps two
//! reverse indices over those links:
//!
//! - fact → tokens that joined it
//! - token → tokens derived from it
//!
//! which make cascading removal proportional to the number of dependents.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use trellis_foundation::Value;

use crate::node::NodeId;
use crate::registry::FactKey;

/// Stable token identifier. Identifiers increase monotonically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(u64);

impl TokenId {
    /// Returns the raw identifier.
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A partial match.
#[derive(Clone, Debug)]
pub struct Token {
    id: TokenId,
    node: NodeId,
    parent: Option<TokenId>,
    fact: Option<FactKey>,
    facts: im::Vector<FactKey>,
    synthetic: im::OrdMap<Arc<str>, Value>,
}

impl Token {
    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Returns the node that produced this token.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the token this one was derived from.
    #[must_use]
    pub fn parent(&self) -> Option<TokenId> {
        self.parent
    }

    /// Returns the fact joined to the parent to make this token, if any.
    #[must_use]
    pub fn joined_fact(&self) -> Option<FactKey> {
        self.fact
    }

    /// Returns the ordered fact list.
    #[must_use]
    pub fn facts(&self) -> &im::Vector<FactKey> {
        &self.facts
    }

    /// Returns true if the token references a fact.
    #[must_use]
    pub fn references(&self, key: FactKey) -> bool {
        self.facts.iter().any(|k| *k == key)
    }

    /// Returns the synthetic values added by accumulators.
    #[must_use]
    pub fn synthetic(&self) -> &im::OrdMap<Arc<str>, Value> {
        &self.synthetic
    }
}

/// Tokens compare by their fact lists.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.facts == other.facts
    }
}

impl Eq for Token {}

/// Owner of every live token.
#[derive(Clone, Debug, Default)]
pub struct TokenStore {
    tokens: HashMap<TokenId, Token>,
    by_fact: HashMap<FactKey, BTreeSet<TokenId>>,
    children: HashMap<TokenId, BTreeSet<TokenId>>,
    next: u64,
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root token with no facts.
    pub fn create_root(&mut self, node: NodeId) -> TokenId {
        let id = self.next_id();
        self.tokens.insert(
            id,
            Token {
                id,
                node,
                parent: None,
                fact: None,
                facts: im::Vector::new(),
                synthetic: im::OrdMap::new(),
            },
        );
        id
    }

    /// Derives a token from `parent`, optionally appending a fact and adding
    /// a synthetic value. Returns `None` if the parent is gone.
    pub fn derive(
        &mut self,
        node: NodeId,
        parent: TokenId,
        fact: Option<FactKey>,
        synthetic: Option<(Arc<str>, Value)>,
    ) -> Option<TokenId> {
        let base = self.tokens.get(&parent)?;
        let mut facts = base.facts.clone();
        let mut values = base.synthetic.clone();
        if let Some(key) = fact {
            facts.push_back(key);
        }
        if let Some((name, value)) = synthetic {
            values.insert(name, value);
        }
        let id = self.next_id();
        self.tokens.insert(
            id,
            Token {
                id,
                node,
                parent: Some(parent),
                fact,
                facts,
                synthetic: values,
            },
        );
        self.children.entry(parent).or_default().insert(id);
        if let Some(key) = fact {
            self.by_fact.entry(key).or_default().insert(id);
        }
        Some(id)
    }

    fn next_id(&mut self) -> TokenId {
        let id = TokenId(self.next);
        self.next += 1;
        id
    }

    /// Returns a token.
    #[must_use]
    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    /// Tokens that joined a fact, in creation order.
    #[must_use]
    pub fn joined_with(&self, key: FactKey) -> Vec<TokenId> {
        self.by_fact
            .get(&key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The token and everything derived from it, descendants first.
    #[must_use]
    pub fn subtree_post_order(&self, id: TokenId) -> Vec<TokenId> {
        let mut out = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                out.push(current);
                continue;
            }
            stack.push((current, true));
            if let Some(kids) = self.children.get(&current) {
                for kid in kids.iter().rev() {
                    stack.push((*kid, false));
                }
            }
        }
        out
    }

    /// Removes a single token and unlinks it from the indices. Its children
    /// must already be gone.
    pub fn remove(&mut self, id: TokenId) -> Option<Token> {
        let token = self.tokens.remove(&id)?;
        self.children.remove(&id);
        if let Some(parent) = token.parent {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(&id);
                if siblings.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
        if let Some(key) = token.fact {
            if let Some(joined) = self.by_fact.get_mut(&key) {
                joined.remove(&id);
                if joined.is_empty() {
                    self.by_fact.remove(&key);
                }
            }
        }
        Some(token)
    }

    /// Number of live tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if there are no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterates every live token in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// Drops every token. Identifiers keep increasing.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.by_fact.clear();
        self.children.clear();
    }
}
