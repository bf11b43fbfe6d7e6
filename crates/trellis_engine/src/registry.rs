//! Fact registry: validation, identity and ownership of asserted facts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_foundation::{Error, ErrorKind, Fact, FactId, Result, TypeDecl, TypeSchema};

/// Internal handle of an asserted fact.
///
/// Keys increase monotonically over a session and are never reused, so
/// ordering by key is ordering by assertion time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactKey(u64);

impl FactKey {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw key.
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Owns every asserted fact and the schema they are checked against.
///
/// Facts are stored behind `Arc`; the rest of the network refers to them by
/// [`FactKey`].
#[derive(Clone, Debug, Default)]
pub struct FactRegistry {
    schema: TypeSchema,
    facts: BTreeMap<FactKey, Arc<Fact>>,
    by_id: HashMap<FactId, FactKey>,
    next_key: u64,
    sealed: bool,
}

impl FactRegistry {
    /// Creates a registry over a schema.
    #[must_use]
    pub fn new(schema: TypeSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &TypeSchema {
        &self.schema
    }

    /// Returns true once the first fact has been asserted.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Declares a type.
    ///
    /// # Errors
    /// `SealedSchema` after the first assertion, `DuplicateType` for a name
    /// already declared.
    pub fn declare_type(&mut self, decl: TypeDecl) -> Result<()> {
        if self.sealed {
            return Err(Error::new(ErrorKind::SealedSchema(decl.name.to_string())));
        }
        self.schema.declare(decl)
    }

    /// Validates and stores a fact.
    ///
    /// # Errors
    /// `DuplicateId`, `UnknownType`, `UnknownField` or `FieldTypeMismatch`.
    pub fn insert(&mut self, fact: Fact) -> Result<(FactKey, Arc<Fact>)> {
        if self.by_id.contains_key(fact.id()) {
            return Err(Error::duplicate_id(fact.id().as_str()));
        }
        let stored = Arc::new(self.schema.require(fact.type_name())?.conform(&fact)?);
        let key = FactKey::new(self.next_key);
        self.next_key += 1;
        self.sealed = true;
        self.by_id.insert(stored.id().clone(), key);
        self.facts.insert(key, Arc::clone(&stored));
        Ok((key, stored))
    }

    /// Removes a fact by identifier.
    ///
    /// # Errors
    /// `NotFound` if no such fact is asserted.
    pub fn remove(&mut self, id: &str) -> Result<(FactKey, Arc<Fact>)> {
        let key = self.by_id.remove(id).ok_or_else(|| Error::not_found(id))?;
        let fact = self
            .facts
            .remove(&key)
            .ok_or_else(|| Error::internal(format!("registry index out of sync for {id}")))?;
        Ok((key, fact))
    }

    /// Returns the key of an asserted fact.
    #[must_use]
    pub fn key_of(&self, id: &str) -> Option<FactKey> {
        self.by_id.get(id).copied()
    }

    /// Looks up a fact by identifier.
    ///
    /// # Errors
    /// `NotFound` if no such fact is asserted.
    pub fn lookup(&self, id: &str) -> Result<&Arc<Fact>> {
        self.key_of(id)
            .and_then(|key| self.facts.get(&key))
            .ok_or_else(|| Error::not_found(id))
    }

    /// Returns the fact behind a key.
    #[must_use]
    pub fn get(&self, key: FactKey) -> Option<&Arc<Fact>> {
        self.facts.get(&key)
    }

    /// Iterates facts in assertion order.
    pub fn iter(&self) -> impl Iterator<Item = (FactKey, &Arc<Fact>)> {
        self.facts.iter().map(|(k, f)| (*k, f))
    }

    /// Returns the number of asserted facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if no facts are asserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Drops every fact. Keys keep increasing and the schema stays sealed.
    pub fn clear(&mut self) {
        self.facts.clear();
        self.by_id.clear();
    }
}
