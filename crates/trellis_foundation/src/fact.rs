//! Facts: typed, immutable records asserted into a session.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Session-unique, opaque fact identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactId(Arc<str>);

impl FactId {
    /// Creates a fact identifier.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FactId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FactId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<String> for FactId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

/// A typed record.
///
/// Facts are immutable once asserted; "updating" a fact is a retraction
/// followed by a new assertion. Field maps are persistent, so cloning a
/// fact is O(1).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fact {
    id: FactId,
    type_name: Arc<str>,
    fields: im::OrdMap<Arc<str>, Value>,
}

impl Fact {
    /// Field name that always resolves, falling back to the fact identifier
    /// when the type does not declare an `id` field of its own.
    pub const ID_FIELD: &'static str = "id";

    /// Creates a fact with no fields.
    #[must_use]
    pub fn new(id: impl Into<FactId>, type_name: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            fields: im::OrdMap::new(),
        }
    }

    /// Builder method to set a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the fact identifier.
    #[must_use]
    pub fn id(&self) -> &FactId {
        &self.id
    }

    /// Returns the declared type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns a stored field value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Resolves a field for expression evaluation, including the `id`
    /// fallback.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Value> {
        match self.fields.get(name) {
            Some(value) => Some(value.clone()),
            None if name == Self::ID_FIELD => Some(Value::from(self.id.as_str())),
            None => None,
        }
    }

    /// Iterates fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Returns the number of stored fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns a copy of this fact with every field value passed through `f`.
    ///
    /// # Errors
    /// Propagates the first error returned by `f`.
    pub fn try_map_fields<E>(
        &self,
        mut f: impl FnMut(&str, &Value) -> Result<Value, E>,
    ) -> Result<Self, E> {
        let mut fields = im::OrdMap::new();
        for (name, value) in &self.fields {
            fields.insert(name.clone(), f(name, value)?);
        }
        Ok(Self {
            id: self.id.clone(),
            type_name: self.type_name.clone(),
            fields,
        })
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}){{", self.type_name, self.id)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value:?}")?;
        }
        write!(f, "}}")
    }
}
