//! Type declarations describing fact shapes.
//!
//! A [`TypeSchema`] is an ordered list of [`TypeDecl`]s. Every asserted fact
//! is checked against the declaration of its type before it enters the
//! network.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::fact::Fact;
use crate::types::FieldKind;

/// Declaration of a single field.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDecl {
    /// Field name.
    pub name: Arc<str>,
    /// Declared kind.
    pub kind: FieldKind,
}

impl FieldDecl {
    /// Creates a field declaration.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Declaration of a fact type.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeDecl {
    /// Type name.
    pub name: Arc<str>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDecl>,
}

impl TypeDecl {
    /// Creates a type with no fields.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field to the declaration.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<Arc<str>>, kind: FieldKind) -> Self {
        self.fields.push(FieldDecl::new(name, kind));
        self
    }

    /// Returns the declaration of a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    /// Returns true if `name` resolves on facts of this type. The `id`
    /// accessor always resolves.
    #[must_use]
    pub fn resolves(&self, name: &str) -> bool {
        name == Fact::ID_FIELD || self.field(name).is_some()
    }

    /// Checks a fact against this declaration and returns the stored form,
    /// with integers promoted on float fields.
    ///
    /// # Errors
    /// - `UnknownField` if the fact carries a field that is not declared
    /// - `FieldTypeMismatch` if a value does not match its field kind
    pub fn conform(&self, fact: &Fact) -> Result<Fact> {
        fact.try_map_fields(|name, value| {
            let decl = self
                .field(name)
                .ok_or_else(|| Error::unknown_field(&*self.name, name))?;
            decl.kind.coerce(value.clone()).ok_or_else(|| {
                Error::field_type_mismatch(&*self.name, name, decl.kind, value.kind())
            })
        })
    }
}

/// Ordered collection of type declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeSchema {
    types: Vec<TypeDecl>,
}

impl TypeSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`declare`](Self::declare) for literal schemas.
    ///
    /// A duplicate name replaces nothing and is ignored; use `declare` to
    /// observe the error.
    #[must_use]
    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        let _ = self.declare(decl);
        self
    }

    /// Adds a type declaration.
    ///
    /// # Errors
    /// Returns `DuplicateType` if the name is already declared.
    pub fn declare(&mut self, decl: TypeDecl) -> Result<()> {
        if self.get(&decl.name).is_some() {
            return Err(Error::new(ErrorKind::DuplicateType(decl.name.to_string())));
        }
        self.types.push(decl);
        Ok(())
    }

    /// Looks up a declaration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| &*t.name == name)
    }

    /// Looks up a declaration, failing with `UnknownType`.
    ///
    /// # Errors
    /// Returns `UnknownType` if the name is not declared.
    pub fn require(&self, name: &str) -> Result<&TypeDecl> {
        self.get(name).ok_or_else(|| Error::unknown_type(name))
    }

    /// Iterates declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.iter()
    }

    /// Returns the number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no types are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
