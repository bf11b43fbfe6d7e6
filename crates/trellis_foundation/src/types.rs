//! Kind descriptors for values and declared fields.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Runtime kind of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueKind {
    /// The null value.
    Null,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// String.
    String,
    /// List (expression literals only).
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::List => write!(f, "list"),
        }
    }
}

/// Declared kind of a fact field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldKind {
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// Boolean.
    Bool,
    /// String.
    String,
}

impl FieldKind {
    /// Returns true if values of this field kind are numbers.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Returns the value kind stored in fields of this kind.
    #[must_use]
    pub const fn value_kind(self) -> ValueKind {
        match self {
            Self::Int => ValueKind::Int,
            Self::Float => ValueKind::Float,
            Self::Bool => ValueKind::Bool,
            Self::String => ValueKind::String,
        }
    }

    /// Checks if a value is accepted by a field of this kind.
    ///
    /// - `Null` is accepted by every kind (absent value)
    /// - `Float` fields accept integers (numeric promotion)
    /// - Everything else must match exactly
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (Self::Int | Self::Float, Value::Int(_))
                | (Self::Float, Value::Float(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::String, Value::String(_))
        )
    }

    /// Converts an accepted value into the representation stored on the
    /// fact. Returns `None` if the value is not accepted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(self, value: Value) -> Option<Value> {
        if !self.accepts(&value) {
            return None;
        }
        Some(match (self, value) {
            (Self::Float, Value::Int(n)) => Value::Float(n as f64),
            (_, value) => value,
        })
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::String => write!(f, "string"),
        }
    }
}
