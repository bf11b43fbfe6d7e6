//! Operator semantics and built-in functions.
//!
//! Comparison and arithmetic helpers live here; the named functions callable
//! from expressions are grouped by theme in the submodules and registered in
//! [`FunctionTable`].

#![allow(clippy::cast_precision_loss)]

mod math;
mod string;

use std::cmp::Ordering;
use std::collections::HashMap;

use trellis_foundation::{Error, ErrorKind, Result, Value};

use crate::ast::BinaryOp;

// =============================================================================
// Comparison Helpers
// =============================================================================

/// Semantic equality.
///
/// Integers and floats compare after promotion. `Null` equals only `Null`.
/// Any other pairing of different kinds is a type mismatch.
pub fn values_equal(a: &Value, b: &Value) -> Result<bool> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, _) | (_, Value::Null) => Ok(false),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Ok(a.as_number() == b.as_number())
        }
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::List(xs), Value::List(ys)) => {
            if xs.len() != ys.len() {
                return Ok(false);
            }
            for (x, y) in xs.iter().zip(ys.iter()) {
                if !values_equal(x, y)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Err(Error::type_mismatch("==", a.kind(), b.kind())),
    }
}

/// Ordering over numbers (promoted) and strings.
///
/// Returns `None` for unordered floats (NaN).
pub fn compare_values(op: BinaryOp, a: &Value, b: &Value) -> Result<Option<Ordering>> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Some(x.cmp(y))),
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
            _ => Err(Error::type_mismatch(op.symbol(), a.kind(), b.kind())),
        },
    }
}

/// Applies a comparison operator.
pub fn compare(op: BinaryOp, a: &Value, b: &Value) -> Result<bool> {
    match op {
        BinaryOp::Eq => values_equal(a, b),
        BinaryOp::Ne => values_equal(a, b).map(|eq| !eq),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let Some(ordering) = compare_values(op, a, b)? else {
                return Ok(false);
            };
            Ok(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
        _ => Err(Error::internal(format!("{op} is not a comparison"))),
    }
}

/// `haystack CONTAINS needle` on strings.
pub fn contains(haystack: &Value, needle: &Value) -> Result<bool> {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => Ok(h.contains(&**n)),
        _ => Err(Error::type_mismatch("CONTAINS", haystack.kind(), needle.kind())),
    }
}

/// `item IN list`. Elements of a different kind never match.
pub fn member_of(item: &Value, list: &Value) -> Result<bool> {
    let Value::List(items) = list else {
        return Err(Error::type_mismatch("IN", item.kind(), list.kind()));
    };
    Ok(items
        .iter()
        .any(|candidate| values_equal(item, candidate).unwrap_or(false)))
}

// =============================================================================
// Arithmetic Helpers
// =============================================================================

/// Applies an arithmetic operator.
///
/// `+ - * %` on two integers stay integral and saturate; `/` always yields a
/// float; a float operand promotes the other; `+` concatenates strings.
pub fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    match (op, a, b) {
        (BinaryOp::Add, Value::String(x), Value::String(y)) => {
            Ok(Value::String(format!("{x}{y}").into()))
        }
        (BinaryOp::Add, Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.saturating_add(*y))),
        (BinaryOp::Sub, Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.saturating_sub(*y))),
        (BinaryOp::Mul, Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.saturating_mul(*y))),
        (BinaryOp::Mod, Value::Int(_), Value::Int(0)) => Err(Error::new(ErrorKind::DivisionByZero)),
        (BinaryOp::Mod, Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_rem(*y))),
        _ => {
            let (Some(x), Some(y)) = (a.as_number(), b.as_number()) else {
                return Err(Error::type_mismatch(op.symbol(), a.kind(), b.kind()));
            };
            match op {
                BinaryOp::Add => Ok(Value::Float(x + y)),
                BinaryOp::Sub => Ok(Value::Float(x - y)),
                BinaryOp::Mul => Ok(Value::Float(x * y)),
                BinaryOp::Div | BinaryOp::Mod if y == 0.0 => {
                    Err(Error::new(ErrorKind::DivisionByZero))
                }
                BinaryOp::Div => Ok(Value::Float(x / y)),
                BinaryOp::Mod => Ok(Value::Float(x % y)),
                _ => Err(Error::internal(format!("{op} is not arithmetic"))),
            }
        }
    }
}

// =============================================================================
// Function Table
// =============================================================================

/// Accepted argument counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments.
    Exact(usize),
    /// Between min and max arguments, inclusive.
    Range(usize, usize),
    /// At least n arguments.
    AtLeast(usize),
}

impl Arity {
    /// Returns true if `n` arguments are accepted.
    #[must_use]
    pub const fn accepts(self, n: usize) -> bool {
        match self {
            Self::Exact(k) => n == k,
            Self::Range(lo, hi) => n >= lo && n <= hi,
            Self::AtLeast(k) => n >= k,
        }
    }

    fn describe(self) -> String {
        match self {
            Self::Exact(k) => k.to_string(),
            Self::Range(lo, hi) => format!("{lo} to {hi}"),
            Self::AtLeast(k) => format!("at least {k}"),
        }
    }
}

/// Signature of a built-in function.
pub type NativeFn = fn(&[Value]) -> Result<Value>;

/// Registry of the functions callable from expressions.
#[derive(Clone, Debug)]
pub struct FunctionTable {
    functions: HashMap<&'static str, (Arity, NativeFn)>,
}

impl FunctionTable {
    /// Creates a table with every built-in function registered.
    #[must_use]
    pub fn builtins() -> Self {
        let mut table = Self {
            functions: HashMap::new(),
        };
        table.register("LENGTH", Arity::Exact(1), string::length);
        table.register("UPPER", Arity::Exact(1), string::upper);
        table.register("LOWER", Arity::Exact(1), string::lower);
        table.register("TRIM", Arity::Exact(1), string::trim);
        table.register("SUBSTRING", Arity::Range(2, 3), string::substring);
        table.register("ABS", Arity::Exact(1), math::abs);
        table.register("ROUND", Arity::Exact(1), math::round);
        table.register("FLOOR", Arity::Exact(1), math::floor);
        table.register("CEIL", Arity::Exact(1), math::ceil);
        table.register("MIN", Arity::AtLeast(1), math::min);
        table.register("MAX", Arity::AtLeast(1), math::max);
        table
    }

    /// Registers or replaces a function. Names are matched case-insensitively
    /// and must be given in upper case.
    pub fn register(&mut self, name: &'static str, arity: Arity, f: NativeFn) {
        self.functions.insert(name, (arity, f));
    }

    /// Returns true if a function with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name.to_ascii_uppercase().as_str())
    }

    /// Calls a function.
    ///
    /// # Errors
    /// `UnknownFunction`, `ArityMismatch`, or whatever the function reports.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let upper = name.to_ascii_uppercase();
        let (arity, f) = self
            .functions
            .get(upper.as_str())
            .ok_or_else(|| Error::new(ErrorKind::UnknownFunction(name.to_string())))?;
        if !arity.accepts(args.len()) {
            return Err(Error::arity_mismatch(upper, arity.describe(), args.len()));
        }
        f(args)
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::builtins()
    }
}
