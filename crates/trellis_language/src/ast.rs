//! Expression trees evaluated by the network.
//!
//! Expressions arrive already parsed. Their [`Display`](fmt::Display) form
//! is canonical: two expressions that print identically are interchangeable,
//! which is what the network builder relies on when it shares nodes.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use trellis_foundation::Value;

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `CONTAINS` (substring test)
    Contains,
    /// `IN` (list membership)
    In,
}

impl BinaryOp {
    /// Returns the operator's source symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Contains => "CONTAINS",
            Self::In => "IN",
        }
    }

    /// Returns true for the six comparison operators.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Constant value.
    Literal(Value),
    /// List literal, the right operand of `IN`.
    List(Vec<Expr>),
    /// Field access `var.field` on a bound fact.
    Field {
        /// Pattern variable.
        var: Arc<str>,
        /// Field name.
        field: Arc<str>,
    },
    /// Reference to a named value, such as an aggregate result.
    Var(Arc<str>),
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Short-circuit conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Built-in function call.
    Call {
        /// Function name.
        name: Arc<str>,
        /// Arguments.
        args: Vec<Expr>,
    },
}

// =============================================================================
// Construction
// =============================================================================

impl Expr {
    /// Creates a literal.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a field access.
    #[must_use]
    pub fn field(var: impl Into<Arc<str>>, field: impl Into<Arc<str>>) -> Self {
        Self::Field {
            var: var.into(),
            field: field.into(),
        }
    }

    /// Creates a named value reference.
    #[must_use]
    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Self::Var(name.into())
    }

    /// Creates a list literal.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Expr>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Creates a function call.
    #[must_use]
    pub fn call(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = Expr>) -> Self {
        Self::Call {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Creates a binary operation.
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs.into()),
            rhs: Box::new(rhs.into()),
        }
    }

    /// Creates a logical negation.
    #[must_use]
    pub fn negation(inner: impl Into<Expr>) -> Self {
        Self::Not(Box::new(inner.into()))
    }

    /// `self == rhs`
    #[must_use]
    pub fn equals(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Eq, self, rhs)
    }

    /// `self != rhs`
    #[must_use]
    pub fn not_equals(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ne, self, rhs)
    }

    /// `self < rhs`
    #[must_use]
    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Lt, self, rhs)
    }

    /// `self <= rhs`
    #[must_use]
    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Le, self, rhs)
    }

    /// `self > rhs`
    #[must_use]
    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Gt, self, rhs)
    }

    /// `self >= rhs`
    #[must_use]
    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ge, self, rhs)
    }

    /// `self + rhs`
    #[must_use]
    pub fn plus(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    /// `self - rhs`
    #[must_use]
    pub fn minus(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Sub, self, rhs)
    }

    /// `self * rhs`
    #[must_use]
    pub fn times(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Mul, self, rhs)
    }

    /// `self / rhs`
    #[must_use]
    pub fn divided_by(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Div, self, rhs)
    }

    /// `self % rhs`
    #[must_use]
    pub fn modulo(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Mod, self, rhs)
    }

    /// `self CONTAINS rhs`
    #[must_use]
    pub fn contains(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Contains, self, rhs)
    }

    /// `self IN rhs`
    #[must_use]
    pub fn is_in(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::In, self, rhs)
    }

    /// `self && rhs`
    #[must_use]
    pub fn and(self, rhs: impl Into<Expr>) -> Self {
        Self::And(Box::new(self), Box::new(rhs.into()))
    }

    /// `self || rhs`
    #[must_use]
    pub fn or(self, rhs: impl Into<Expr>) -> Self {
        Self::Or(Box::new(self), Box::new(rhs.into()))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Self::Literal(Value::Bool(b))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Self::Literal(Value::Int(n))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Self::Literal(Value::from(n))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Self::Literal(Value::Float(n))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::Literal(Value::from(s))
    }
}

// =============================================================================
// Analysis
// =============================================================================

impl Expr {
    /// Collects the pattern variables accessed through `var.field`.
    #[must_use]
    pub fn fact_variables(&self) -> BTreeSet<Arc<str>> {
        let mut out = BTreeSet::new();
        self.walk(&mut |expr| {
            if let Self::Field { var, .. } = expr {
                out.insert(var.clone());
            }
        });
        out
    }

    /// Collects named value references (aggregate results).
    #[must_use]
    pub fn value_names(&self) -> BTreeSet<Arc<str>> {
        let mut out = BTreeSet::new();
        self.walk(&mut |expr| {
            if let Self::Var(name) = expr {
                out.insert(name.clone());
            }
        });
        out
    }

    /// Collects every name the expression needs bound: fact variables and
    /// named values.
    #[must_use]
    pub fn free_names(&self) -> BTreeSet<Arc<str>> {
        let mut out = self.fact_variables();
        out.extend(self.value_names());
        out
    }

    /// Collects the field names read from `var`.
    #[must_use]
    pub fn fields_of(&self, var: &str) -> BTreeSet<Arc<str>> {
        let mut out = BTreeSet::new();
        self.walk(&mut |expr| {
            if let Self::Field { var: v, field } = expr {
                if &**v == var {
                    out.insert(field.clone());
                }
            }
        });
        out
    }

    /// Visits this expression and every sub-expression, parents first.
    pub fn walk(&self, visit: &mut impl FnMut(&Expr)) {
        visit(self);
        match self {
            Self::Literal(_) | Self::Field { .. } | Self::Var(_) => {}
            Self::List(items) | Self::Call { args: items, .. } => {
                for item in items {
                    item.walk(visit);
                }
            }
            Self::Binary { lhs, rhs, .. } | Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::Not(inner) => inner.walk(visit),
        }
    }

    /// Canonical text used for sharing and sorting.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Field { var, field } => write!(f, "{var}.{field}"),
            Self::Var(name) => write!(f, "{name}"),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Self::Not(inner) => write!(f, "!({inner})"),
            Self::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
            Self::Or(lhs, rhs) => write!(f, "({lhs} || {rhs})"),
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
