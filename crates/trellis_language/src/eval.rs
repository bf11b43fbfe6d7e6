//! Expression evaluation over bound facts.

use trellis_foundation::{Error, Fact, Result, Value, ValueKind};

use crate::ast::{BinaryOp, Expr};
use crate::native::{self, FunctionTable};

// =============================================================================
// Bindings
// =============================================================================

/// Variables visible to an expression: pattern variables bound to facts and
/// named values such as aggregate results.
///
/// Later bindings shadow earlier ones with the same name.
#[derive(Clone, Debug, Default)]
pub struct Bindings<'a> {
    facts: Vec<(&'a str, &'a Fact)>,
    values: Vec<(&'a str, &'a Value)>,
}

impl<'a> Bindings<'a> {
    /// Creates empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a pattern variable to a fact.
    pub fn bind_fact(&mut self, name: &'a str, fact: &'a Fact) {
        self.facts.push((name, fact));
    }

    /// Binds a named value.
    pub fn bind_value(&mut self, name: &'a str, value: &'a Value) {
        self.values.push((name, value));
    }

    /// Builder form of [`bind_fact`](Self::bind_fact).
    #[must_use]
    pub fn with_fact(mut self, name: &'a str, fact: &'a Fact) -> Self {
        self.bind_fact(name, fact);
        self
    }

    /// Builder form of [`bind_value`](Self::bind_value).
    #[must_use]
    pub fn with_value(mut self, name: &'a str, value: &'a Value) -> Self {
        self.bind_value(name, value);
        self
    }

    /// Returns the fact bound to a pattern variable.
    #[must_use]
    pub fn fact(&self, name: &str) -> Option<&'a Fact> {
        self.facts
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    /// Returns a named value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&'a Value> {
        self.values
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Drops the most recent fact binding.
    pub fn pop_fact(&mut self) {
        self.facts.pop();
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Tree-walking expression evaluator.
#[derive(Clone, Debug, Default)]
pub struct Evaluator {
    functions: FunctionTable,
}

impl Evaluator {
    /// Creates an evaluator with the built-in functions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an evaluator with a custom function table.
    #[must_use]
    pub fn with_functions(functions: FunctionTable) -> Self {
        Self { functions }
    }

    /// Returns the function table.
    #[must_use]
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Evaluates an expression to a value.
    ///
    /// # Errors
    /// `UnknownVariable`, `UnknownField`, `TypeMismatch`, `DivisionByZero`,
    /// `UnknownFunction` or `ArityMismatch`.
    pub fn evaluate(&self, expr: &Expr, bindings: &Bindings<'_>) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => {
                let mut values = im::Vector::new();
                for item in items {
                    values.push_back(self.evaluate(item, bindings)?);
                }
                Ok(Value::List(values))
            }
            Expr::Field { var, field } => {
                let fact = bindings
                    .fact(var)
                    .ok_or_else(|| Error::unknown_variable(&**var))?;
                fact.resolve(field)
                    .ok_or_else(|| Error::unknown_field(fact.type_name(), &**field))
            }
            Expr::Var(name) => bindings
                .value(name)
                .cloned()
                .ok_or_else(|| Error::unknown_variable(&**name)),
            Expr::Binary { op, lhs, rhs } => {
                let a = self.evaluate(lhs, bindings)?;
                let b = self.evaluate(rhs, bindings)?;
                apply(*op, &a, &b)
            }
            Expr::Not(inner) => Ok(Value::Bool(!self.truth("!", inner, bindings)?)),
            Expr::And(lhs, rhs) => Ok(Value::Bool(
                self.truth("&&", lhs, bindings)? && self.truth("&&", rhs, bindings)?,
            )),
            Expr::Or(lhs, rhs) => Ok(Value::Bool(
                self.truth("||", lhs, bindings)? || self.truth("||", rhs, bindings)?,
            )),
            Expr::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.evaluate(arg, bindings))
                    .collect::<Result<Vec<_>>>()?;
                self.functions.call(name, &values)
            }
        }
    }

    /// Evaluates a condition, which must produce a boolean.
    ///
    /// # Errors
    /// Any evaluation error, or `TypeMismatch` for a non-boolean result.
    pub fn test(&self, expr: &Expr, bindings: &Bindings<'_>) -> Result<bool> {
        self.truth("condition", expr, bindings)
    }

    /// Evaluates conditions left to right, stopping at the first false one.
    ///
    /// # Errors
    /// The first evaluation error encountered.
    pub fn test_all(&self, exprs: &[Expr], bindings: &Bindings<'_>) -> Result<bool> {
        for expr in exprs {
            if !self.test(expr, bindings)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn truth(&self, context: &str, expr: &Expr, bindings: &Bindings<'_>) -> Result<bool> {
        match self.evaluate(expr, bindings)? {
            Value::Bool(b) => Ok(b),
            other => Err(Error::type_mismatch(context, other.kind(), ValueKind::Bool)),
        }
    }
}

fn apply(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    match op {
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge => native::compare(op, a, b).map(Value::Bool),
        BinaryOp::Contains => native::contains(a, b).map(Value::Bool),
        BinaryOp::In => native::member_of(a, b).map(Value::Bool),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            native::arithmetic(op, a, b)
        }
    }
}
