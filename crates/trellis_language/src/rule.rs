//! Rule AST: patterns, conditions, sub-patterns and actions.

use std::fmt;
use std::sync::Arc;

use crate::ast::Expr;

/// A pattern variable bound to facts of one type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypedVariable {
    /// Variable name.
    pub name: Arc<str>,
    /// Type name.
    pub type_name: Arc<str>,
}

impl TypedVariable {
    /// Creates a typed variable.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, type_name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

impl fmt::Display for TypedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_name)
    }
}

/// Body of a `NOT(...)` or `EXISTS(...)` clause.
///
/// With a variable, the clause ranges over facts of that type. Without one,
/// it is a plain test on the variables bound so far.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantified {
    /// Variable ranging over the tested facts, if any.
    pub variable: Option<TypedVariable>,
    /// Conditions, ANDed.
    pub conditions: Vec<Expr>,
}

/// Aggregate functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    /// Sum of a numeric field.
    Sum,
    /// Mean of a numeric field.
    Avg,
    /// Smallest value of a field.
    Min,
    /// Largest value of a field.
    Max,
    /// Number of matching facts.
    Count,
}

impl AggregateFn {
    /// Returns the upper-case function name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Count => "COUNT",
        }
    }

    /// Returns true if the function reads a field.
    #[must_use]
    pub const fn needs_field(self) -> bool {
        !matches!(self, Self::Count)
    }

    /// Returns true if the field must be numeric.
    #[must_use]
    pub const fn needs_numeric(self) -> bool {
        matches!(self, Self::Sum | Self::Avg)
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregation over the facts of one type.
///
/// The result is exposed to later conditions and action arguments as the
/// named value [`Accumulation::name`].
#[derive(Clone, Debug, PartialEq)]
pub struct Accumulation {
    /// Name of the synthetic value carrying the result.
    pub name: Arc<str>,
    /// Aggregate function.
    pub function: AggregateFn,
    /// Variable ranging over the aggregated facts.
    pub variable: TypedVariable,
    /// Aggregated field. `None` for `COUNT`.
    pub field: Option<Arc<str>>,
    /// Filter on the aggregated facts, ANDed.
    pub conditions: Vec<Expr>,
}

impl Accumulation {
    /// Creates an accumulation named after its own text, e.g. `SUM(o.amount)`.
    #[must_use]
    pub fn new(
        function: AggregateFn,
        variable: TypedVariable,
        field: Option<impl Into<Arc<str>>>,
    ) -> Self {
        let field = field.map(Into::into);
        let name = match &field {
            Some(field) => format!("{function}({}.{field})", variable.name),
            None => format!("{function}({})", variable.name),
        };
        Self {
            name: name.into(),
            function,
            variable,
            field,
            conditions: Vec::new(),
        }
    }

    /// `SUM(var.field)`
    #[must_use]
    pub fn sum(var: &str, type_name: &str, field: &str) -> Self {
        Self::new(AggregateFn::Sum, TypedVariable::new(var, type_name), Some(field))
    }

    /// `AVG(var.field)`
    #[must_use]
    pub fn avg(var: &str, type_name: &str, field: &str) -> Self {
        Self::new(AggregateFn::Avg, TypedVariable::new(var, type_name), Some(field))
    }

    /// `MIN(var.field)`
    #[must_use]
    pub fn min(var: &str, type_name: &str, field: &str) -> Self {
        Self::new(AggregateFn::Min, TypedVariable::new(var, type_name), Some(field))
    }

    /// `MAX(var.field)`
    #[must_use]
    pub fn max(var: &str, type_name: &str, field: &str) -> Self {
        Self::new(AggregateFn::Max, TypedVariable::new(var, type_name), Some(field))
    }

    /// `COUNT(var)`
    #[must_use]
    pub fn count(var: &str, type_name: &str) -> Self {
        Self::new(AggregateFn::Count, TypedVariable::new(var, type_name), None::<&str>)
    }

    /// Renames the result value.
    #[must_use]
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a filter condition.
    #[must_use]
    pub fn filter(mut self, condition: Expr) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// A clause embedded in a rule after its patterns.
#[derive(Clone, Debug, PartialEq)]
pub enum SubPattern {
    /// Matches when nothing satisfies the body.
    Not(Quantified),
    /// Matches when something satisfies the body.
    Exists(Quantified),
    /// Computes an aggregate.
    Accumulate(Accumulation),
}

impl SubPattern {
    /// Returns the variable introduced by this clause, if any.
    #[must_use]
    pub fn variable(&self) -> Option<&TypedVariable> {
        match self {
            Self::Not(q) | Self::Exists(q) => q.variable.as_ref(),
            Self::Accumulate(acc) => Some(&acc.variable),
        }
    }

    /// Returns the clause's own conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Expr] {
        match self {
            Self::Not(q) | Self::Exists(q) => &q.conditions,
            Self::Accumulate(acc) => &acc.conditions,
        }
    }
}

/// What a rule does when it matches: a name plus argument expressions
/// evaluated against the matching facts.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    /// Action name.
    pub name: Arc<str>,
    /// Argument expressions.
    pub args: Vec<Expr>,
}

impl Action {
    /// Creates an action.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = Expr>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A compiled-in rule.
///
/// # Example
///
/// ```
/// use trellis_language::{Expr, Rule};
///
/// let rule = Rule::new("adult")
///     .pattern("u", "User")
///     .when(Expr::field("u", "age").ge(18))
///     .then("adult", [Expr::field("u", "id")]);
/// assert_eq!(rule.patterns.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Unique rule name.
    pub name: Arc<str>,
    /// Patterns in declaration order.
    pub patterns: Vec<TypedVariable>,
    /// Conditions over pattern variables and aggregate values.
    pub conditions: Vec<Expr>,
    /// `NOT`, `EXISTS` and accumulation clauses in declaration order.
    pub sub_patterns: Vec<SubPattern>,
    /// Action emitted on activation.
    pub action: Action,
}

impl Rule {
    /// Creates a rule with no patterns whose action shares its name and
    /// takes no arguments.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        Self {
            action: Action::new(name.clone(), []),
            name,
            patterns: Vec::new(),
            conditions: Vec::new(),
            sub_patterns: Vec::new(),
        }
    }

    /// Adds a pattern.
    #[must_use]
    pub fn pattern(mut self, var: impl Into<Arc<str>>, type_name: impl Into<Arc<str>>) -> Self {
        self.patterns.push(TypedVariable::new(var, type_name));
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn when(mut self, condition: Expr) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds `NOT(conditions)` over the variables bound so far.
    #[must_use]
    pub fn not(mut self, conditions: impl IntoIterator<Item = Expr>) -> Self {
        self.sub_patterns.push(SubPattern::Not(Quantified {
            variable: None,
            conditions: conditions.into_iter().collect(),
        }));
        self
    }

    /// Adds `NOT(var: type / conditions)`.
    #[must_use]
    pub fn not_matching(
        mut self,
        var: impl Into<Arc<str>>,
        type_name: impl Into<Arc<str>>,
        conditions: impl IntoIterator<Item = Expr>,
    ) -> Self {
        self.sub_patterns.push(SubPattern::Not(Quantified {
            variable: Some(TypedVariable::new(var, type_name)),
            conditions: conditions.into_iter().collect(),
        }));
        self
    }

    /// Adds `EXISTS(conditions)` over the variables bound so far.
    #[must_use]
    pub fn exists(mut self, conditions: impl IntoIterator<Item = Expr>) -> Self {
        self.sub_patterns.push(SubPattern::Exists(Quantified {
            variable: None,
            conditions: conditions.into_iter().collect(),
        }));
        self
    }

    /// Adds `EXISTS(var: type / conditions)`.
    #[must_use]
    pub fn exists_matching(
        mut self,
        var: impl Into<Arc<str>>,
        type_name: impl Into<Arc<str>>,
        conditions: impl IntoIterator<Item = Expr>,
    ) -> Self {
        self.sub_patterns.push(SubPattern::Exists(Quantified {
            variable: Some(TypedVariable::new(var, type_name)),
            conditions: conditions.into_iter().collect(),
        }));
        self
    }

    /// Adds an accumulation.
    #[must_use]
    pub fn accumulate(mut self, accumulation: Accumulation) -> Self {
        self.sub_patterns.push(SubPattern::Accumulate(accumulation));
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn then(mut self, name: impl Into<Arc<str>>, args: impl IntoIterator<Item = Expr>) -> Self {
        self.action = Action::new(name, args);
        self
    }
}

/// Ordered collection of rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule (builder form).
    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Adds a rule.
    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| &*r.name == name)
    }

    /// Iterates rules in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
