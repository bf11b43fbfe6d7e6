//! Accumulate nodes: per-token aggregates over matching facts.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use trellis_foundation::{DiagnosticCode, Value};
use trellis_language::{AggregateFn, Expr};

use crate::memory::WorkingMemory;
use crate::registry::FactKey;
use crate::token::TokenId;

/// Per-left-token state.
#[derive(Clone, Debug, Default)]
pub struct AccumulateState {
    /// Right facts passing the filter, in assertion order.
    pub matched: BTreeSet<FactKey>,
    /// Enriched child token currently emitted for this token.
    pub output: Option<TokenId>,
}

/// Computes an aggregate for each left token and emits the token enriched
/// with the result under `name`.
#[derive(Clone, Debug)]
pub struct AccumulateNode {
    /// Name of the synthetic value.
    pub name: Arc<str>,
    /// Aggregate function.
    pub function: AggregateFn,
    /// Variable bound to the right fact while filtering.
    pub variable: Arc<str>,
    /// Aggregated field, `None` for `COUNT`.
    pub field: Option<Arc<str>>,
    /// Filter conditions, sorted by canonical text.
    pub conditions: Vec<Expr>,
    /// Left tokens and their matched facts.
    pub left: WorkingMemory<TokenId, AccumulateState>,
    /// Right facts.
    pub right: WorkingMemory<FactKey, ()>,
}

impl AccumulateNode {
    pub(crate) fn new(
        name: Arc<str>,
        function: AggregateFn,
        variable: Arc<str>,
        field: Option<Arc<str>>,
        mut conditions: Vec<Expr>,
    ) -> Self {
        conditions.sort_by_cached_key(Expr::canonical);
        Self {
            name,
            function,
            variable,
            field,
            conditions,
            left: WorkingMemory::new(),
            right: WorkingMemory::new(),
        }
    }

    pub(crate) fn label(&self) -> String {
        format!(
            "accumulate {} = {} over {} {}",
            self.name,
            self.function,
            self.variable,
            super::render_conditions(&self.conditions)
        )
    }
}

/// Result of folding matched values.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    /// Value to emit, or `None` to suppress emission.
    pub value: Option<Value>,
    /// Problems met while folding.
    pub notes: Vec<(DiagnosticCode, String)>,
}

impl Aggregate {
    /// Folds the field values of the matched facts, in assertion order.
    /// `COUNT` only looks at how many values there are.
    #[must_use]
    pub fn compute(function: AggregateFn, values: &[Value]) -> Self {
        match function {
            AggregateFn::Count => Self {
                value: Some(Value::Int(i64::try_from(values.len()).unwrap_or(i64::MAX))),
                notes: Vec::new(),
            },
            AggregateFn::Sum => {
                let (sum, _, notes) = numeric_sum(values);
                Self {
                    value: Some(Value::Float(sum)),
                    notes,
                }
            }
            AggregateFn::Avg => {
                let (sum, count, notes) = numeric_sum(values);
                #[allow(clippy::cast_precision_loss)]
                let value = if count == 0 {
                    Value::Null
                } else {
                    Value::Float(sum / count as f64)
                };
                Self {
                    value: Some(value),
                    notes,
                }
            }
            AggregateFn::Min => Self::extreme(values, Ordering::Less),
            AggregateFn::Max => Self::extreme(values, Ordering::Greater),
        }
    }

    // Numbers dominate strings; other kinds never take part. Ties keep the
    // earliest value.
    fn extreme(values: &[Value], keep: Ordering) -> Self {
        let numeric = values.iter().any(Value::is_numeric);
        let mut best: Option<&Value> = None;
        for value in values {
            let eligible = if numeric {
                value.is_numeric()
            } else {
                value.as_str().is_some()
            };
            if !eligible {
                continue;
            }
            best = match best {
                Some(current) if value.partial_cmp(current) != Some(keep) => Some(current),
                _ => Some(value),
            };
        }
        Self {
            value: best.cloned(),
            notes: Vec::new(),
        }
    }
}

fn numeric_sum(values: &[Value]) -> (f64, usize, Vec<(DiagnosticCode, String)>) {
    let mut notes = Vec::new();
    let mut sum = 0.0_f64;
    let mut count = 0;
    let mut saturated = false;
    for value in values {
        match value.as_number() {
            Some(n) => {
                sum += n;
                count += 1;
                if sum.is_infinite() {
                    sum = f64::MAX.copysign(sum);
                    saturated = true;
                }
            }
            None if value.is_null() => {}
            None => notes.push((
                DiagnosticCode::TypeMismatch,
                format!("skipped non-numeric {} value {value:?}", value.kind()),
            )),
        }
    }
    if saturated {
        notes.push((
            DiagnosticCode::AggregateOverflow,
            format!("sum saturated at {sum:e}"),
        ));
    }
    (sum, count, notes)
}
