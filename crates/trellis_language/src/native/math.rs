//! Numeric functions.

use std::cmp::Ordering;

use trellis_foundation::{Error, Result, Value, ValueKind};

use crate::ast::BinaryOp;

fn not_numeric(function: &str, value: &Value) -> Error {
    Error::type_mismatch(function, value.kind(), ValueKind::Float)
}

/// `ABS(x)`; integers saturate at `i64::MAX`.
pub(super) fn abs(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.saturating_abs())),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(not_numeric("ABS", other)),
    }
}

fn rounding(function: &str, value: &Value, f: fn(f64) -> f64) -> Result<Value> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => Ok(Value::Float(f(*n))),
        other => Err(not_numeric(function, other)),
    }
}

/// `ROUND(x)`, half away from zero.
pub(super) fn round(args: &[Value]) -> Result<Value> {
    rounding("ROUND", &args[0], f64::round)
}

/// `FLOOR(x)`
pub(super) fn floor(args: &[Value]) -> Result<Value> {
    rounding("FLOOR", &args[0], f64::floor)
}

/// `CEIL(x)`
pub(super) fn ceil(args: &[Value]) -> Result<Value> {
    rounding("CEIL", &args[0], f64::ceil)
}

fn extreme(function: &str, args: &[Value], keep: Ordering) -> Result<Value> {
    if let Some(bad) = args.iter().find(|v| !v.is_numeric() && v.as_str().is_none()) {
        return Err(not_numeric(function, bad));
    }
    let mut best = &args[0];
    for candidate in &args[1..] {
        let ordering = super::compare_values(BinaryOp::Lt, candidate, best)
            .map_err(|_| Error::type_mismatch(function, candidate.kind(), best.kind()))?;
        if ordering == Some(keep) {
            best = candidate;
        }
    }
    Ok(best.clone())
}

/// `MIN(a, b, ...)` over numbers or strings. Returns the first smallest
/// argument unchanged.
pub(super) fn min(args: &[Value]) -> Result<Value> {
    extreme("MIN", args, Ordering::Less)
}

/// `MAX(a, b, ...)` over numbers or strings.
pub(super) fn max(args: &[Value]) -> Result<Value> {
    extreme("MAX", args, Ordering::Greater)
}
