//! String functions.

use trellis_foundation::{Error, Result, Value, ValueKind};

fn expect_str<'a>(function: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::type_mismatch(function, value.kind(), ValueKind::String))
}

/// `LENGTH(s)`: character count of a string, or element count of a list.
pub(super) fn length(args: &[Value]) -> Result<Value> {
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        other => return Err(Error::type_mismatch("LENGTH", other.kind(), ValueKind::String)),
    };
    Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
}

/// `UPPER(s)`
pub(super) fn upper(args: &[Value]) -> Result<Value> {
    Ok(Value::from(expect_str("UPPER", &args[0])?.to_uppercase()))
}

/// `LOWER(s)`
pub(super) fn lower(args: &[Value]) -> Result<Value> {
    Ok(Value::from(expect_str("LOWER", &args[0])?.to_lowercase()))
}

/// `TRIM(s)`
pub(super) fn trim(args: &[Value]) -> Result<Value> {
    Ok(Value::from(expect_str("TRIM", &args[0])?.trim()))
}

/// `SUBSTRING(s, start [, len])`, counting characters from zero. Out of
/// range bounds are clamped.
pub(super) fn substring(args: &[Value]) -> Result<Value> {
    let s = expect_str("SUBSTRING", &args[0])?;
    let index = |value: &Value| -> Result<usize> {
        let n = value
            .as_int()
            .ok_or_else(|| Error::type_mismatch("SUBSTRING", value.kind(), ValueKind::Int))?;
        Ok(usize::try_from(n.max(0)).unwrap_or(usize::MAX))
    };
    let start = index(&args[1])?;
    let len = match args.get(2) {
        Some(value) => index(value)?,
        None => usize::MAX,
    };
    Ok(Value::from(s.chars().skip(start).take(len).collect::<String>()))
}
