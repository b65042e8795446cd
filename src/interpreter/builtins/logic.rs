//! Truth and comparison built-in functions.

use super::{exact_args, require_args};
use crate::value::Value;
use std::cmp::Ordering;

/// First falsy argument, or the last one.
pub fn builtin_and(args: &[Value]) -> Result<Value, String> {
    require_args!(args, 1, "and");
    for arg in &args[..args.len() - 1] {
        if !arg.is_truthy() {
            return Ok(arg.clone());
        }
    }
    Ok(args[args.len() - 1].clone())
}

/// First truthy argument, or the last one.
pub fn builtin_or(args: &[Value]) -> Result<Value, String> {
    require_args!(args, 1, "or");
    for arg in &args[..args.len() - 1] {
        if arg.is_truthy() {
            return Ok(arg.clone());
        }
    }
    Ok(args[args.len() - 1].clone())
}

pub fn builtin_not(args: &[Value]) -> Result<Value, String> {
    exact_args!(args, 1, "not");
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn is_basic(value: &Value) -> bool {
    !matches!(value, Value::List(_) | Value::Map(_) | Value::Object(_))
}

fn values_equal(left: &Value, right: &Value) -> Result<bool, String> {
    if !is_basic(left) || !is_basic(right) {
        let culprit = if is_basic(left) { right } else { left };
        return Err(format!("non-comparable type {}", culprit.type_name()));
    }
    match (left, right) {
        (Value::Nil, Value::Nil) => Ok(true),
        (Value::Nil, _) | (_, Value::Nil) => Ok(false),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Int(a), Value::Float(b)) => Ok(*a as f64 == *b),
        (Value::Float(a), Value::Int(b)) => Ok(*a == *b as f64),
        (Value::Float(a), Value::Float(b)) => Ok(a == b),
        (Value::Complex(ar, ai), Value::Complex(br, bi)) => Ok(ar == br && ai == bi),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        _ => Err(format!(
            "incompatible types for comparison: {} and {}",
            left.type_name(),
            right.type_name()
        )),
    }
}

/// `None` when the values are unordered (NaN).
fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>, String> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
        (Value::Int(a), Value::Float(b)) => Ok((*a as f64).partial_cmp(b)),
        (Value::Float(a), Value::Int(b)) => Ok(a.partial_cmp(&(*b as f64))),
        (Value::Float(a), Value::Float(b)) => Ok(a.partial_cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        _ => {
            let orderable = |v: &Value| matches!(v, Value::Int(_) | Value::Float(_) | Value::String(_));
            if orderable(left) && orderable(right) {
                Err(format!(
                    "incompatible types for comparison: {} and {}",
                    left.type_name(),
                    right.type_name()
                ))
            } else {
                let culprit = if orderable(left) { right } else { left };
                Err(format!("invalid type for comparison: {}", culprit.type_name()))
            }
        }
    }
}

/// True when the first argument equals any of the others.
pub fn builtin_eq(args: &[Value]) -> Result<Value, String> {
    if args.len() < 2 {
        return Err("missing argument for comparison".to_string());
    }
    for other in &args[1..] {
        if values_equal(&args[0], other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

pub fn builtin_ne(args: &[Value]) -> Result<Value, String> {
    exact_args!(args, 2, "ne");
    Ok(Value::Bool(!values_equal(&args[0], &args[1])?))
}

pub fn builtin_lt(args: &[Value]) -> Result<Value, String> {
    exact_args!(args, 2, "lt");
    Ok(Value::Bool(compare(&args[0], &args[1])? == Some(Ordering::Less)))
}

pub fn builtin_le(args: &[Value]) -> Result<Value, String> {
    exact_args!(args, 2, "le");
    let ordering = compare(&args[0], &args[1])?;
    Ok(Value::Bool(matches!(
        ordering,
        Some(Ordering::Less | Ordering::Equal)
    )))
}

pub fn builtin_gt(args: &[Value]) -> Result<Value, String> {
    exact_args!(args, 2, "gt");
    Ok(Value::Bool(compare(&args[0], &args[1])? == Some(Ordering::Greater)))
}

pub fn builtin_ge(args: &[Value]) -> Result<Value, String> {
    exact_args!(args, 2, "ge");
    let ordering = compare(&args[0], &args[1])?;
    Ok(Value::Bool(matches!(
        ordering,
        Some(Ordering::Greater | Ordering::Equal)
    )))
}
