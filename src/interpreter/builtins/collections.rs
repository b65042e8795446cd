//! Length and indexing built-in functions.

use super::{exact_args, require_args};
use crate::value::Value;

pub fn builtin_len(args: &[Value]) -> Result<Value, String> {
    exact_args!(args, 1, "len");
    match &args[0] {
        Value::String(s) => Ok(Value::Int(s.len() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(map) => Ok(Value::Int(map.len() as i64)),
        Value::Nil => Err("len of nil pointer".to_string()),
        other => Err(format!("len of type {}", other.type_name())),
    }
}

fn position(index: &Value, len: usize) -> Result<usize, String> {
    match index {
        Value::Int(n) if *n < 0 || *n as usize >= len => {
            Err(format!("index out of range: {}", n))
        }
        Value::Int(n) => Ok(*n as usize),
        Value::Nil => Err("cannot index slice/array with nil".to_string()),
        other => Err(format!("cannot index slice/array with type {}", other.type_name())),
    }
}

fn index_one(item: &Value, key: &Value) -> Result<Value, String> {
    match item {
        Value::List(items) => {
            let i = position(key, items.len())?;
            Ok(items[i].clone())
        }
        Value::String(s) => {
            let i = position(key, s.len())?;
            Ok(Value::Int(i64::from(s.as_bytes()[i])))
        }
        Value::Map(map) => match key {
            Value::String(k) => Ok(map.get(k.as_ref()).cloned().unwrap_or(Value::Nil)),
            other => Err(format!(
                "value has type {}; should be string",
                other.type_name()
            )),
        },
        Value::Nil => Err("index of untyped nil".to_string()),
        other => Err(format!("can't index item of type {}", other.type_name())),
    }
}

/// `index x 1 2` is `x[1][2]`. A missing map key yields nil.
pub fn builtin_index(args: &[Value]) -> Result<Value, String> {
    require_args!(args, 1, "index");
    let mut item = args[0].clone();
    for key in &args[1..] {
        item = index_one(&item, key)?;
    }
    Ok(item)
}

/// `slice x 1 2` is `x[1:2]`; `slice x` is `x`. Lists also take a third
/// (capacity) index, which only bounds the other two.
pub fn builtin_slice(args: &[Value]) -> Result<Value, String> {
    require_args!(args, 1, "slice");
    let bounds = &args[1..];
    if bounds.len() > 3 {
        return Err(format!("too many slice indexes: {}", bounds.len()));
    }
    match &args[0] {
        Value::String(s) => {
            if bounds.len() == 3 {
                return Err("cannot 3-index slice a string".to_string());
            }
            let (low, high) = slice_bounds(bounds, s.len())?;
            s.get(low..high)
                .map(Value::string)
                .ok_or_else(|| format!("slice [{}:{}] splits a character", low, high))
        }
        Value::List(items) => {
            let (low, high) = slice_bounds(bounds, items.len())?;
            Ok(Value::list(items[low..high].iter().cloned()))
        }
        Value::Nil => Err("slice of untyped nil".to_string()),
        other => Err(format!("can't slice item of type {}", other.type_name())),
    }
}

fn slice_bounds(bounds: &[Value], len: usize) -> Result<(usize, usize), String> {
    let mut indexes = Vec::with_capacity(bounds.len());
    for bound in bounds {
        match bound {
            Value::Int(n) if *n >= 0 && *n as usize <= len => indexes.push(*n as usize),
            Value::Int(n) => return Err(format!("index out of range: {}", n)),
            other => {
                return Err(format!(
                    "cannot index slice/array with type {}",
                    other.type_name()
                ))
            }
        }
    }
    let low = indexes.first().copied().unwrap_or(0);
    let high = indexes.get(1).copied().unwrap_or(len);
    if low > high {
        return Err(format!("invalid slice index: {} > {}", low, high));
    }
    if let Some(cap) = indexes.get(2) {
        if high > *cap {
            return Err(format!("invalid slice index: {} > {}", high, cap));
        }
    }
    Ok((low, high))
}
