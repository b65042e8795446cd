//! The default function table.
//!
//! Functions are organized into categories:
//! - **Logic**: truth and comparison (and, or, not, eq, ne, lt, le, gt, ge)
//! - **Collections**: length and indexing (len, index, slice)
//! - **Text**: formatting and escaping (print, printf, println, html, js, urlquery)
//!
//! Every function takes its evaluated arguments and returns a value or a
//! message; the executor attaches the function name and position.

mod collections;
mod logic;
mod text;

pub use collections::*;
pub use logic::*;
pub use text::*;

use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// A template-callable function.
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Function name to implementation. Names must be registered before parsing
/// any template that calls them.
pub type FuncMap = IndexMap<String, Function>;

macro_rules! require_args {
    ($args:expr, $n:expr, $name:expr) => {
        if $args.len() < $n {
            return Err(format!(
                "wrong number of args for {}: want at least {} got {}",
                $name,
                $n,
                $args.len()
            ));
        }
    };
}

macro_rules! exact_args {
    ($args:expr, $n:expr, $name:expr) => {
        if $args.len() != $n {
            return Err(format!(
                "wrong number of args for {}: want {} got {}",
                $name,
                $n,
                $args.len()
            ));
        }
    };
}

pub(crate) use exact_args;
pub(crate) use require_args;

fn register(funcs: &mut FuncMap, name: &str, f: fn(&[Value]) -> Result<Value, String>) {
    funcs.insert(name.to_string(), Arc::new(f));
}

pub fn default_functions() -> FuncMap {
    let mut funcs = FuncMap::new();
    register(&mut funcs, "and", builtin_and);
    register(&mut funcs, "or", builtin_or);
    register(&mut funcs, "not", builtin_not);
    register(&mut funcs, "len", builtin_len);
    register(&mut funcs, "index", builtin_index);
    register(&mut funcs, "slice", builtin_slice);
    register(&mut funcs, "print", builtin_print);
    register(&mut funcs, "printf", builtin_printf);
    register(&mut funcs, "println", builtin_println);
    register(&mut funcs, "eq", builtin_eq);
    register(&mut funcs, "ne", builtin_ne);
    register(&mut funcs, "lt", builtin_lt);
    register(&mut funcs, "le", builtin_le);
    register(&mut funcs, "gt", builtin_gt);
    register(&mut funcs, "ge", builtin_ge);
    register(&mut funcs, "html", builtin_html);
    register(&mut funcs, "js", builtin_js);
    register(&mut funcs, "urlquery", builtin_urlquery);
    funcs
}
