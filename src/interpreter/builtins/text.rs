//! Formatting and escaping built-in functions.

use super::require_args;
use crate::format::{sprint, sprintf, sprintln};
use crate::value::Value;
use std::fmt::Write;

pub fn builtin_print(args: &[Value]) -> Result<Value, String> {
    Ok(Value::string(sprint(args)))
}

pub fn builtin_println(args: &[Value]) -> Result<Value, String> {
    Ok(Value::string(sprintln(args)))
}

pub fn builtin_printf(args: &[Value]) -> Result<Value, String> {
    require_args!(args, 1, "printf");
    match &args[0] {
        Value::String(format) => Ok(Value::string(sprintf(format, &args[1..]))),
        other => Err(format!(
            "format must be a string, got {}",
            other.type_name()
        )),
    }
}

/// A lone string argument is escaped as-is; anything else goes through `print` first.
fn escape_input(args: &[Value]) -> String {
    match args {
        [Value::String(s)] => s.to_string(),
        _ => sprint(args),
    }
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
    out
}

pub fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '=' => out.push_str("\\u003D"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn url_query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

pub fn builtin_html(args: &[Value]) -> Result<Value, String> {
    Ok(Value::string(html_escape(&escape_input(args))))
}

pub fn builtin_js(args: &[Value]) -> Result<Value, String> {
    Ok(Value::string(js_escape(&escape_input(args))))
}

pub fn builtin_urlquery(args: &[Value]) -> Result<Value, String> {
    Ok(Value::string(url_query_escape(&escape_input(args))))
}
