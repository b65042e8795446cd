//! `fmt`-style formatting for the `print`, `printf` and `println` functions.
//!
//! Format strings are split into literal runs and `%` directives with a
//! small chumsky grammar; each directive is then applied to one argument.
//! Mismatches never fail: they render inline as `%!verb(type=value)`, the way
//! the text/template family reports them.

use crate::value::{format_complex, format_float, Value};
use chumsky::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub minus: bool,
    pub plus: bool,
    pub sharp: bool,
    pub zero: bool,
    pub space: bool,
}

impl Flags {
    fn from_chars(flags: &str) -> Self {
        let mut parsed = Flags::default();
        for c in flags.chars() {
            match c {
                '-' => parsed.minus = true,
                '+' => parsed.plus = true,
                '#' => parsed.sharp = true,
                '0' => parsed.zero = true,
                ' ' => parsed.space = true,
                _ => {}
            }
        }
        parsed
    }
}

/// Width or precision: a literal number or `*` (taken from the arguments).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Fixed(usize),
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub flags: Flags,
    pub width: Option<Count>,
    pub precision: Option<Count>,
    /// `None` for a `%` at the very end of the format.
    pub verb: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Literal(String),
    Directive(Directive),
}

fn format_parser<'a>() -> impl Parser<'a, &'a str, Vec<Piece>, extra::Err<Simple<'a, char>>> {
    let literal = none_of("%")
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(Piece::Literal);

    let percent = just("%%").to(Piece::Literal("%".to_string()));

    let count = choice((
        just('*').to(Count::Star),
        text::digits(10)
            .to_slice()
            .map(|s: &str| Count::Fixed(s.parse().unwrap_or(usize::MAX))),
    ));

    let directive = just('%')
        .ignore_then(one_of("-+# 0").repeated().collect::<String>())
        .then(count.clone().or_not())
        .then(just('.').ignore_then(count.or_not()).or_not())
        .then(any().or_not())
        .map(|(((flags, width), precision), verb)| {
            Piece::Directive(Directive {
                flags: Flags::from_chars(&flags),
                width,
                // A bare "." means precision zero.
                precision: precision.map(|p| p.unwrap_or(Count::Fixed(0))),
                verb,
            })
        });

    choice((percent, directive, literal))
        .repeated()
        .collect()
        .then_ignore(end())
}

/// Split a format string into literal text and directives.
pub fn parse_format(format: &str) -> Vec<Piece> {
    format_parser()
        .parse(format)
        .into_output()
        .unwrap_or_else(|| vec![Piece::Literal(format.to_string())])
}

/// Resolved directive options after `*` counts have been read.
#[derive(Debug, Clone, Copy, Default)]
struct Spec {
    flags: Flags,
    width: Option<usize>,
    precision: Option<usize>,
}

pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut next_arg = 0;
    for piece in parse_format(format) {
        let directive = match piece {
            Piece::Literal(text) => {
                out.push_str(&text);
                continue;
            }
            Piece::Directive(directive) => directive,
        };
        let Some(verb) = directive.verb else {
            out.push_str("%!(NOVERB)");
            continue;
        };
        let mut spec = Spec {
            flags: directive.flags,
            ..Spec::default()
        };
        match resolve_count(directive.width, args, &mut next_arg) {
            Ok(width) => spec.width = width,
            Err(()) => out.push_str("%!(BADWIDTH)"),
        }
        match resolve_count(directive.precision, args, &mut next_arg) {
            Ok(precision) => spec.precision = precision,
            Err(()) => out.push_str("%!(BADPREC)"),
        }
        let Some(arg) = args.get(next_arg) else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        next_arg += 1;
        out.push_str(&format_value(arg, verb, &spec));
    }
    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|arg| match arg {
                Value::Nil => "<nil>".to_string(),
                other => format!("{}={}", other.type_name(), other),
            })
            .collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

/// Widths and precisions above this are rejected rather than allocated.
const MAX_COUNT: usize = 1_000_000;

fn resolve_count(
    count: Option<Count>,
    args: &[Value],
    next_arg: &mut usize,
) -> Result<Option<usize>, ()> {
    let n = match count {
        None => return Ok(None),
        Some(Count::Fixed(n)) => n,
        Some(Count::Star) => {
            let arg = args.get(*next_arg).ok_or(())?;
            *next_arg += 1;
            match arg {
                Value::Int(n) => usize::try_from(*n).map_err(|_| ())?,
                _ => return Err(()),
            }
        }
    };
    if n > MAX_COUNT {
        return Err(());
    }
    Ok(Some(n))
}

/// Operands joined with spaces where neither side is a string.
pub fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_string = matches!(arg, Value::String(_));
        if i > 0 && !is_string && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        out.push_str(&format_value(arg, 'v', &Spec::default()));
    }
    out
}

/// Operands always joined with spaces, plus a trailing newline.
pub fn sprintln(args: &[Value]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| format_value(arg, 'v', &Spec::default()))
        .collect();
    format!("{}\n", parts.join(" "))
}

fn bad_verb(verb: char, value: &Value) -> String {
    match value {
        Value::Nil => format!("%!{}(<nil>)", verb),
        other => format!("%!{}({}={})", verb, other.type_name(), other),
    }
}

fn format_value(value: &Value, verb: char, spec: &Spec) -> String {
    if verb == 'T' {
        return pad(value.type_name(), spec);
    }
    match value {
        Value::Nil => match verb {
            'v' => pad("<nil>", spec),
            _ => bad_verb(verb, value),
        },
        Value::Bool(b) => match verb {
            'v' | 't' => pad(&b.to_string(), spec),
            _ => bad_verb(verb, value),
        },
        Value::Int(n) => format_int(*n, verb, spec).unwrap_or_else(|| bad_verb(verb, value)),
        Value::Float(x) => format_float_verb(*x, verb, spec).unwrap_or_else(|| bad_verb(verb, value)),
        Value::Complex(re, im) => {
            if verb == 'v' && spec.precision.is_none() {
                return pad(&format_complex(*re, *im), spec);
            }
            let inner = Spec {
                width: None,
                ..*spec
            };
            let forced = Spec {
                flags: Flags {
                    plus: true,
                    ..inner.flags
                },
                ..inner
            };
            match (format_float_verb(*re, verb, &inner), format_float_verb(*im, verb, &forced)) {
                (Some(re), Some(im)) => pad(&format!("({}{}i)", re, im), spec),
                _ => bad_verb(verb, value),
            }
        }
        Value::String(s) => format_string(s, verb, spec).unwrap_or_else(|| bad_verb(verb, value)),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(|item| format_value(item, verb, spec)).collect();
            format!("[{}]", parts.join(" "))
        }
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    let key_text = format_string(key, verb, spec).unwrap_or_else(|| key.to_string());
                    format!("{}:{}", key_text, format_value(&map[key], verb, spec))
                })
                .collect();
            format!("map[{}]", parts.join(" "))
        }
        Value::Object(object) => {
            let parts: Vec<String> = object
                .fields()
                .iter()
                .map(|member| format_value(member, verb, spec))
                .collect();
            format!("{{{}}}", parts.join(" "))
        }
    }
}

fn format_int(n: i64, verb: char, spec: &Spec) -> Option<String> {
    let magnitude = n.unsigned_abs();
    let flags = spec.flags;
    match verb {
        'c' => {
            let c = u32::try_from(n).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
            return Some(pad(&c.to_string(), spec));
        }
        'q' => {
            let c = u32::try_from(n).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
            return Some(pad(&quote_char(c), spec));
        }
        'U' => {
            let mut text = format!("U+{:04X}", magnitude);
            if flags.sharp {
                if let Some(c) = u32::try_from(n).ok().and_then(char::from_u32) {
                    text.push_str(&format!(" '{}'", c));
                }
            }
            return Some(pad(&text, spec));
        }
        _ => {}
    }
    let mut digits = match verb {
        'd' | 'v' => magnitude.to_string(),
        'b' => format!("{:b}", magnitude),
        'o' | 'O' => format!("{:o}", magnitude),
        'x' => format!("{:x}", magnitude),
        'X' => format!("{:X}", magnitude),
        _ => return None,
    };
    if let Some(precision) = spec.precision {
        if precision == 0 && n == 0 {
            digits.clear();
        } else if digits.len() < precision {
            digits = format!("{}{}", "0".repeat(precision - digits.len()), digits);
        }
    }
    let prefix = match verb {
        'O' => "0o",
        'b' if flags.sharp => "0b",
        'o' if flags.sharp && !digits.starts_with('0') => "0",
        'x' if flags.sharp => "0x",
        'X' if flags.sharp => "0X",
        _ => "",
    };
    let sign = sign_for(n < 0, flags);
    // Zero padding is ignored once a precision is given.
    let zero = flags.zero && spec.precision.is_none();
    Some(pad_number(sign, &format!("{}{}", prefix, digits), spec, zero))
}

fn sign_for(negative: bool, flags: Flags) -> &'static str {
    if negative {
        "-"
    } else if flags.plus {
        "+"
    } else if flags.space {
        " "
    } else {
        ""
    }
}

fn format_float_verb(x: f64, verb: char, spec: &Spec) -> Option<String> {
    let flags = spec.flags;
    if !x.is_finite() {
        if !matches!(verb, 'v' | 'e' | 'E' | 'f' | 'F' | 'g' | 'G') {
            return None;
        }
        let text = if x.is_nan() {
            if flags.plus {
                "+NaN"
            } else if flags.space {
                " NaN"
            } else {
                "NaN"
            }
        } else if x < 0.0 {
            "-Inf"
        } else if flags.space && !flags.plus {
            " Inf"
        } else {
            "+Inf"
        };
        let unpadded = Spec {
            flags: Flags {
                zero: false,
                ..flags
            },
            ..*spec
        };
        return Some(pad(text, &unpadded));
    }
    let negative = x.is_sign_negative();
    let magnitude = x.abs();
    let body = match verb {
        'v' | 'g' | 'G' => {
            let text = match spec.precision {
                None => format_float(magnitude),
                Some(precision) => format_general(magnitude, precision),
            };
            if verb == 'G' {
                text.to_uppercase()
            } else {
                text
            }
        }
        'f' | 'F' => format!("{:.*}", spec.precision.unwrap_or(6), magnitude),
        'e' | 'E' => {
            let text = format_exponent(magnitude, spec.precision.unwrap_or(6));
            if verb == 'E' {
                text.to_uppercase()
            } else {
                text
            }
        }
        _ => return None,
    };
    let sign = sign_for(negative, flags);
    Some(pad_number(sign, &body, spec, flags.zero))
}

/// `%e` with Go's two-digit minimum exponent.
fn format_exponent(x: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, x);
    let (mantissa, exp) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
}

/// `%.Ng`: N significant digits, exponent form when the exponent is below -4
/// or at least N, trailing zeros removed.
fn format_general(x: f64, precision: usize) -> String {
    let precision = precision.max(1);
    let rounded = format!("{:.*e}", precision - 1, x);
    let exp: i32 = rounded
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0);
    if exp < -4 || exp >= precision as i32 {
        let text = format_exponent(x, precision - 1);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{}", trim_fraction(mantissa), exp),
            None => text,
        }
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn format_string(s: &str, verb: char, spec: &Spec) -> Option<String> {
    let truncated: String = match spec.precision {
        Some(precision) => s.chars().take(precision).collect(),
        None => s.to_string(),
    };
    let text = match verb {
        's' | 'v' => truncated,
        'q' => {
            if spec.flags.sharp && !truncated.contains('`') && !truncated.chars().any(char::is_control) {
                format!("`{}`", truncated)
            } else {
                quote(&truncated, spec.flags.plus)
            }
        }
        'x' | 'X' => {
            let separator = if spec.flags.space { " " } else { "" };
            let bytes: Vec<String> = truncated
                .bytes()
                .map(|b| {
                    let prefix = if spec.flags.sharp { "0x" } else { "" };
                    if verb == 'x' {
                        format!("{}{:02x}", prefix, b)
                    } else {
                        format!("{}{:02X}", prefix.to_uppercase(), b)
                    }
                })
                .collect();
            bytes.join(separator)
        }
        _ => return None,
    };
    Some(pad(&text, spec))
}

/// Double-quoted with Go escapes. `ascii_only` escapes everything non-ASCII.
pub fn quote(s: &str, ascii_only: bool) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        push_escaped(&mut out, c, '"', ascii_only);
    }
    out.push('"');
    out
}

fn quote_char(c: char) -> String {
    let mut out = String::from("'");
    push_escaped(&mut out, c, '\'', false);
    out.push('\'');
    out
}

fn push_escaped(out: &mut String, c: char, quote: char, ascii_only: bool) {
    match c {
        '\u{7}' => out.push_str("\\a"),
        '\u{8}' => out.push_str("\\b"),
        '\u{c}' => out.push_str("\\f"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{b}' => out.push_str("\\v"),
        '\\' => out.push_str("\\\\"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
        c if c.is_control() || (ascii_only && !c.is_ascii()) => {
            if (c as u32) <= 0xFFFF {
                out.push_str(&format!("\\u{:04x}", c as u32));
            } else {
                out.push_str(&format!("\\U{:08x}", c as u32));
            }
        }
        c => out.push(c),
    }
}

fn pad(text: &str, spec: &Spec) -> String {
    let Some(width) = spec.width else {
        return text.to_string();
    };
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let fill = width - len;
    if spec.flags.minus {
        format!("{}{}", text, " ".repeat(fill))
    } else if spec.flags.zero {
        format!("{}{}", "0".repeat(fill), text)
    } else {
        format!("{}{}", " ".repeat(fill), text)
    }
}

/// Pad a number, putting zero fill between the sign and the digits.
fn pad_number(sign: &str, body: &str, spec: &Spec, zero: bool) -> String {
    match spec.width {
        Some(width) if zero && !spec.flags.minus => {
            let len = sign.chars().count() + body.chars().count();
            let fill = width.saturating_sub(len);
            format!("{}{}{}", sign, "0".repeat(fill), body)
        }
        _ => {
            let no_zero = Spec {
                flags: Flags {
                    zero: false,
                    ..spec.flags
                },
                ..*spec
            };
            pad(&format!("{}{}", sign, body), &no_zero)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    #[test]
    fn test_parse_format_pieces() {
        let pieces = parse_format("a%-5.2fb%%");
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces[0], Piece::Literal("a".to_string()));
        assert_eq!(
            pieces[1],
            Piece::Directive(Directive {
                flags: Flags {
                    minus: true,
                    ..Flags::default()
                },
                width: Some(Count::Fixed(5)),
                precision: Some(Count::Fixed(2)),
                verb: Some('f'),
            })
        );
        assert_eq!(pieces[3], Piece::Literal("%".to_string()));
    }

    #[test]
    fn test_basic_verbs() {
        assert_eq!(sprintf("%s!", &[s("X")]), "X!");
        assert_eq!(sprintf("%d-%v", &[Value::Int(3), Value::Bool(true)]), "3-true");
        assert_eq!(sprintf("%q", &[s("a\"b\n")]), r#""a\"b\n""#);
        assert_eq!(sprintf("%x %X", &[Value::Int(255), s("hi")]), "ff 6869");
        assert_eq!(sprintf("%o %b %c", &[Value::Int(8), Value::Int(5), Value::Int(65)]), "10 101 A");
        assert_eq!(sprintf("%T %T", &[Value::Int(1), s("")]), "int string");
        assert_eq!(sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn test_width_and_flags() {
        assert_eq!(sprintf("[%5d]", &[Value::Int(42)]), "[   42]");
        assert_eq!(sprintf("[%-5d]", &[Value::Int(42)]), "[42   ]");
        assert_eq!(sprintf("[%05d]", &[Value::Int(-42)]), "[-0042]");
        assert_eq!(sprintf("[%+d]", &[Value::Int(7)]), "[+7]");
        assert_eq!(sprintf("[%#x]", &[Value::Int(255)]), "[0xff]");
        assert_eq!(sprintf("[%6s]", &[s("ab")]), "[    ab]");
        assert_eq!(sprintf("[%.2s]", &[s("abcdef")]), "[ab]");
        assert_eq!(sprintf("[%*d]", &[Value::Int(4), Value::Int(7)]), "[   7]");
    }

    #[test]
    fn test_oversized_counts_are_rejected() {
        let one = Value::Int(1);
        assert_eq!(sprintf("%99999999999999999999d", &[one.clone()]), "%!(BADWIDTH)1");
        assert_eq!(sprintf("%.99999999999999999999d", &[one.clone()]), "%!(BADPREC)1");
        assert_eq!(sprintf("%*d", &[Value::Int(i64::MAX), one.clone()]), "%!(BADWIDTH)1");
        assert_eq!(sprintf("%.*f", &[Value::Int(-1), Value::Float(0.5)]), "%!(BADPREC)0.500000");
        assert_eq!(sprintf("%1000001d", &[one.clone()]), "%!(BADWIDTH)1");
        assert_eq!(sprintf("%3d", &[one]), "  1");
    }

    #[test]
    fn test_floats() {
        assert_eq!(sprintf("%f", &[Value::Float(3.14159)]), "3.141590");
        assert_eq!(sprintf("%.2f", &[Value::Float(3.14159)]), "3.14");
        assert_eq!(sprintf("%e", &[Value::Float(1234.5678)]), "1.234568e+03");
        assert_eq!(sprintf("%g", &[Value::Float(0.000012)]), "1.2e-05");
        assert_eq!(sprintf("%.3g", &[Value::Float(3.14159)]), "3.14");
        assert_eq!(sprintf("%.3g", &[Value::Float(1.0)]), "1");
        assert_eq!(sprintf("%v", &[Value::Float(2.5)]), "2.5");
        assert_eq!(sprintf("%8.3f|", &[Value::Float(-1.5)]), "  -1.500|");
        assert_eq!(sprintf("%v", &[Value::Complex(1.0, -2.0)]), "(1-2i)");
        assert_eq!(sprintf("%.1f", &[Value::Complex(1.0, 2.0)]), "(1.0+2.0i)");
    }

    #[test]
    fn test_mismatches_render_inline() {
        assert_eq!(sprintf("%d", &[s("hi")]), "%!d(string=hi)");
        assert_eq!(sprintf("%s", &[Value::Int(3)]), "%!s(int=3)");
        assert_eq!(sprintf("%d %d", &[Value::Int(1)]), "1 %!d(MISSING)");
        assert_eq!(sprintf("%d", &[Value::Int(1), s("x")]), "1%!(EXTRA string=x)");
        assert_eq!(sprintf("abc%", &[]), "abc%!(NOVERB)");
        assert_eq!(sprintf("%d", &[Value::Nil]), "%!d(<nil>)");
    }

    #[test]
    fn test_collections() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(sprintf("%v", &[list.clone()]), "[1 2]");
        assert_eq!(sprintf("%03d", &[list]), "[001 002]");
        let map = Value::map(vec![("b", s("y")), ("a", s("x"))]);
        assert_eq!(sprintf("%v", &[map]), "map[a:x b:y]");
    }

    #[test]
    fn test_sprint_spacing() {
        assert_eq!(sprint(&[s("a"), s("b")]), "ab");
        assert_eq!(sprint(&[Value::Int(1), Value::Int(2)]), "1 2");
        assert_eq!(sprint(&[s("a"), Value::Int(1), s("b")]), "a1b");
        assert_eq!(sprint(&[Value::Nil]), "<nil>");
        assert_eq!(sprintln(&[s("a"), Value::Int(1)]), "a 1\n");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("tab\there", false), "\"tab\\there\"");
        assert_eq!(quote("é", true), "\"\\u00e9\"");
        assert_eq!(quote("é", false), "\"é\"");
        assert_eq!(sprintf("%q", &[Value::Int('x' as i64)]), "'x'");
    }
}
