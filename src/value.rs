use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Named-member access for structured data values.
///
/// This is how templates reach into host data: `{{.Name}}` asks the current
/// value for its `Name` member. Implement it for your own types, or use
/// [`Record`] for ad-hoc structures.
pub trait FieldAccess: fmt::Debug {
    fn field(&self, name: &str) -> Option<Value>;

    fn type_name(&self) -> &str {
        "object"
    }

    /// Member values in declaration order, used when printing with `%v`.
    fn fields(&self) -> Vec<Value> {
        Vec::new()
    }
}

/// A named record with ordered members.
#[derive(Debug, Clone, Default)]
pub struct Record {
    name: String,
    members: IndexMap<String, Value>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: IndexMap::new(),
        }
    }

    pub fn with(mut self, member: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(member, value);
        self
    }

    pub fn insert(&mut self, member: impl Into<String>, value: impl Into<Value>) {
        self.members.insert(member.into(), value.into());
    }
}

impl FieldAccess for Record {
    fn field(&self, name: &str) -> Option<Value> {
        self.members.get(name).cloned()
    }

    fn type_name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> Vec<Value> {
        self.members.values().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    String(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<IndexMap<String, Value>>),
    Object(Rc<dyn FieldAccess>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::Int(left), Value::Int(right)) => left == right,
            (Value::Float(left), Value::Float(right)) => left == right,
            (Value::Complex(lr, li), Value::Complex(rr, ri)) => lr == rr && li == ri,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::List(left), Value::List(right)) => left == right,
            (Value::Map(left), Value::Map(right)) => left == right,
            (Value::Object(left), Value::Object(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn object(accessor: impl FieldAccess + 'static) -> Self {
        Value::Object(Rc::new(accessor))
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s.as_ref())
        } else {
            None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Complex(..))
    }

    /// Zero values and empty containers are false; objects are always true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Complex(re, im) => *re != 0.0 || *im != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float64",
            Value::Complex(..) => "complex128",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(object) => object.type_name(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(Rc::new(map))
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::object(record)
    }
}

/// The `%v` rendering: `<nil>`, `[a b]`, `map[k:v]`, `{a b}`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Complex(re, im) => write!(f, "{}", format_complex(*re, *im)),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "map[")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}:{}", key, map[key])?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                write!(f, "{{")?;
                for (i, member) in object.fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Shortest `%g` float text: exponent form below 1e-4 and from 1e6 up,
/// plain decimal otherwise.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:e}", x);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= 6 {
        format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
    } else {
        format!("{}", x)
    }
}

pub fn format_complex(re: f64, im: f64) -> String {
    let im_text = format_float(im);
    let sign = if im_text.starts_with('-') || im_text.starts_with('+') {
        ""
    } else {
        "+"
    };
    format!("({}{}{}i)", format_float(re), sign, im_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::list(vec![Value::Nil]).is_truthy());
        assert!(!Value::map(Vec::<(String, Value)>::new()).is_truthy());
        assert!(Value::from(Record::new("T")).is_truthy());
    }

    #[test]
    fn test_record_access() {
        let record = Record::new("User").with("Name", "Ann").with("Age", 40);
        assert_eq!(record.field("Name"), Some(Value::string("Ann")));
        assert_eq!(record.field("name"), None);
        assert_eq!(record.type_name(), "User");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Nil.to_string(), "<nil>");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::string("a")]).to_string(),
            "[1 a]"
        );
        assert_eq!(
            Value::map(vec![("b", Value::Int(2)), ("a", Value::Int(1))]).to_string(),
            "map[a:1 b:2]"
        );
        let record = Record::new("P").with("X", 1).with("Y", "z");
        assert_eq!(Value::from(record).to_string(), "{1 z}");
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(100000.0), "100000");
        assert_eq!(format_float(1e21), "1e+21");
        assert_eq!(format_float(1234567.0), "1.234567e+06");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_complex(1.0, 2.0), "(1+2i)");
        assert_eq!(format_complex(0.0, -1.5), "(0-1.5i)");
    }
}
