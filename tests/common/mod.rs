#![allow(dead_code)]

use tmpl::{ExecError, ParseError, Record, Template, Value};

pub const MAIN: &str = "main";

pub fn render(text: &str, data: &Value) -> String {
    try_render(text, data).unwrap_or_else(|err| panic!("execution failed: {}", err))
}

pub fn try_render(text: &str, data: &Value) -> Result<String, ExecError> {
    let mut set = Template::new();
    set.parse(MAIN, text)
        .unwrap_or_else(|err| panic!("parse failed: {}", err));
    set.execute_to_string(MAIN, data)
}

pub fn parse_error(text: &str) -> ParseError {
    match Template::new().parse(MAIN, text) {
        Ok(()) => panic!("expected a parse error for {:?}", text),
        Err(err) => err,
    }
}

pub fn exec_error(text: &str, data: &Value) -> ExecError {
    match try_render(text, data) {
        Ok(out) => panic!("expected an execution error, rendered {:?}", out),
        Err(err) => err,
    }
}

pub fn ints(values: &[i64]) -> Value {
    Value::list(values.iter().map(|n| Value::Int(*n)))
}

pub fn strings(values: &[&str]) -> Value {
    Value::list(values.iter().map(Value::string))
}

pub fn letter(attended: bool) -> Value {
    Value::from(
        Record::new("Recipient")
            .with("Name", "Aunt Mildred")
            .with("Gift", "bone china tea set")
            .with("Attended", attended),
    )
}

pub fn make_user(name: &str, age: i64, tags: &[&str]) -> Value {
    Value::from(
        Record::new("User")
            .with("Name", name)
            .with("Age", age)
            .with("Tags", strings(tags)),
    )
}

pub fn make_team() -> Value {
    Value::map(vec![
        ("team", Value::string("core")),
        (
            "members",
            Value::list(vec![
                make_user("Alice", 25, &["admin", "dev"]),
                make_user("Bob", 30, &[]),
                make_user("Carol", 35, &["ops"]),
            ]),
        ),
        ("empty", Value::list(vec![])),
        ("scores", Value::map(vec![("b", Value::Int(2)), ("a", Value::Int(1))])),
    ])
}
