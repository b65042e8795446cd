mod common;

use common::*;
use tmpl::{FieldAccess, Record, Template, Value};

#[test]
fn test_number_literals_render() {
    let cases = [
        ("{{0x1F}}", "31"),
        ("{{0o17}}", "15"),
        ("{{017}}", "15"),
        ("{{0b101}}", "5"),
        ("{{1_000}}", "1000"),
        ("{{-7}}", "-7"),
        ("{{+3}}", "3"),
        ("{{1.5e3}}", "1500"),
        ("{{1e6}}", "1e+06"),
        ("{{0x1p4}}", "16"),
        ("{{'a'}}", "97"),
        ("{{'\\n'}}", "10"),
        ("{{1+2i}}", "(1+2i)"),
        ("{{3i}}", "(0+3i)"),
    ];
    for (text, expected) in cases {
        assert_eq!(render(text, &Value::Nil), expected, "for {}", text);
    }
}

#[test]
fn test_string_literals_render() {
    assert_eq!(render(r#"{{"tab\there"}}"#, &Value::Nil), "tab\there");
    assert_eq!(render(r#"{{"é\x41"}}"#, &Value::Nil), "éA");
    assert_eq!(render("{{`raw \\n stays`}}", &Value::Nil), "raw \n stays");
    assert_eq!(render("{{`it's`}}", &Value::Nil), "it's");
}

#[test]
fn test_rendered_strings_decode_escapes() {
    let data = Value::from("line\\nbreak and \\\\ and \\q");
    assert_eq!(render("{{.}}", &data), "line\nbreak and \\ and \\q");
}

#[test]
fn test_non_scalar_results_are_dropped() {
    let team = make_team();
    assert_eq!(render("[{{.members}}]", &team), "[]");
    assert_eq!(render("[{{.scores}}]", &team), "[]");
    assert_eq!(render("[{{print nil}}]", &team), "[<nil>]");
    assert_eq!(render("[{{.missing}}]", &team), "[]");
}

#[test]
fn test_nil_propagates_through_fields() {
    let data = Value::map(vec![("a", Value::Nil)]);
    assert_eq!(render("[{{.a.b.c}}]", &data), "[]");
    assert_eq!(render("{{if .a.b}}yes{{else}}no{{end}}", &data), "no");
}

#[test]
fn test_lowercase_field_matches_exported_member() {
    assert_eq!(render("{{.name}}", &make_user("Dee", 40, &[])), "Dee");
}

#[test]
fn test_chains_on_pipes_and_functions() {
    let team = make_team();
    assert_eq!(render("{{(index .members 2).Name}}", &team), "Carol");
    assert_eq!(render("{{$m := index .members 0}}{{$m.Tags | len}}", &team), "2");
    let mut set = Template::new();
    set.add_func("first", |args: &[Value]| match args {
        [Value::List(items)] => Ok(items.first().cloned().unwrap_or(Value::Nil)),
        _ => Err("want a list".to_string()),
    });
    set.parse(MAIN, "{{(first .members).Age}}").unwrap();
    assert_eq!(set.execute_to_string(MAIN, &team).unwrap(), "25");
}

#[test]
fn test_nested_parentheses() {
    assert_eq!(
        render(r#"{{printf "%d-%d" (len (slice .team 1)) (len .members)}}"#, &make_team()),
        "3-3"
    );
}

#[test]
fn test_variable_shadowing_in_branches() {
    let text = "{{$x := 1}}{{if true}}{{$x := 2}}{{$x}}{{end}}{{$x}}";
    assert_eq!(render(text, &Value::Nil), "21");
}

#[test]
fn test_dollar_is_root_inside_with() {
    let text = "{{with .members}}{{$.team}}{{end}}";
    assert_eq!(render(text, &make_team()), "core");
}

#[test]
fn test_unicode_text_and_identifiers() {
    let data = Value::map(vec![("naïve", Value::string("ok"))]);
    assert_eq!(render("żółw {{.naïve}} 🐢", &data), "żółw ok 🐢");
}

#[test]
fn test_trim_without_space_is_a_number() {
    assert_eq!(render("{{-3}}", &Value::Nil), "-3");
    assert_eq!(render("a {{- 3}} b", &Value::Nil), "a3 b");
}

#[test]
fn test_empty_and_whitespace_templates() {
    assert_eq!(render("", &Value::Nil), "");
    assert_eq!(render("  \n", &Value::Nil), "  \n");
}

#[derive(Debug)]
struct Point {
    x: i64,
    y: i64,
}

impl FieldAccess for Point {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "X" => Some(Value::Int(self.x)),
            "Y" => Some(Value::Int(self.y)),
            _ => None,
        }
    }

    fn type_name(&self) -> &str {
        "Point"
    }

    fn fields(&self) -> Vec<Value> {
        vec![Value::Int(self.x), Value::Int(self.y)]
    }
}

#[test]
fn test_host_field_access() {
    let point = Value::object(Point { x: 3, y: -4 });
    assert_eq!(render("({{.X}},{{.y}})", &point), "(3,-4)");
    assert_eq!(render("{{print .}}", &point), "{3 -4}");
    assert_eq!(
        exec_error("{{.Z}}", &point).to_string(),
        "can't evaluate field Z in type Point"
    );
}

#[test]
fn test_records_nest() {
    let data = Value::from(
        Record::new("Order")
            .with("Customer", Record::new("Customer").with("Name", "Eve"))
            .with("Total", 12.5),
    );
    assert_eq!(render("{{.Customer.Name}}: {{.Total}}", &data), "Eve: 12.5");
}

#[test]
fn test_range_over_record_list() {
    let text = "{{range .members}}{{if gt .Age 28}}{{.Name}} {{end}}{{end}}";
    assert_eq!(render(text, &make_team()), "Bob Carol ");
}
