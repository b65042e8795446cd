mod common;

use common::*;
use tmpl::Value;

const LETTER: &str = "Dear {{.Name}},{{if .Attended}}yes{{else}}no{{end}}";

#[test]
fn test_if_else_on_record() {
    assert_eq!(render(LETTER, &letter(true)), "Dear Aunt Mildred,yes");
    assert_eq!(render(LETTER, &letter(false)), "Dear Aunt Mildred,no");
}

#[test]
fn test_if_without_else() {
    assert_eq!(render("a{{if .}}b{{end}}c", &Value::Bool(false)), "ac");
    assert_eq!(render("a{{if .}}b{{end}}c", &Value::Bool(true)), "abc");
}

#[test]
fn test_else_if_chain() {
    let text = "{{if lt . 10}}small{{else if lt . 100}}medium{{else}}large{{end}}";
    assert_eq!(render(text, &Value::Int(3)), "small");
    assert_eq!(render(text, &Value::Int(30)), "medium");
    assert_eq!(render(text, &Value::Int(300)), "large");
}

#[test]
fn test_range_else_if_chain() {
    let text = "{{range .}}x{{else if true}}alt{{else}}none{{end}}";
    assert_eq!(render(text, &ints(&[])), "alt");
    assert_eq!(render(text, &ints(&[1])), "x");
    let text = "{{range .}}x{{else if false}}alt{{else}}none{{end}}";
    assert_eq!(render(text, &ints(&[])), "none");
}

#[test]
fn test_with_chains_only_with() {
    let text = "{{with .a}}A{{else with .b}}B{{.}}{{else}}none{{end}}";
    assert_eq!(render(text, &Value::map(vec![("b", Value::Int(2))])), "B2");
    assert_eq!(
        parse_error("{{with .}}a{{else if .}}b{{end}}").message,
        "unexpected <if> in input"
    );
}

#[test]
fn test_truthiness() {
    let text = "{{if .}}T{{else}}F{{end}}";
    for (value, expected) in [
        (Value::Nil, "F"),
        (Value::Int(0), "F"),
        (Value::Int(-2), "T"),
        (Value::Float(0.0), "F"),
        (Value::string(""), "F"),
        (Value::string("0"), "T"),
        (ints(&[]), "F"),
        (ints(&[0]), "T"),
        (Value::map(Vec::<(String, Value)>::new()), "F"),
        (letter(false), "T"),
    ] {
        assert_eq!(render(text, &value), expected, "truthiness of {:?}", value);
    }
}

#[test]
fn test_range_over_items() {
    let text = "{{range .Items}}{{.}}{{else}}none{{end}}";
    let full = Value::map(vec![("Items", ints(&[1, 2, 3]))]);
    let empty = Value::map(vec![("Items", ints(&[]))]);
    assert_eq!(render(text, &full), "123");
    assert_eq!(render(text, &empty), "none");
}

#[test]
fn test_range_with_index_and_element() {
    let text = "{{range $i, $name := .}}{{if $i}}, {{end}}{{$i}}:{{$name}}{{end}}";
    assert_eq!(render(text, &strings(&["a", "b", "c"])), "0:a, 1:b, 2:c");
}

#[test]
fn test_range_over_map_binds_key() {
    let text = "{{range $k, $v := .scores}}{{$k}}={{$v}} {{end}}";
    assert_eq!(render(text, &make_team()), "a=1 b=2 ");
    assert_eq!(render("{{range .scores}}{{.}}{{end}}", &make_team()), "12");
}

#[test]
fn test_range_over_integer() {
    assert_eq!(render("{{range $i := 4}}{{$i}}{{end}}", &Value::Nil), "0123");
    assert_eq!(render("{{range 0}}x{{else}}zero{{end}}", &Value::Nil), "zero");
}

#[test]
fn test_range_restores_dot() {
    let text = "{{.team}}:{{range .members}}{{.Name}} {{end}}{{.team}}";
    assert_eq!(render(text, &make_team()), "core:Alice Bob Carol core");
}

#[test]
fn test_nested_range_uses_root_variable() {
    let text = "{{range .members}}{{$m := .Name}}{{range .Tags}}{{$.team}}/{{$m}}/{{.}} {{end}}{{end}}";
    assert_eq!(render(text, &make_team()), "core/Alice/admin core/Alice/dev core/Carol/ops ");
}

#[test]
fn test_with_and_else() {
    let text = "{{with .Gift}}got {{.}}{{else}}nothing{{end}}";
    assert_eq!(render(text, &letter(true)), "got bone china tea set");
    assert_eq!(
        render(text, &Value::map(vec![("Gift", Value::string(""))])),
        "nothing"
    );
}

#[test]
fn test_with_declaration() {
    let text = "{{with $g := .Gift}}{{$g}}{{end}}";
    assert_eq!(render(text, &letter(true)), "bone china tea set");
}

#[test]
fn test_assignment_reaches_outer_variable() {
    let text = "{{$last := \"\"}}{{range .}}{{$last = .}}{{end}}{{$last}}";
    assert_eq!(render(text, &strings(&["x", "y", "z"])), "z");
}

#[test]
fn test_branch_declarations_do_not_leak() {
    let err = parse_error("{{if true}}{{$x := 1}}{{end}}{{$x}}");
    assert_eq!(err.message, "undefined variable \"$x\"");
}

#[test]
fn test_range_over_string_is_an_error() {
    let err = exec_error("{{range .}}{{end}}", &Value::string("abc"));
    assert!(err.to_string().starts_with("range can't iterate over"));
}
