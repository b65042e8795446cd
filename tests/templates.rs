mod common;

use common::*;
use tmpl::{Config, Template, Value};

#[test]
fn test_text_without_actions_is_unchanged() {
    for text in [
        "",
        "plain text",
        "line one\nline two\n",
        "braces { } and } { but no actions",
        "unicode: żółw 🐢",
    ] {
        assert_eq!(render(text, &Value::Nil), text);
        assert_eq!(render(text, &make_team()), text);
    }
}

#[test]
fn test_define_and_invoke() {
    assert_eq!(render(r#"{{define "T1"}}hi{{end}}{{template "T1"}}"#, &Value::Nil), "hi");
}

#[test]
fn test_chained_templates() {
    let text = r#"{{define "T0"}}0{{template "T1" .}}{{end}}{{define "T1"}}1{{template "T2" .}}{{end}}{{define "T2"}}2{{.}}{{end}}{{template "T0" "!"}}"#;
    assert_eq!(render(text, &Value::Nil), "012!");
}

#[test]
fn test_finite_recursion() {
    let text = r#"{{define "count"}}{{if .}}{{len .}}{{template "count" slice . 1}}{{end}}{{end}}{{template "count" .}}"#;
    assert_eq!(render(text, &ints(&[7, 8, 9])), "321");
}

#[test]
fn test_template_without_pipe_keeps_dot() {
    let text = r#"{{define "name"}}{{.Name}}{{end}}{{range .members}}{{template "name"}};{{end}}"#;
    assert_eq!(render(text, &make_team()), "Alice;Bob;Carol;");
}

#[test]
fn test_template_gets_fresh_variables() {
    let text = r#"{{define "inner"}}{{$}}{{end}}{{$x := 1}}{{template "inner" "new"}}"#;
    assert_eq!(render(text, &Value::string("outer")), "new");
}

#[test]
fn test_block_defines_and_invokes() {
    let mut set = Template::new();
    set.parse("page", r#"[{{block "body" .}}default {{.}}{{end}}]"#)
        .unwrap();
    assert_eq!(set.execute_to_string("page", &Value::from("x")).unwrap(), "[default x]");

    set.parse("override", r#"{{define "body"}}custom {{.}}{{end}}"#)
        .unwrap();
    assert_eq!(set.execute_to_string("page", &Value::from("x")).unwrap(), "[custom x]");
}

#[test]
fn test_blank_definition_replaces_existing() {
    let mut set = Template::new();
    set.parse("a", r#"{{define "part"}}content{{end}}"#).unwrap();
    set.parse("main", r#"[{{template "part"}}]"#).unwrap();
    assert_eq!(set.execute_to_string("main", &Value::Nil).unwrap(), "[content]");
    set.parse("b", r#"{{define "part"}}{{end}}"#).unwrap();
    assert_eq!(set.execute_to_string("main", &Value::Nil).unwrap(), "[]");
}

#[test]
fn test_define_bodies_are_not_rendered_in_place() {
    let text = "a{{define \"x\"}}X{{end}}b";
    assert_eq!(render(text, &Value::Nil), "ab");
}

#[test]
fn test_canonical_text() {
    let mut set = Template::new();
    set.parse("s", "{{.X|.Y}}").unwrap();
    assert_eq!(set.lookup("s").unwrap().to_string(), "{{.X | .Y}}");
    set.parse("t", "{{.X|printf \"%v\"}}").unwrap();
    assert_eq!(set.lookup("t").unwrap().to_string(), "{{.X | printf \"%v\"}}");

    set.parse("u", "{{if $x := .A}}{{$x}}{{else}}-{{end}}").unwrap();
    assert_eq!(
        set.lookup("u").unwrap().to_string(),
        "{{if $x := .A}}{{$x}}{{else}}-{{end}}"
    );
}

#[test]
fn test_trim_markers() {
    assert_eq!(render("hello- {{- 3 -}} -world", &Value::Nil), "hello-3-world");
    assert_eq!(render("a  \n {{- /* gone */ -}} \n  b", &Value::Nil), "ab");
}

#[test]
fn test_comments_are_dropped() {
    assert_eq!(render("a{{/* note */}}b", &Value::Nil), "ab");
    let mut set = Template::new().with_config(Config::default().emit_comments(true));
    set.parse("t", "a{{/* note */}}b").unwrap();
    assert_eq!(set.execute_to_string("t", &Value::Nil).unwrap(), "ab");
    assert_eq!(set.lookup("t").unwrap().to_string(), "a{{/* note */}}b");
}

#[test]
fn test_custom_delimiters() {
    let mut set = Template::new().with_config(Config::default().delims("[[", "]]"));
    set.parse("t", "[[range .]][[.]],[[end]] {{.}}").unwrap();
    assert_eq!(set.execute_to_string("t", &ints(&[1, 2])).unwrap(), "1,2, {{.}}");
}

#[test]
fn test_set_is_shared_across_threads() {
    let mut set = Template::new();
    set.parse("t", "{{.}}!").unwrap();
    let set = std::sync::Arc::new(set);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let set = set.clone();
            std::thread::spawn(move || set.execute_to_string("t", &Value::Int(i)).unwrap())
        })
        .collect();
    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outputs, vec!["0!", "1!", "2!", "3!"]);
}
