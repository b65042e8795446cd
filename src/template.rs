//! The entry point for parsing and rendering templates.
//!
//! A [`Template`] owns a set of named templates sharing one function table
//! and configuration. Every `parse` call adds its template plus all of its
//! `define`/`block` bodies to the set, so templates parsed separately can
//! invoke each other.
//!
//! ```
//! use tmpl::{Template, Value};
//!
//! let mut set = Template::new();
//! set.parse("hello", "Hello, {{.}}!").unwrap();
//! let text = set.execute_to_string("hello", &Value::from("world")).unwrap();
//! assert_eq!(text, "Hello, world!");
//! ```

use crate::ast::ListNode;
use crate::config::Config;
use crate::interpreter::{
    add_tree, default_functions, parse, ExecError, Executor, FuncMap, ParseError, Registry,
};
use crate::lexer::lex;
use crate::value::Value;
use std::io::Write;
use std::sync::Arc;

pub struct Template {
    config: Config,
    funcs: FuncMap,
    registry: Registry,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            funcs: default_functions(),
            registry: Registry::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Action delimiters for subsequent `parse` calls. Empty strings mean the defaults.
    pub fn delims(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.config = self.config.delims(left, right);
        self
    }

    /// Merge `funcs` over the current table; entries in `funcs` win.
    pub fn funcs(mut self, funcs: FuncMap) -> Self {
        self.funcs.extend(funcs);
        self
    }

    pub fn add_func<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(f));
        self
    }

    /// Parse `text` as the template `name`. Nothing is added to the set
    /// unless the whole text parses.
    pub fn parse(&mut self, name: &str, text: &str) -> Result<(), ParseError> {
        let tokens = lex(text, &self.config.lex_options());
        let token_count = tokens.len();
        let funcs = &self.funcs;
        let parsed = parse(name, tokens, &|function: &str| funcs.contains_key(function))?;
        log::debug!(
            "parsed template {:?}: {} tokens, defines [{}]",
            name,
            token_count,
            parsed.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
        );
        for (defined, body) in parsed {
            add_tree(&mut self.registry, defined, body);
        }
        Ok(())
    }

    pub fn execute<W: Write>(&self, name: &str, data: &Value, out: &mut W) -> Result<(), ExecError> {
        log::debug!("executing template {:?}", name);
        Executor::new(&self.registry, &self.funcs)
            .with_max_depth(self.config.max_depth)
            .execute(name, data, out)
    }

    pub fn execute_to_string(&self, name: &str, data: &Value) -> Result<String, ExecError> {
        let mut out = Vec::new();
        self.execute(name, data, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn lookup(&self, name: &str) -> Option<&ListNode> {
        self.registry.get(name)
    }

    /// Defined template names, in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registry.keys().map(String::as_str)
    }

    pub fn has_func(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }
}
