use crate::ast::{
    BranchNode, ChainNode, CommandNode, IdentifierNode, ListNode, Node, Number, PipeNode,
    TemplateNode, VariableNode,
};
use crate::diagnostic::Span;
use crate::value::Value;
use super::builtins::FuncMap;
use super::error::ExecError;
use super::parser::Registry;
use super::scope::VarStack;
use std::io::Write;

/// Nested `template` invocations allowed before execution stops.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Walks parsed templates against a data value, writing rendered text.
///
/// The registry and function table are only read, so one set of parsed
/// templates can drive any number of executions.
pub struct Executor<'a> {
    registry: &'a Registry,
    funcs: &'a FuncMap,
    max_depth: usize,
    depth: usize,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a Registry, funcs: &'a FuncMap) -> Self {
        Self {
            registry,
            funcs,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Render the template called `name` with `data` as dot.
    pub fn execute(&mut self, name: &str, data: &Value, out: &mut dyn Write) -> Result<(), ExecError> {
        let registry = self.registry;
        let root = registry
            .get(name)
            .ok_or_else(|| ExecError::not_found(name))?;
        let mut vars = VarStack::new(data.clone());
        self.depth = 0;
        self.walk_list(data, root, &mut vars, out)
    }

    fn walk_list(
        &mut self,
        dot: &Value,
        list: &ListNode,
        vars: &mut VarStack,
        out: &mut dyn Write,
    ) -> Result<(), ExecError> {
        for node in &list.nodes {
            self.walk(dot, node, vars, out)?;
        }
        Ok(())
    }

    fn walk(
        &mut self,
        dot: &Value,
        node: &Node,
        vars: &mut VarStack,
        out: &mut dyn Write,
    ) -> Result<(), ExecError> {
        match node {
            Node::Text(text) => out.write_all(text.as_bytes())?,
            Node::Comment(_) => {}
            Node::List(list) => self.walk_list(dot, list, vars, out)?,
            Node::Action(action) => {
                let value = self.eval_pipeline(dot, &action.pipe, vars)?;
                if action.pipe.decl.is_empty() {
                    render(&value, out)?;
                }
            }
            Node::If(branch) => self.walk_if_or_with(dot, branch, false, vars, out)?,
            Node::With(branch) => self.walk_if_or_with(dot, branch, true, vars, out)?,
            Node::Range(branch) => self.walk_range(dot, branch, vars, out)?,
            Node::Template(template) => self.walk_template(dot, template, vars, out)?,
            // Operands and parse-time markers never appear in a body list.
            other @ (Node::Pipe(_)
            | Node::Field(_)
            | Node::Variable(_)
            | Node::Identifier(_)
            | Node::Dot(_)
            | Node::Nil(_)
            | Node::Bool(_)
            | Node::Number(_)
            | Node::Complex(_)
            | Node::String(_)
            | Node::Chain(_)
            | Node::Else(_)
            | Node::End(_)) => {
                return Err(ExecError::type_error_at(
                    format!("unexpected {} in template body", other),
                    other.span(),
                ))
            }
        }
        Ok(())
    }

    fn walk_if_or_with(
        &mut self,
        dot: &Value,
        branch: &BranchNode,
        rebind: bool,
        vars: &mut VarStack,
        out: &mut dyn Write,
    ) -> Result<(), ExecError> {
        let mark = vars.mark();
        let value = self.eval_pipeline(dot, &branch.pipe, vars)?;
        let result = if value.is_truthy() {
            let inner = if rebind { &value } else { dot };
            self.walk_list(inner, &branch.list, vars, out)
        } else if let Some(else_list) = &branch.else_list {
            self.walk_list(dot, else_list, vars, out)
        } else {
            Ok(())
        };
        vars.pop_to(mark);
        result
    }

    fn walk_range(
        &mut self,
        dot: &Value,
        branch: &BranchNode,
        vars: &mut VarStack,
        out: &mut dyn Write,
    ) -> Result<(), ExecError> {
        let mark = vars.mark();
        let source = self.eval_commands(dot, &branch.pipe, vars)?;
        let items: Vec<(Value, Value)> = match &source {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item.clone()))
                .collect(),
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                keys.into_iter()
                    .map(|key| (Value::string(key), map[key].clone()))
                    .collect()
            }
            Value::Int(n) => {
                if branch.pipe.decl.len() > 1 {
                    return Err(ExecError::type_error_at(
                        format!("can't use {} to iterate over more than one variable", n),
                        branch.span,
                    ));
                }
                (0..(*n).max(0)).map(|i| (Value::Int(i), Value::Int(i))).collect()
            }
            Value::Nil => Vec::new(),
            other => {
                return Err(ExecError::type_error_at(
                    format!("range can't iterate over {}", other),
                    branch.pipe.span,
                ))
            }
        };
        log::trace!("range over {} with {} iterations", source.type_name(), items.len());

        if items.is_empty() {
            let result = match &branch.else_list {
                Some(else_list) => self.walk_list(dot, else_list, vars, out),
                None => Ok(()),
            };
            vars.pop_to(mark);
            return result;
        }

        for (key, item) in items {
            match branch.pipe.decl.as_slice() {
                [] => {}
                [elem] => self.bind(&branch.pipe, elem, item.clone(), vars)?,
                [index, elem, ..] => {
                    self.bind(&branch.pipe, index, key, vars)?;
                    self.bind(&branch.pipe, elem, item.clone(), vars)?;
                }
            }
            let result = self.walk_list(&item, &branch.list, vars, out);
            if !branch.pipe.is_assign {
                vars.pop_to(mark);
            }
            result?;
        }
        vars.pop_to(mark);
        Ok(())
    }

    fn walk_template(
        &mut self,
        dot: &Value,
        template: &TemplateNode,
        vars: &mut VarStack,
        out: &mut dyn Write,
    ) -> Result<(), ExecError> {
        let registry = self.registry;
        let body = registry
            .get(&template.name)
            .ok_or_else(|| ExecError::template_not_defined_at(&template.name, template.span))?;
        if self.depth >= self.max_depth {
            return Err(ExecError::depth_exceeded_at(
                &template.name,
                self.max_depth,
                template.span,
            ));
        }
        let new_dot = match &template.pipe {
            Some(pipe) => self.eval_pipeline(dot, pipe, vars)?,
            None => dot.clone(),
        };
        log::trace!("invoking template {:?} at depth {}", template.name, self.depth + 1);
        let mut inner = VarStack::new(new_dot.clone());
        self.depth += 1;
        let result = self.walk_list(&new_dot, body, &mut inner, out);
        self.depth -= 1;
        result
    }

    fn bind(
        &self,
        pipe: &PipeNode,
        variable: &VariableNode,
        value: Value,
        vars: &mut VarStack,
    ) -> Result<(), ExecError> {
        if pipe.is_assign {
            if !vars.set(variable.name(), value) {
                return Err(ExecError::type_error_at(
                    format!("undefined variable: {}", variable.name()),
                    variable.span,
                ));
            }
        } else {
            vars.push(variable.name(), value);
        }
        Ok(())
    }

    /// Run the commands of a pipeline, each receiving the previous result as
    /// its final argument.
    fn eval_commands(
        &mut self,
        dot: &Value,
        pipe: &PipeNode,
        vars: &mut VarStack,
    ) -> Result<Value, ExecError> {
        let mut value = None;
        for cmd in &pipe.cmds {
            value = Some(self.eval_command(dot, cmd, value, vars)?);
        }
        Ok(value.unwrap_or(Value::Nil))
    }

    fn eval_pipeline(
        &mut self,
        dot: &Value,
        pipe: &PipeNode,
        vars: &mut VarStack,
    ) -> Result<Value, ExecError> {
        let value = self.eval_commands(dot, pipe, vars)?;
        for variable in &pipe.decl {
            self.bind(pipe, variable, value.clone(), vars)?;
        }
        Ok(value)
    }

    fn eval_command(
        &mut self,
        dot: &Value,
        cmd: &CommandNode,
        final_value: Option<Value>,
        vars: &mut VarStack,
    ) -> Result<Value, ExecError> {
        let Some(first) = cmd.args.first() else {
            return Err(ExecError::type_error_at("empty command", cmd.span));
        };
        let has_args = cmd.args.len() > 1 || final_value.is_some();
        match first {
            Node::Identifier(ident) => {
                return self.eval_function(dot, ident, &cmd.args[1..], final_value, vars)
            }
            Node::Nil(span) => {
                return Err(ExecError::type_error_at("nil is not a command", *span));
            }
            _ => {}
        }
        if has_args {
            return Err(ExecError::type_error_at(
                format!("can't give argument to non-function {}", first),
                first.span(),
            ));
        }
        self.eval_arg(dot, first, vars)
    }

    /// Evaluate a node used as an operand.
    fn eval_arg(&mut self, dot: &Value, node: &Node, vars: &mut VarStack) -> Result<Value, ExecError> {
        match node {
            Node::Dot(_) => Ok(dot.clone()),
            Node::Nil(_) => Ok(Value::Nil),
            Node::Bool(b) => Ok(Value::Bool(b.value)),
            Node::Number(n) => Ok(match n.value {
                Number::Int(i) => Value::Int(i),
                Number::Float(f) => Value::Float(f),
                Number::Rune(c) => Value::Int(i64::from(u32::from(c))),
            }),
            Node::Complex(c) => Ok(Value::Complex(c.re, c.im)),
            Node::String(s) => Ok(Value::string(&s.text)),
            Node::Field(field) => walk_fields(dot.clone(), &field.ident, field.span),
            Node::Variable(variable) => {
                let value = vars.get(variable.name()).cloned().ok_or_else(|| {
                    ExecError::type_error_at(
                        format!("undefined variable: {}", variable.name()),
                        variable.span,
                    )
                })?;
                walk_fields(value, &variable.ident[1..], variable.span)
            }
            Node::Pipe(pipe) => {
                let mark = vars.mark();
                let value = self.eval_pipeline(dot, pipe, vars);
                if pipe.decl.is_empty() {
                    vars.pop_to(mark);
                }
                value
            }
            Node::Identifier(ident) => self.eval_function(dot, ident, &[], None, vars),
            Node::Chain(chain) => self.eval_chain(dot, chain, vars),
            other => Err(ExecError::type_error_at(
                format!("can't handle {} as an argument", other),
                other.span(),
            )),
        }
    }

    fn eval_chain(&mut self, dot: &Value, chain: &ChainNode, vars: &mut VarStack) -> Result<Value, ExecError> {
        let base = self.eval_arg(dot, &chain.node, vars)?;
        walk_fields(base, &chain.fields, chain.span)
    }

    fn eval_function(
        &mut self,
        dot: &Value,
        ident: &IdentifierNode,
        args: &[Node],
        final_value: Option<Value>,
        vars: &mut VarStack,
    ) -> Result<Value, ExecError> {
        let funcs = self.funcs;
        let function = funcs
            .get(&ident.name)
            .ok_or_else(|| ExecError::undefined_function_at(&ident.name, ident.span))?;

        // `and` and `or` stop evaluating once the outcome is known.
        let short_circuit = match ident.name.as_str() {
            "and" => Some(false),
            "or" => Some(true),
            _ => None,
        };
        let mut values = Vec::with_capacity(args.len() + 1);
        for arg in args {
            let value = self.eval_arg(dot, arg, vars)?;
            let decided = short_circuit.is_some_and(|stop_on| value.is_truthy() == stop_on);
            values.push(value);
            if decided {
                return function(&values)
                    .map_err(|message| ExecError::function_at(&ident.name, message, ident.span));
            }
        }
        if let Some(value) = final_value {
            values.push(value);
        }
        function(&values).map_err(|message| ExecError::function_at(&ident.name, message, ident.span))
    }
}

/// Follow `fields` from `receiver`, one member per step.
fn walk_fields(mut receiver: Value, fields: &[String], span: Span) -> Result<Value, ExecError> {
    for field in fields {
        receiver = lookup_field(&receiver, field, span)?;
    }
    Ok(receiver)
}

fn lookup_field(receiver: &Value, name: &str, span: Span) -> Result<Value, ExecError> {
    match receiver {
        Value::Nil => Ok(Value::Nil),
        Value::Map(map) => Ok(map.get(name).cloned().unwrap_or(Value::Nil)),
        Value::Object(object) => object
            .field(name)
            .or_else(|| object.field(&capitalize(name)))
            .ok_or_else(|| ExecError::field_at(name, object.type_name(), span)),
        other => Err(ExecError::field_at(name, other.type_name(), span)),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strings, numbers and booleans are written; everything else is dropped.
fn render(value: &Value, out: &mut dyn Write) -> Result<(), ExecError> {
    match value {
        Value::String(s) => out.write_all(unescape_output(s).as_bytes())?,
        Value::Int(_) | Value::Float(_) | Value::Complex(..) | Value::Bool(_) => {
            write!(out, "{}", value)?
        }
        Value::Nil | Value::List(_) | Value::Map(_) | Value::Object(_) => {}
    }
    Ok(())
}

/// Decode `\n \t \r \f \b \\` in rendered strings. Other backslashes stay.
fn unescape_output(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.peek() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('f') => '\u{0C}',
            Some('b') => '\u{08}',
            Some('\\') => '\\',
            _ => {
                out.push('\\');
                continue;
            }
        };
        chars.next();
        out.push(decoded);
    }
    out
}
