use std::fmt;

use crate::diagnostic::Span;

/// A parsed template tree node.
///
/// `Else` and `End` are parse-time markers: they only ever appear as the
/// last element of a list that is still being built, and the parser removes
/// them before the list is attached to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Comment(String),
    List(ListNode),
    Action(ActionNode),
    If(BranchNode),
    Range(BranchNode),
    With(BranchNode),
    Template(TemplateNode),
    /// A parenthesized pipeline used as an argument.
    Pipe(PipeNode),
    Field(FieldNode),
    Variable(VariableNode),
    /// A function reference.
    Identifier(IdentifierNode),
    Dot(Span),
    Nil(Span),
    Bool(BoolNode),
    Number(NumberNode),
    Complex(ComplexNode),
    String(StringNode),
    Chain(ChainNode),
    Else(Span),
    End(Span),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(_) | Node::Comment(_) | Node::List(_) => Span::dummy(),
            Node::Action(action) => action.span,
            Node::If(branch) | Node::Range(branch) | Node::With(branch) => branch.span,
            Node::Template(template) => template.span,
            Node::Pipe(pipe) => pipe.span,
            Node::Field(field) => field.span,
            Node::Variable(variable) => variable.span,
            Node::Identifier(identifier) => identifier.span,
            Node::Dot(span) | Node::Nil(span) | Node::Else(span) | Node::End(span) => *span,
            Node::Bool(node) => node.span,
            Node::Number(node) => node.span,
            Node::Complex(node) => node.span,
            Node::String(node) => node.span,
            Node::Chain(chain) => chain.span,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Node::Else(_) | Node::End(_))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListNode {
    pub nodes: Vec<Node>,
}

impl ListNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Remove a trailing `Else`/`End` marker, if any.
    pub fn take_terminator(&mut self) -> Option<Node> {
        if self.nodes.last().is_some_and(Node::is_terminator) {
            self.nodes.pop()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    pub span: Span,
    pub pipe: PipeNode,
}

/// Shared shape of `if`, `range` and `with`.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub span: Span,
    pub pipe: PipeNode,
    pub list: ListNode,
    pub else_list: Option<ListNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub span: Span,
    pub name: String,
    pub pipe: Option<PipeNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipeNode {
    pub span: Span,
    /// What the pipeline belongs to ("command", "if", "range", ...), used in messages.
    pub context: String,
    /// `$x = ...` rather than `$x := ...`.
    pub is_assign: bool,
    pub decl: Vec<VariableNode>,
    pub cmds: Vec<CommandNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandNode {
    pub span: Span,
    pub args: Vec<Node>,
}

/// `.A.B.C`, stored without the leading dots.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub span: Span,
    pub ident: Vec<String>,
}

/// `$x.A.B`; `ident[0]` is the variable name including `$`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub span: Span,
    pub ident: Vec<String>,
}

impl VariableNode {
    pub fn name(&self) -> &str {
        &self.ident[0]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierNode {
    pub span: Span,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolNode {
    pub span: Span,
    pub value: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
    Rune(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberNode {
    pub span: Span,
    pub text: String,
    pub value: Number,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexNode {
    pub span: Span,
    pub text: String,
    pub re: f64,
    pub im: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringNode {
    pub span: Span,
    /// Original text including quotes.
    pub quoted: String,
    pub text: String,
}

/// A term followed by field accesses, e.g. `(pipe).A.B` or `fn.A`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainNode {
    pub span: Span,
    pub node: Box<Node>,
    pub fields: Vec<String>,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) => write!(f, "{}", text),
            Node::Comment(text) => write!(f, "{{{{{}}}}}", text),
            Node::List(list) => write!(f, "{}", list),
            Node::Action(action) => write!(f, "{{{{{}}}}}", action.pipe),
            Node::If(branch) => write_branch(f, "if", branch),
            Node::Range(branch) => write_branch(f, "range", branch),
            Node::With(branch) => write_branch(f, "with", branch),
            Node::Template(template) => match &template.pipe {
                Some(pipe) => write!(f, "{{{{template {:?} {}}}}}", template.name, pipe),
                None => write!(f, "{{{{template {:?}}}}}", template.name),
            },
            Node::Pipe(pipe) => write!(f, "{}", pipe),
            Node::Field(field) => {
                for ident in &field.ident {
                    write!(f, ".{}", ident)?;
                }
                Ok(())
            }
            Node::Variable(variable) => write!(f, "{}", variable.ident.join(".")),
            Node::Identifier(identifier) => write!(f, "{}", identifier.name),
            Node::Dot(_) => write!(f, "."),
            Node::Nil(_) => write!(f, "nil"),
            Node::Bool(node) => write!(f, "{}", node.value),
            Node::Number(node) => write!(f, "{}", node.text),
            Node::Complex(node) => write!(f, "{}", node.text),
            Node::String(node) => write!(f, "{}", node.quoted),
            Node::Chain(chain) => {
                match chain.node.as_ref() {
                    Node::Pipe(pipe) => write!(f, "({})", pipe)?,
                    other => write!(f, "{}", other)?,
                }
                for field in &chain.fields {
                    write!(f, ".{}", field)?;
                }
                Ok(())
            }
            Node::Else(_) => write!(f, "{{{{else}}}}"),
            Node::End(_) => write!(f, "{{{{end}}}}"),
        }
    }
}

fn write_branch(f: &mut fmt::Formatter<'_>, keyword: &str, branch: &BranchNode) -> fmt::Result {
    write!(f, "{{{{{} {}}}}}{}", keyword, branch.pipe, branch.list)?;
    if let Some(else_list) = &branch.else_list {
        write!(f, "{{{{else}}}}{}", else_list)?;
    }
    write!(f, "{{{{end}}}}")
}

impl fmt::Display for ListNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for PipeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            let names: Vec<String> = self.decl.iter().map(|v| v.ident.join(".")).collect();
            let op = if self.is_assign { "=" } else { ":=" };
            write!(f, "{} {} ", names.join(", "), op)?;
        }
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match arg {
                Node::Pipe(pipe) => write!(f, "({})", pipe)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}
