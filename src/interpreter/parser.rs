use crate::ast::{
    ActionNode, BoolNode, BranchNode, ChainNode, CommandNode, ComplexNode, FieldNode,
    IdentifierNode, ListNode, Node, Number, NumberNode, PipeNode, StringNode, TemplateNode,
    VariableNode,
};
use crate::diagnostic::Span;
use crate::interpreter::error::ParseError;
use crate::interpreter::scope::ScopeStack;
use crate::token::{Token, TokenKind};
use indexmap::IndexMap;

/// Template name to root list, in definition order.
pub type Registry = IndexMap<String, ListNode>;

/// Store `body` under `name`. A redefinition replaces the earlier body but
/// keeps its place in the definition order.
pub fn add_tree(registry: &mut Registry, name: impl Into<String>, body: ListNode) {
    registry.insert(name.into(), body);
}

/// Parse one template's token stream. The result holds the template itself
/// under `name` plus everything it defines with `define` or `block`.
pub fn parse(
    name: &str,
    tokens: Vec<Token>,
    is_function: &dyn Fn(&str) -> bool,
) -> Result<Registry, ParseError> {
    TokenParser::new(name, tokens, is_function).parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    If,
    Range,
    With,
}

impl Control {
    fn context(self) -> &'static str {
        match self {
            Control::If => "if",
            Control::Range => "range",
            Control::With => "with",
        }
    }
}

pub struct TokenParser<'a> {
    name: String,
    tokens: Vec<Token>,
    current: usize,
    scope: ScopeStack,
    is_function: &'a dyn Fn(&str) -> bool,
    registry: Registry,
}

impl<'a> TokenParser<'a> {
    pub fn new(name: &str, mut tokens: Vec<Token>, is_function: &'a dyn Fn(&str) -> bool) -> Self {
        if tokens.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                pos: 0,
                line: 1,
                column: 1,
            });
        }
        Self {
            name: name.to_string(),
            tokens,
            current: 0,
            scope: ScopeStack::new(),
            is_function,
            registry: Registry::new(),
        }
    }

    pub fn parse(mut self) -> Result<Registry, ParseError> {
        let mut root = self.parse_list()?;
        if let Some(terminator) = root.take_terminator() {
            let message = match terminator {
                Node::Else(_) => "unmatched else",
                _ => "unmatched end",
            };
            return Err(self.error_at_span(terminator.span(), message));
        }
        let name = self.name.clone();
        add_tree(&mut self.registry, name, root);
        Ok(self.registry)
    }

    // Cursor

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        let token = self.peek().clone();
        if token.kind == TokenKind::Error {
            return Err(ParseError::lexical(&self.name, &token));
        }
        self.current += 1;
        Ok(token)
    }

    fn backup(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    fn skip_space(&mut self) {
        while self.peek().kind == TokenKind::Space {
            self.current += 1;
        }
    }

    fn peek_non_space(&mut self) -> TokenKind {
        self.skip_space();
        self.peek().kind
    }

    fn next_non_space(&mut self) -> Result<Token, ParseError> {
        self.skip_space();
        self.next()
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, ParseError> {
        let token = self.next_non_space()?;
        if token.kind != kind {
            return Err(self.unexpected(&token, context));
        }
        Ok(token)
    }

    fn previous_end(&self) -> usize {
        match self.current.checked_sub(1) {
            Some(index) => self.tokens[index.min(self.tokens.len() - 1)].end(),
            None => 0,
        }
    }

    // Errors

    fn error_at(&self, token: &Token, message: impl Into<String>) -> ParseError {
        ParseError::new(&self.name, message, token)
    }

    /// Report against the most recently consumed token.
    fn error(&self, message: impl Into<String>) -> ParseError {
        let index = self.current.saturating_sub(1).min(self.tokens.len() - 1);
        self.error_at(&self.tokens[index], message)
    }

    fn error_at_span(&self, span: Span, message: impl Into<String>) -> ParseError {
        match self.tokens.iter().find(|token| token.pos == span.start) {
            Some(token) => self.error_at(token, message),
            None => self.error(message),
        }
    }

    fn unexpected(&self, token: &Token, context: &str) -> ParseError {
        match token.kind {
            TokenKind::Error => ParseError::lexical(&self.name, token),
            _ => self.error_at(token, format!("unexpected {} in {}", token, context)),
        }
    }

    fn unexpected_eof(&self) -> ParseError {
        self.error_at(self.peek(), "unexpected EOF")
    }

    // Lists and actions

    /// Parse text and actions until EOF or an `{{else}}`/`{{end}}`, which is
    /// left as the last node of the returned list.
    fn parse_list(&mut self) -> Result<ListNode, ParseError> {
        let mut list = ListNode::new();
        loop {
            if self.peek_non_space() == TokenKind::Eof {
                return Ok(list);
            }
            if self.at_definition() {
                self.parse_definition()?;
                continue;
            }
            let node = self.text_or_action()?;
            let done = node.is_terminator();
            list.push(node);
            if done {
                return Ok(list);
            }
        }
    }

    /// Consume `{{define` if that is what comes next.
    fn at_definition(&mut self) -> bool {
        if self.peek().kind != TokenKind::LeftDelim {
            return false;
        }
        let save = self.current;
        self.current += 1;
        if self.peek_non_space() == TokenKind::Define {
            self.current += 1;
            return true;
        }
        self.current = save;
        false
    }

    fn parse_definition(&mut self) -> Result<(), ParseError> {
        let context = "define clause";
        let token = self.next_non_space()?;
        let name = self.template_name(&token, context)?;
        self.expect(TokenKind::RightDelim, context)?;
        let body = self.parse_body(context)?;
        log::trace!("defined template {:?}", name);
        add_tree(&mut self.registry, name, body);
        Ok(())
    }

    /// A `define`/`block` body: its own variable scope, closed by a bare `end`.
    fn parse_body(&mut self, context: &str) -> Result<ListNode, ParseError> {
        let outer = std::mem::take(&mut self.scope);
        let result = self.parse_list();
        self.scope = outer;
        let mut body = result?;
        match body.take_terminator() {
            Some(Node::End(_)) => Ok(body),
            Some(other) => Err(self.error_at_span(
                other.span(),
                format!("unexpected {} in {}", other, context),
            )),
            None => Err(self.unexpected_eof()),
        }
    }

    fn text_or_action(&mut self) -> Result<Node, ParseError> {
        let token = self.next_non_space()?;
        match token.kind {
            TokenKind::Text => Ok(Node::Text(token.text)),
            TokenKind::Comment => Ok(Node::Comment(token.text)),
            TokenKind::LeftDelim => self.action(),
            _ => Err(self.unexpected(&token, "input")),
        }
    }

    fn action(&mut self) -> Result<Node, ParseError> {
        let token = self.next_non_space()?;
        match token.kind {
            TokenKind::Block => return self.block_control(&token),
            TokenKind::Else => return self.else_control(&token),
            TokenKind::End => return self.end_control(&token),
            TokenKind::If => return self.branch_control(&token, Control::If),
            TokenKind::Range => return self.branch_control(&token, Control::Range),
            TokenKind::Template => return self.template_control(&token),
            TokenKind::With => return self.branch_control(&token, Control::With),
            _ => {}
        }
        self.backup();
        let pipe = self.pipeline("command", TokenKind::RightDelim)?;
        Ok(Node::Action(ActionNode {
            span: Span::new(token.pos, pipe.span.end),
            pipe,
        }))
    }

    fn else_control(&mut self, keyword: &Token) -> Result<Node, ParseError> {
        let span = Span::new(keyword.pos, keyword.end());
        // `{{else if ...}}` leaves the `if` pending for the enclosing branch.
        if matches!(self.peek_non_space(), TokenKind::If | TokenKind::With) {
            return Ok(Node::Else(span));
        }
        self.expect(TokenKind::RightDelim, "else")?;
        Ok(Node::Else(span))
    }

    fn end_control(&mut self, keyword: &Token) -> Result<Node, ParseError> {
        self.expect(TokenKind::RightDelim, "end")?;
        Ok(Node::End(Span::new(keyword.pos, keyword.end())))
    }

    fn branch_control(&mut self, keyword: &Token, control: Control) -> Result<Node, ParseError> {
        let mark = self.scope.mark();
        let result = self.parse_branch(keyword, control);
        self.scope.truncate(mark);
        let branch = result?;
        Ok(match control {
            Control::If => Node::If(branch),
            Control::Range => Node::Range(branch),
            Control::With => Node::With(branch),
        })
    }

    fn parse_branch(&mut self, keyword: &Token, control: Control) -> Result<BranchNode, ParseError> {
        let pipe = self.pipeline(control.context(), TokenKind::RightDelim)?;
        let span = Span::new(keyword.pos, pipe.span.end);
        let mut list = self.parse_list()?;
        let else_list = match list.take_terminator() {
            Some(Node::End(_)) => None,
            Some(Node::Else(_)) => Some(self.parse_else(control)?),
            Some(other) => {
                return Err(self.error_at_span(other.span(), format!("unexpected {}", other)))
            }
            None => return Err(self.unexpected_eof()),
        };
        Ok(BranchNode {
            span,
            pipe,
            list,
            else_list,
        })
    }

    fn parse_else(&mut self, control: Control) -> Result<ListNode, ParseError> {
        // `{{else if x}}` is `{{else}}{{if x}}...{{end}}` sharing the outer end.
        let chained = match (control, self.peek_non_space()) {
            (Control::If | Control::Range, TokenKind::If) => Some(Control::If),
            (Control::With, TokenKind::With) => Some(Control::With),
            _ => None,
        };
        if let Some(inner) = chained {
            let keyword = self.next()?;
            let mut list = ListNode::new();
            list.push(self.branch_control(&keyword, inner)?);
            return Ok(list);
        }
        let mut else_list = self.parse_list()?;
        match else_list.take_terminator() {
            Some(Node::End(_)) => Ok(else_list),
            Some(other) => Err(self.error_at_span(other.span(), "unmatched else")),
            None => Err(self.unexpected_eof()),
        }
    }

    fn block_control(&mut self, keyword: &Token) -> Result<Node, ParseError> {
        let context = "block clause";
        let token = self.next_non_space()?;
        let name = self.template_name(&token, context)?;
        let pipe = self.pipeline(context, TokenKind::RightDelim)?;
        let span = Span::new(keyword.pos, pipe.span.end);
        let body = self.parse_body(context)?;
        log::trace!("defined block {:?}", name);
        add_tree(&mut self.registry, name.clone(), body);
        Ok(Node::Template(TemplateNode {
            span,
            name,
            pipe: Some(pipe),
        }))
    }

    fn template_control(&mut self, keyword: &Token) -> Result<Node, ParseError> {
        let context = "template clause";
        let token = self.next_non_space()?;
        let name = self.template_name(&token, context)?;
        let pipe = if self.next_non_space()?.kind != TokenKind::RightDelim {
            self.backup();
            // Declarations here stay in scope until the enclosing end.
            Some(self.pipeline(context, TokenKind::RightDelim)?)
        } else {
            None
        };
        let end = pipe.as_ref().map_or(token.end(), |pipe| pipe.span.end);
        Ok(Node::Template(TemplateNode {
            span: Span::new(keyword.pos, end),
            name,
            pipe,
        }))
    }

    fn template_name(&self, token: &Token, context: &str) -> Result<String, ParseError> {
        match token.kind {
            TokenKind::String | TokenKind::RawString => {
                unquote(&token.text).map_err(|message| self.error_at(token, message))
            }
            _ => Err(self.unexpected(token, context)),
        }
    }

    // Pipelines

    fn pipeline(&mut self, context: &str, end: TokenKind) -> Result<PipeNode, ParseError> {
        self.skip_space();
        let start = self.peek().pos;
        let mut pipe = PipeNode {
            span: Span::new(start, start),
            context: context.to_string(),
            is_assign: false,
            decl: Vec::new(),
            cmds: Vec::new(),
        };
        self.declarations(&mut pipe)?;
        loop {
            let token = self.next_non_space()?;
            match token.kind {
                kind if kind == end => {
                    pipe.span.end = match pipe.cmds.last() {
                        Some(cmd) => cmd.span.end,
                        None => start,
                    };
                    self.check_pipeline(&pipe, &token)?;
                    return Ok(pipe);
                }
                TokenKind::Bool
                | TokenKind::CharConstant
                | TokenKind::Complex
                | TokenKind::Dot
                | TokenKind::Field
                | TokenKind::Identifier
                | TokenKind::Number
                | TokenKind::Nil
                | TokenKind::RawString
                | TokenKind::String
                | TokenKind::Variable
                | TokenKind::LeftParen => {
                    self.backup();
                    let cmd = self.command()?;
                    pipe.cmds.push(cmd);
                }
                _ => return Err(self.unexpected(&token, context)),
            }
        }
    }

    /// Leading `$x :=`, `$x =` or (in range) `$i, $e :=`.
    fn declarations(&mut self, pipe: &mut PipeNode) -> Result<(), ParseError> {
        loop {
            if self.peek_non_space() != TokenKind::Variable {
                return Ok(());
            }
            let save = self.current;
            let variable = self.next()?;
            let node = VariableNode {
                span: Span::new(variable.pos, variable.end()),
                ident: vec![variable.text.clone()],
            };
            match self.peek_non_space() {
                TokenKind::Assign | TokenKind::Declare => {
                    let op = self.next()?;
                    pipe.is_assign = op.kind == TokenKind::Assign;
                    if pipe.is_assign && !self.scope.contains(&variable.text) {
                        return Err(self.error_at(
                            &variable,
                            format!("undefined variable {:?}", variable.text),
                        ));
                    }
                    if !pipe.is_assign {
                        self.scope.declare(variable.text.clone());
                    }
                    pipe.decl.push(node);
                    return Ok(());
                }
                TokenKind::Char if self.peek().text == "," => {
                    self.next()?;
                    self.scope.declare(variable.text.clone());
                    pipe.decl.push(node);
                    if pipe.context == "range" && pipe.decl.len() < 2 {
                        match self.peek_non_space() {
                            TokenKind::Variable | TokenKind::RightDelim | TokenKind::RightParen => {
                                continue
                            }
                            _ => return Err(self.error("range can only initialize variables")),
                        }
                    }
                    return Err(self.error(format!("too many declarations in {}", pipe.context)));
                }
                _ => {
                    self.current = save;
                    return Ok(());
                }
            }
        }
    }

    fn check_pipeline(&self, pipe: &PipeNode, end: &Token) -> Result<(), ParseError> {
        if pipe.cmds.is_empty() {
            return Err(self.error_at(end, format!("missing value for {}", pipe.context)));
        }
        for (i, cmd) in pipe.cmds.iter().enumerate().skip(1) {
            if let Some(
                lead @ (Node::Bool(_)
                | Node::Dot(_)
                | Node::Nil(_)
                | Node::Number(_)
                | Node::Complex(_)
                | Node::String(_)),
            ) = cmd.args.first()
            {
                return Err(self.error_at_span(
                    lead.span(),
                    format!("non executable command in pipeline stage {}", i + 1),
                ));
            }
        }
        Ok(())
    }

    fn command(&mut self) -> Result<CommandNode, ParseError> {
        self.skip_space();
        let start = self.peek().pos;
        let mut args = Vec::new();
        loop {
            self.skip_space();
            if let Some(operand) = self.operand()? {
                args.push(operand);
            }
            let token = self.next()?;
            match token.kind {
                TokenKind::Space => continue,
                TokenKind::RightDelim | TokenKind::RightParen => self.backup(),
                TokenKind::Pipe => {}
                _ => return Err(self.unexpected(&token, "operand")),
            }
            break;
        }
        let Some(last) = args.last() else {
            return Err(self.error("empty command"));
        };
        Ok(CommandNode {
            span: Span::new(start, last.span().end),
            args,
        })
    }

    /// A term plus any `.Field` suffixes glued to it.
    fn operand(&mut self) -> Result<Option<Node>, ParseError> {
        let Some(node) = self.term()? else {
            return Ok(None);
        };
        if self.peek().kind != TokenKind::Field {
            return Ok(Some(node));
        }
        let start = node.span().start;
        let mut end = node.span().end;
        let mut fields = Vec::new();
        while self.peek().kind == TokenKind::Field {
            let token = self.next()?;
            end = token.end();
            fields.push(token.text[1..].to_string());
        }
        let span = Span::new(start, end);
        let node = match node {
            Node::Field(mut field) => {
                field.ident.extend(fields);
                field.span = span;
                Node::Field(field)
            }
            Node::Variable(mut variable) => {
                variable.ident.extend(fields);
                variable.span = span;
                Node::Variable(variable)
            }
            Node::Bool(_)
            | Node::String(_)
            | Node::Number(_)
            | Node::Complex(_)
            | Node::Nil(_)
            | Node::Dot(_) => {
                return Err(self.error_at_span(
                    node.span(),
                    format!("unexpected . after term {:?}", node.to_string()),
                ));
            }
            other => Node::Chain(ChainNode {
                span,
                node: Box::new(other),
                fields,
            }),
        };
        Ok(Some(node))
    }

    fn term(&mut self) -> Result<Option<Node>, ParseError> {
        let token = self.next_non_space()?;
        let span = Span::new(token.pos, token.end());
        let node = match token.kind {
            TokenKind::Identifier => {
                if !(self.is_function)(&token.text) {
                    return Err(
                        self.error_at(&token, format!("function {:?} not defined", token.text))
                    );
                }
                Node::Identifier(IdentifierNode {
                    span,
                    name: token.text,
                })
            }
            TokenKind::Dot => Node::Dot(span),
            TokenKind::Nil => Node::Nil(span),
            TokenKind::Variable => {
                if !self.scope.contains(&token.text) {
                    return Err(
                        self.error_at(&token, format!("undefined variable {:?}", token.text))
                    );
                }
                Node::Variable(VariableNode {
                    span,
                    ident: vec![token.text],
                })
            }
            TokenKind::Field => Node::Field(FieldNode {
                span,
                ident: vec![token.text[1..].to_string()],
            }),
            TokenKind::Bool => Node::Bool(BoolNode {
                span,
                value: token.text == "true",
            }),
            TokenKind::CharConstant | TokenKind::Complex | TokenKind::Number => {
                self.number(&token)?
            }
            TokenKind::LeftParen => {
                let mut pipe = self.pipeline("parenthesized pipeline", TokenKind::RightParen)?;
                pipe.span = Span::new(token.pos, self.previous_end());
                Node::Pipe(pipe)
            }
            TokenKind::String | TokenKind::RawString => {
                let text = unquote(&token.text).map_err(|message| self.error_at(&token, message))?;
                Node::String(StringNode {
                    span,
                    quoted: token.text,
                    text,
                })
            }
            _ => {
                self.backup();
                return Ok(None);
            }
        };
        Ok(Some(node))
    }

    fn number(&self, token: &Token) -> Result<Node, ParseError> {
        let span = Span::new(token.pos, token.end());
        let text = token.text.as_str();
        let illegal = || self.error_at(token, format!("illegal number syntax: {:?}", text));
        match token.kind {
            TokenKind::CharConstant => {
                let c = unquote_char(text).map_err(|message| self.error_at(token, message))?;
                Ok(Node::Number(NumberNode {
                    span,
                    text: text.to_string(),
                    value: Number::Rune(c),
                }))
            }
            TokenKind::Complex => {
                let (re, im) = parse_complex(text).ok_or_else(illegal)?;
                Ok(Node::Complex(ComplexNode {
                    span,
                    text: text.to_string(),
                    re,
                    im,
                }))
            }
            _ if text.ends_with('i') => {
                let im = parse_float(&text[..text.len() - 1]).ok_or_else(illegal)?;
                Ok(Node::Complex(ComplexNode {
                    span,
                    text: text.to_string(),
                    re: 0.0,
                    im,
                }))
            }
            _ => {
                let value = parse_number(text).map_err(|message| self.error_at(token, message))?;
                Ok(Node::Number(NumberNode {
                    span,
                    text: text.to_string(),
                    value,
                }))
            }
        }
    }
}

// Literals

fn parse_number(text: &str) -> Result<Number, String> {
    if !looks_like_float(text) {
        return match parse_int(text) {
            Ok(n) => Ok(Number::Int(n)),
            Err(IntError::Overflow) => Err(format!("integer overflow: {:?}", text)),
            Err(IntError::Syntax) => Err(format!("illegal number syntax: {:?}", text)),
        };
    }
    parse_float(text)
        .map(Number::Float)
        .ok_or_else(|| format!("illegal number syntax: {:?}", text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntError {
    Syntax,
    Overflow,
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn hex_body(text: &str) -> Option<&str> {
    text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
}

fn looks_like_float(text: &str) -> bool {
    let (_, body) = split_sign(text);
    match hex_body(body) {
        Some(hex) => hex.contains(['.', 'p', 'P']),
        None => body.contains(['.', 'e', 'E']),
    }
}

/// Integer literal with optional sign, `_` separators and a 0x/0o/0b or
/// legacy leading-zero octal prefix.
fn parse_int(text: &str) -> Result<i64, IntError> {
    let (negative, body) = split_sign(text);
    let body: String = body.chars().filter(|c| *c != '_').collect();
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(digits) = lower.strip_prefix("0x") {
        (16, digits)
    } else if let Some(digits) = lower.strip_prefix("0o") {
        (8, digits)
    } else if let Some(digits) = lower.strip_prefix("0b") {
        (2, digits)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(IntError::Syntax);
    }
    let magnitude = u64::from_str_radix(digits, radix).map_err(|_| IntError::Overflow)?;
    if negative {
        if magnitude > i64::MAX as u64 + 1 {
            return Err(IntError::Overflow);
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| IntError::Overflow)
    }
}

fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let (negative, body) = split_sign(&cleaned);
    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = match hex_body(body) {
        Some(hex) => parse_hex_float(hex)?,
        None => {
            if !body.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
                return None;
            }
            body.parse::<f64>().ok()?
        }
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_hex_float(text: &str) -> Option<f64> {
    let (mantissa, exponent) = match text.find(['p', 'P']) {
        Some(at) => (&text[..at], text[at + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let mut value = 0.0f64;
    for c in whole.chars() {
        value = value * 16.0 + f64::from(c.to_digit(16)?);
    }
    let mut scale = 1.0 / 16.0;
    for c in fraction.chars() {
        value += f64::from(c.to_digit(16)?) * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exponent))
}

/// `re±imi` with no spaces.
fn parse_complex(text: &str) -> Option<(f64, f64)> {
    let body = text.strip_suffix('i')?;
    let bytes = body.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P'))?;
    Some((parse_float(&body[..split])?, parse_float(&body[split..])?))
}

fn unquote(text: &str) -> Result<String, String> {
    if text.len() >= 2 && text.starts_with('`') && text.ends_with('`') {
        return Ok(text[1..text.len() - 1].replace('\r', ""));
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return unescape(&text[1..text.len() - 1], '"');
    }
    Err(format!("invalid quoted string {}", text))
}

fn unquote_char(text: &str) -> Result<char, String> {
    let malformed = || format!("malformed character constant: {}", text);
    if text.len() < 2 || !text.starts_with('\'') || !text.ends_with('\'') {
        return Err(malformed());
    }
    let decoded = unescape(&text[1..text.len() - 1], '\'').map_err(|_| malformed())?;
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(malformed()),
    }
}

fn unescape(body: &str, quote: char) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == quote {
            return Err(format!("unescaped {} in literal", quote));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escape = chars.next().ok_or_else(|| "unterminated escape sequence".to_string())?;
        let decoded = match escape {
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            '\\' => '\\',
            c if c == quote => c,
            'x' => read_code_point(&mut chars, 2, 16)?,
            'u' => read_code_point(&mut chars, 4, 16)?,
            'U' => read_code_point(&mut chars, 8, 16)?,
            first @ '0'..='7' => {
                let rest: String = chars.by_ref().take(2).collect();
                let digits = format!("{}{}", first, rest);
                let value = u32::from_str_radix(&digits, 8)
                    .map_err(|_| format!("invalid octal escape \\{}", digits))?;
                if digits.len() != 3 || value > 255 {
                    return Err(format!("invalid octal escape \\{}", digits));
                }
                char::from_u32(value).ok_or_else(|| format!("invalid octal escape \\{}", digits))?
            }
            other => return Err(format!("unknown escape sequence \\{}", other)),
        };
        out.push(decoded);
    }
    Ok(out)
}

fn read_code_point(chars: &mut std::str::Chars<'_>, len: usize, radix: u32) -> Result<char, String> {
    let digits: String = chars.take(len).collect();
    if digits.len() != len {
        return Err(format!("short escape sequence {:?}", digits));
    }
    u32::from_str_radix(&digits, radix)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("invalid escape value {:?}", digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{lex, LexOptions};

    const FUNCS: &[&str] = &["printf", "len", "index", "and", "join"];

    fn parse_str(source: &str) -> Result<Registry, ParseError> {
        let tokens = lex(source, &LexOptions::default());
        parse("t", tokens, &|name: &str| FUNCS.contains(&name))
    }

    fn canonical(source: &str) -> String {
        let registry = parse_str(source).unwrap();
        registry["t"].to_string()
    }

    fn parse_err(source: &str) -> String {
        parse_str(source).unwrap_err().message
    }

    fn first_args(source: &str) -> Vec<Node> {
        let registry = parse_str(source).unwrap();
        match &registry["t"].nodes[0] {
            Node::Action(action) => action.pipe.cmds[0].args.clone(),
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_canonical_text() {
        let cases = [
            ("hello", "hello"),
            ("{{.X|.Y}}", "{{.X | .Y}}"),
            ("{{ .A.B }}", "{{.A.B}}"),
            ("{{$x := .}}{{$x.Name}}", "{{$x := .}}{{$x.Name}}"),
            ("{{printf \"%d\" 3|printf \"%s\"}}", "{{printf \"%d\" 3 | printf \"%s\"}}"),
            ("{{(len .).X}}", "{{(len .).X}}"),
            ("{{if .A}}a{{else}}b{{end}}", "{{if .A}}a{{else}}b{{end}}"),
            (
                "{{if .A}}a{{else if .B}}b{{end}}",
                "{{if .A}}a{{else}}{{if .B}}b{{end}}{{end}}",
            ),
            (
                "{{range $i, $e := .}}{{$e}}{{end}}",
                "{{range $i, $e := .}}{{$e}}{{end}}",
            ),
            ("{{with .X}}{{.}}{{end}}", "{{with .X}}{{.}}{{end}}"),
            ("{{template \"x\"}}", "{{template \"x\"}}"),
            ("{{template `x` .Y}}", "{{template \"x\" .Y}}"),
        ];
        for (source, expected) in cases {
            assert_eq!(canonical(source), expected, "source {:?}", source);
        }
    }

    #[test]
    fn test_define_registers_definition() {
        let registry = parse_str("{{define \"T1\"}}hi{{end}}{{template \"T1\"}}").unwrap();
        let names: Vec<&String> = registry.keys().collect();
        assert_eq!(names, vec!["T1", "t"]);
        assert_eq!(registry["T1"].to_string(), "hi");
        assert_eq!(registry["t"].to_string(), "{{template \"T1\"}}");
    }

    #[test]
    fn test_block_defines_and_invokes() {
        let registry = parse_str("a{{block \"b\" .X}}body{{end}}c").unwrap();
        assert_eq!(registry["b"].to_string(), "body");
        assert_eq!(registry["t"].to_string(), "a{{template \"b\" .X}}c");
    }

    #[test]
    fn test_redefinition_overwrites() {
        let mut registry = Registry::new();
        add_tree(&mut registry, "x", ListNode {
            nodes: vec![Node::Text("body".to_string())],
        });
        add_tree(&mut registry, "y", ListNode::new());
        add_tree(&mut registry, "x", ListNode {
            nodes: vec![Node::Text("  \n".to_string())],
        });
        assert_eq!(registry["x"].to_string(), "  \n");
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        add_tree(&mut registry, "x", ListNode {
            nodes: vec![Node::Text("new".to_string())],
        });
        assert_eq!(registry["x"].to_string(), "new");
    }

    #[test]
    fn test_definition_has_fresh_scope() {
        let err = parse_err("{{$x := 1}}{{define \"a\"}}{{$x}}{{end}}");
        assert_eq!(err, "undefined variable \"$x\"");
    }

    #[test]
    fn test_branch_scope_is_released() {
        assert!(parse_str("{{if true}}{{$x := 1}}{{$x}}{{end}}").is_ok());
        let err = parse_err("{{if true}}{{$x := 1}}{{end}}{{$x}}");
        assert_eq!(err, "undefined variable \"$x\"");
        let err = parse_err("{{with $y := .}}{{end}}{{$y}}");
        assert_eq!(err, "undefined variable \"$y\"");
    }

    #[test]
    fn test_number_literals() {
        let args = first_args("{{printf 1 02 0x10 1e3 'a' 1+2i 1_000 -7 0b11 0o7 0x1p-2 2.5i}}");
        let values: Vec<String> = args[1..]
            .iter()
            .map(|node| match node {
                Node::Number(n) => format!("{:?}", n.value),
                Node::Complex(c) => format!("({}, {})", c.re, c.im),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(
            values,
            vec![
                "Int(1)",
                "Int(2)",
                "Int(16)",
                "Float(1000.0)",
                "Rune('a')",
                "(1, 2)",
                "Int(1000)",
                "Int(-7)",
                "Int(3)",
                "Int(7)",
                "Float(0.25)",
                "(0, 2.5)",
            ]
        );
    }

    #[test]
    fn test_string_literals() {
        let args = first_args(r#"{{printf "a\tbé\x41" `raw\n` '\n'}}"#);
        match (&args[1], &args[2], &args[3]) {
            (Node::String(quoted), Node::String(raw), Node::Number(rune)) => {
                assert_eq!(quoted.text, "a\tbéA");
                assert_eq!(raw.text, "raw\\n");
                assert_eq!(rune.value, Number::Rune('\n'));
            }
            other => panic!("unexpected args {:?}", other),
        }
    }

    #[test]
    fn test_chain_nodes() {
        let args = first_args("{{(index . 0).Name.First}}");
        match &args[0] {
            Node::Chain(chain) => {
                assert!(matches!(chain.node.as_ref(), Node::Pipe(_)));
                assert_eq!(chain.fields, vec!["Name", "First"]);
            }
            other => panic!("expected chain, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("{{undefinedFunction}}", "function \"undefinedFunction\" not defined"),
            ("{{end}}", "unmatched end"),
            ("{{else}}", "unmatched else"),
            ("{{if .X}}a{{else}}b{{else}}c{{end}}", "unmatched else"),
            ("{{if .X}}a", "unexpected EOF"),
            ("{{if}}x{{end}}", "missing value for if"),
            ("{{range}}x{{end}}", "missing value for range"),
            ("{{()}}", "missing value for parenthesized pipeline"),
            ("{{.X | 3}}", "non executable command in pipeline stage 2"),
            ("{{true.X}}", "unexpected . after term \"true\""),
            ("{{$x}}", "undefined variable \"$x\""),
            ("{{$x = 3}}", "undefined variable \"$x\""),
            ("{{$a, $b := .}}", "too many declarations in command"),
            ("{{range $a, 3 := .}}{{end}}", "range can only initialize variables"),
            ("{{template .}}", "unexpected <.> in template clause"),
            ("{{define \"a\"}}x{{else}}y{{end}}", "unexpected {{else}} in define clause"),
            ("{{.X", "unclosed action"),
            ("{{99999999999999999999}}", "integer overflow: \"99999999999999999999\""),
            ("{{-0x8000000000000001}}", "integer overflow: \"-0x8000000000000001\""),
            ("{{08}}", "illegal number syntax: \"08\""),
            ("{{+}}", "illegal number syntax: \"+\""),
        ];
        for (source, expected) in cases {
            let err = parse_str(source).unwrap_err();
            assert_eq!(err.message, expected, "source {:?}", source);
        }
    }

    #[test]
    fn test_error_position() {
        let err = parse_str("line one\n  {{nope}}").unwrap_err();
        assert_eq!((err.line, err.column), (2, 5));
        assert_eq!(err.to_string(), "template: t:2:5: function \"nope\" not defined");
    }

    #[test]
    fn test_lexical_error_is_reported() {
        let err = parse_str("{{\"abc}}").unwrap_err();
        assert!(err.lexical);
        assert_eq!(err.message, "unterminated quoted string");
    }
}
