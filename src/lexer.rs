use crate::token::{Token, TokenKind};

/// Width of a trim marker plus the whitespace that must sit next to it.
const TRIM_MARKER_LEN: usize = 2;

const DECIMAL_DIGITS: &str = "0123456789_";
const HEX_DIGITS: &str = "0123456789abcdefABCDEF_";
const OCTAL_DIGITS: &str = "01234567_";
const BINARY_DIGITS: &str = "01_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexOptions {
    pub left_delim: String,
    pub right_delim: String,
    pub left_comment: String,
    pub right_comment: String,
    /// Emit comment tokens instead of dropping them.
    pub emit_comments: bool,
}

impl Default for LexOptions {
    fn default() -> Self {
        Self {
            left_delim: "{{".to_string(),
            right_delim: "}}".to_string(),
            left_comment: "/*".to_string(),
            right_comment: "*/".to_string(),
            emit_comments: false,
        }
    }
}

/// Tokenize a template. The returned stream always ends with exactly one
/// `Eof` or `Error` token.
pub fn lex(input: &str, options: &LexOptions) -> Vec<Token> {
    let mut lexer = Lexer::new(input, options);
    let mut state = Some(State::Text);
    while let Some(current) = state {
        state = lexer.step(current);
    }
    lexer.tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    LeftDelim,
    Comment,
    InsideAction,
    RightDelim,
    Space,
    Identifier,
    Field,
    Variable,
    Quote,
    RawQuote,
    CharConstant,
    Number,
}

struct Lexer<'a> {
    input: &'a str,
    options: &'a LexOptions,
    start: usize,
    pos: usize,
    paren_depth: i32,
    tokens: Vec<Token>,
    // Incremental line tracking; token starts only move forward.
    seen: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, options: &'a LexOptions) -> Self {
        Self {
            input,
            options,
            start: 0,
            pos: 0,
            paren_depth: 0,
            tokens: Vec::new(),
            seen: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn step(&mut self, state: State) -> Option<State> {
        match state {
            State::Text => self.lex_text(),
            State::LeftDelim => self.lex_left_delim(),
            State::Comment => self.lex_comment(),
            State::InsideAction => self.lex_inside_action(),
            State::RightDelim => self.lex_right_delim(),
            State::Space => self.lex_space(),
            State::Identifier => self.lex_identifier(),
            State::Field => self.lex_field_or_variable(TokenKind::Field),
            State::Variable => self.lex_field_or_variable(TokenKind::Variable),
            State::Quote => self.lex_quote(),
            State::RawQuote => self.lex_raw_quote(),
            State::CharConstant => self.lex_char(),
            State::Number => self.lex_number(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn backup(&mut self, c: char) {
        self.pos -= c.len_utf8();
    }

    fn accept(&mut self, valid: &str) -> bool {
        match self.peek() {
            Some(c) if valid.contains(c) => {
                self.pos += c.len_utf8();
                true
            }
            _ => false,
        }
    }

    fn accept_run(&mut self, valid: &str) {
        while self.accept(valid) {}
    }

    fn location(&mut self, offset: usize) -> (usize, usize) {
        if offset < self.seen {
            self.seen = 0;
            self.line = 1;
            self.line_start = 0;
        }
        for (i, b) in self.input[self.seen..offset].bytes().enumerate() {
            if b == b'\n' {
                self.line += 1;
                self.line_start = self.seen + i + 1;
            }
        }
        self.seen = offset;
        let column = self.input[self.line_start..offset].chars().count() + 1;
        (self.line, column)
    }

    fn token(&mut self, kind: TokenKind) -> Token {
        let (line, column) = self.location(self.start);
        Token {
            kind,
            text: self.input[self.start..self.pos].to_string(),
            pos: self.start,
            line,
            column,
        }
    }

    fn emit(&mut self, kind: TokenKind) {
        let token = self.token(kind);
        self.tokens.push(token);
        self.start = self.pos;
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    /// Emit an error token and stop the machine.
    fn error(&mut self, message: impl Into<String>) -> Option<State> {
        let (line, column) = self.location(self.start);
        self.tokens.push(Token {
            kind: TokenKind::Error,
            text: message.into(),
            pos: self.start,
            line,
            column,
        });
        None
    }

    fn at_right_delim(&self) -> (bool, bool) {
        let rest = self.rest();
        let right = self.options.right_delim.as_str();
        if has_right_trim_marker(rest) && rest[TRIM_MARKER_LEN..].starts_with(right) {
            return (true, true);
        }
        (rest.starts_with(right), false)
    }

    fn at_terminator(&self) -> bool {
        match self.peek() {
            None => true,
            Some(c) if is_space(c) => true,
            Some('.' | ',' | '|' | ':' | ')' | '(') => true,
            Some(_) => self.at_right_delim().0,
        }
    }

    fn lex_text(&mut self) -> Option<State> {
        let left = self.options.left_delim.as_str();
        if let Some(x) = self.rest().find(left) {
            if x > 0 {
                self.pos += x;
                let delim_end = self.pos + left.len();
                let trim = if has_left_trim_marker(&self.input[delim_end..]) {
                    right_trim_len(&self.input[self.start..self.pos])
                } else {
                    0
                };
                self.pos -= trim;
                if self.pos > self.start {
                    self.emit(TokenKind::Text);
                }
                self.pos += trim;
                self.ignore();
            }
            return Some(State::LeftDelim);
        }
        self.pos = self.input.len();
        if self.pos > self.start {
            self.emit(TokenKind::Text);
        }
        self.emit(TokenKind::Eof);
        None
    }

    fn lex_left_delim(&mut self) -> Option<State> {
        self.pos += self.options.left_delim.len();
        let after_marker = if has_left_trim_marker(self.rest()) {
            TRIM_MARKER_LEN
        } else {
            0
        };
        if self.input[self.pos + after_marker..].starts_with(self.options.left_comment.as_str()) {
            self.pos += after_marker;
            self.ignore();
            return Some(State::Comment);
        }
        self.emit(TokenKind::LeftDelim);
        self.pos += after_marker;
        self.ignore();
        self.paren_depth = 0;
        Some(State::InsideAction)
    }

    fn lex_comment(&mut self) -> Option<State> {
        self.pos += self.options.left_comment.len();
        let right_comment = self.options.right_comment.as_str();
        let Some(x) = self.rest().find(right_comment) else {
            return self.error("unclosed comment");
        };
        self.pos += x + right_comment.len();
        let (delim, trim) = self.at_right_delim();
        if !delim {
            return self.error("comment closed leaving delim still open");
        }
        let comment = self.token(TokenKind::Comment);
        if trim {
            self.pos += TRIM_MARKER_LEN;
        }
        self.pos += self.options.right_delim.len();
        if trim {
            self.pos += left_trim_len(self.rest());
        }
        self.ignore();
        if self.options.emit_comments {
            self.tokens.push(comment);
        }
        Some(State::Text)
    }

    fn lex_right_delim(&mut self) -> Option<State> {
        let (_, trim) = self.at_right_delim();
        if trim {
            self.pos += TRIM_MARKER_LEN;
            self.ignore();
        }
        self.pos += self.options.right_delim.len();
        self.emit(TokenKind::RightDelim);
        if trim {
            self.pos += left_trim_len(self.rest());
            self.ignore();
        }
        Some(State::Text)
    }

    fn lex_inside_action(&mut self) -> Option<State> {
        let (delim, _) = self.at_right_delim();
        if delim {
            if self.paren_depth == 0 {
                return Some(State::RightDelim);
            }
            return self.error("unclosed left paren");
        }
        let Some(c) = self.next() else {
            return self.error("unclosed action");
        };
        match c {
            c if is_space(c) => {
                // Put the space back in case this is " -}}".
                self.backup(c);
                return Some(State::Space);
            }
            '=' => self.emit(TokenKind::Assign),
            ':' => {
                if self.next() != Some('=') {
                    return self.error("expected :=");
                }
                self.emit(TokenKind::Declare);
            }
            '|' => self.emit(TokenKind::Pipe),
            '"' => return Some(State::Quote),
            '`' => return Some(State::RawQuote),
            '$' => return Some(State::Variable),
            '\'' => return Some(State::CharConstant),
            '.' => {
                // ".5" is a number, ".Field" is a field.
                match self.peek() {
                    Some(n) if !n.is_ascii_digit() => return Some(State::Field),
                    _ => {
                        self.backup(c);
                        return Some(State::Number);
                    }
                }
            }
            '+' | '-' | '0'..='9' => {
                self.backup(c);
                return Some(State::Number);
            }
            c if is_alphanumeric(c) => {
                self.backup(c);
                return Some(State::Identifier);
            }
            '(' => {
                self.paren_depth += 1;
                self.emit(TokenKind::LeftParen);
            }
            ')' => {
                self.paren_depth -= 1;
                if self.paren_depth < 0 {
                    return self.error("unexpected right paren");
                }
                self.emit(TokenKind::RightParen);
            }
            c if c.is_ascii() && !c.is_ascii_control() => self.emit(TokenKind::Char),
            c => return self.error(format!("bad character in action: {:?}", c)),
        }
        Some(State::InsideAction)
    }

    fn lex_space(&mut self) -> Option<State> {
        let mut spaces = 0;
        while let Some(c) = self.peek() {
            if !is_space(c) {
                break;
            }
            self.pos += 1;
            spaces += 1;
        }
        // A trim-marked right delimiter has its minus after a space.
        let last = self.pos - 1;
        if has_right_trim_marker(&self.input[last..])
            && self.input[last + TRIM_MARKER_LEN..].starts_with(self.options.right_delim.as_str())
        {
            self.pos -= 1;
            if spaces == 1 {
                return Some(State::RightDelim);
            }
        }
        self.emit(TokenKind::Space);
        Some(State::InsideAction)
    }

    fn lex_identifier(&mut self) -> Option<State> {
        while let Some(c) = self.peek() {
            if !is_alphanumeric(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        if !self.at_terminator() {
            return self.bad_character();
        }
        let word = &self.input[self.start..self.pos];
        let kind = match TokenKind::keyword(word) {
            Some(keyword) => keyword,
            None if word == "true" || word == "false" => TokenKind::Bool,
            None => TokenKind::Identifier,
        };
        self.emit(kind);
        Some(State::InsideAction)
    }

    fn lex_field_or_variable(&mut self, kind: TokenKind) -> Option<State> {
        if self.at_terminator() {
            // A lone "." or "$".
            let kind = if kind == TokenKind::Variable {
                TokenKind::Variable
            } else {
                TokenKind::Dot
            };
            self.emit(kind);
            return Some(State::InsideAction);
        }
        while let Some(c) = self.peek() {
            if !is_alphanumeric(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        if !self.at_terminator() {
            return self.bad_character();
        }
        self.emit(kind);
        Some(State::InsideAction)
    }

    fn bad_character(&mut self) -> Option<State> {
        match self.peek() {
            Some(c) => self.error(format!("bad character {:?}", c)),
            None => self.error("unclosed action"),
        }
    }

    fn lex_quote(&mut self) -> Option<State> {
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some(c) if c != '\n' => {}
                    _ => return self.error("unterminated quoted string"),
                },
                None | Some('\n') => return self.error("unterminated quoted string"),
                Some('"') => break,
                Some(_) => {}
            }
        }
        self.emit(TokenKind::String);
        Some(State::InsideAction)
    }

    fn lex_raw_quote(&mut self) -> Option<State> {
        loop {
            match self.next() {
                None | Some('\n') => return self.error("unterminated raw quoted string"),
                Some('`') => break,
                Some(_) => {}
            }
        }
        self.emit(TokenKind::RawString);
        Some(State::InsideAction)
    }

    fn lex_char(&mut self) -> Option<State> {
        loop {
            match self.next() {
                Some('\\') => match self.next() {
                    Some(c) if c != '\n' => {}
                    _ => return self.error("unterminated character constant"),
                },
                None | Some('\n') => return self.error("unterminated character constant"),
                Some('\'') => break,
                Some(_) => {}
            }
        }
        self.emit(TokenKind::CharConstant);
        Some(State::InsideAction)
    }

    fn lex_number(&mut self) -> Option<State> {
        if !self.scan_number() {
            return self.bad_number();
        }
        if matches!(self.peek(), Some('+' | '-')) {
            // Complex: 1+2i, no spaces, must end in 'i'.
            if !self.scan_number() || !self.input[..self.pos].ends_with('i') {
                return self.bad_number();
            }
            self.emit(TokenKind::Complex);
        } else {
            self.emit(TokenKind::Number);
        }
        Some(State::InsideAction)
    }

    fn bad_number(&mut self) -> Option<State> {
        let text = self.input[self.start..self.pos].to_string();
        self.error(format!("bad number syntax: {:?}", text))
    }

    fn scan_number(&mut self) -> bool {
        self.accept("+-");
        let mut digits = DECIMAL_DIGITS;
        if self.accept("0") {
            if self.accept("xX") {
                digits = HEX_DIGITS;
            } else if self.accept("oO") {
                digits = OCTAL_DIGITS;
            } else if self.accept("bB") {
                digits = BINARY_DIGITS;
            }
        }
        self.accept_run(digits);
        if self.accept(".") {
            self.accept_run(digits);
        }
        if digits == DECIMAL_DIGITS && self.accept("eE") {
            self.accept("+-");
            self.accept_run(DECIMAL_DIGITS);
        }
        if digits == HEX_DIGITS && self.accept("pP") {
            self.accept("+-");
            self.accept_run(DECIMAL_DIGITS);
        }
        self.accept("i");
        if let Some(c) = self.peek() {
            if is_alphanumeric(c) {
                self.next();
                return false;
            }
        }
        true
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn has_left_trim_marker(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0] == b'-' && is_space(bytes[1] as char)
}

fn has_right_trim_marker(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && is_space(bytes[0] as char) && bytes[1] == b'-'
}

fn left_trim_len(s: &str) -> usize {
    s.len() - s.trim_start_matches(is_space).len()
}

fn right_trim_len(s: &str) -> usize {
    s.len() - s.trim_end_matches(is_space).len()
}
