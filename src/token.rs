use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Error,
    Eof,

    // Structure
    Text,
    Comment,
    LeftDelim,
    RightDelim,
    LeftParen,
    RightParen,
    Space,

    // Literals
    Bool,
    Number,
    Complex,
    CharConstant,
    String,
    RawString,

    // References
    Field,
    Variable,
    Identifier,

    // Punctuation
    Pipe,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    /// Any other printable ASCII character inside an action, e.g. `,`
    Char,

    // Keywords
    Block,
    Define,
    Dot,
    Else,
    End,
    If,
    Nil,
    Range,
    Template,
    With,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "." => TokenKind::Dot,
            "block" => TokenKind::Block,
            "define" => TokenKind::Define,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "if" => TokenKind::If,
            "nil" => TokenKind::Nil,
            "range" => TokenKind::Range,
            "template" => TokenKind::Template,
            "with" => TokenKind::With,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Block
                | TokenKind::Define
                | TokenKind::Dot
                | TokenKind::Else
                | TokenKind::End
                | TokenKind::If
                | TokenKind::Nil
                | TokenKind::Range
                | TokenKind::Template
                | TokenKind::With
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Error => "error",
            TokenKind::Eof => "EOF",
            TokenKind::Text => "text",
            TokenKind::Comment => "comment",
            TokenKind::LeftDelim => "left delim",
            TokenKind::RightDelim => "right delim",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::Space => "space",
            TokenKind::Bool => "bool",
            TokenKind::Number => "number",
            TokenKind::Complex => "complex",
            TokenKind::CharConstant => "character constant",
            TokenKind::String => "quoted string",
            TokenKind::RawString => "raw string",
            TokenKind::Field => "field",
            TokenKind::Variable => "variable",
            TokenKind::Identifier => "identifier",
            TokenKind::Pipe => "|",
            TokenKind::Declare => ":=",
            TokenKind::Assign => "=",
            TokenKind::Char => "character",
            TokenKind::Block => "<block>",
            TokenKind::Define => "<define>",
            TokenKind::Dot => "<.>",
            TokenKind::Else => "<else>",
            TokenKind::End => "<end>",
            TokenKind::If => "<if>",
            TokenKind::Nil => "<nil>",
            TokenKind::Range => "<range>",
            TokenKind::Template => "<template>",
            TokenKind::With => "<with>",
        }
    }
}

/// A lexed token. `pos` is the byte offset of `text` in the source, `line`
/// and `column` are 1-based (column counts characters).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn end(&self) -> usize {
        self.pos + self.text.len()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::Error => write!(f, "{}", self.text),
            TokenKind::Text | TokenKind::Comment if self.text.len() > 10 => {
                let head: String = self.text.chars().take(10).collect();
                write!(f, "{:?}...", head)
            }
            kind if kind.is_keyword() => write!(f, "<{}>", self.text),
            _ => write!(f, "{:?}", self.text),
        }
    }
}
