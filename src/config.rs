use crate::interpreter::DEFAULT_MAX_DEPTH;
use crate::lexer::LexOptions;

/// Parsing and execution settings for a [`Template`](crate::Template).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub left_delim: String,
    pub right_delim: String,
    pub left_comment: String,
    pub right_comment: String,
    /// Keep comments in the parsed tree.
    pub emit_comments: bool,
    /// Nested `template` invocations allowed during one execution.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        let lex = LexOptions::default();
        Self {
            left_delim: lex.left_delim,
            right_delim: lex.right_delim,
            left_comment: lex.left_comment,
            right_comment: lex.right_comment,
            emit_comments: lex.emit_comments,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    pub fn delims(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_delim = left.into();
        self.right_delim = right.into();
        self
    }

    pub fn comments(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_comment = left.into();
        self.right_comment = right.into();
        self
    }

    pub fn emit_comments(mut self, emit: bool) -> Self {
        self.emit_comments = emit;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Lexer settings, with empty delimiters replaced by the defaults.
    pub fn lex_options(&self) -> LexOptions {
        let defaults = LexOptions::default();
        let pick = |value: &str, fallback: String| {
            if value.is_empty() {
                fallback
            } else {
                value.to_string()
            }
        };
        LexOptions {
            left_delim: pick(&self.left_delim, defaults.left_delim),
            right_delim: pick(&self.right_delim, defaults.right_delim),
            left_comment: pick(&self.left_comment, defaults.left_comment),
            right_comment: pick(&self.right_comment, defaults.right_comment),
            emit_comments: self.emit_comments,
        }
    }
}
