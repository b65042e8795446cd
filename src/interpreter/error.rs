use crate::diagnostic::{Diagnostic, Label, Span};
use crate::token::Token;

/// A lexical or grammatical error. Parsing stops at the first one.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub template: String,
    pub message: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    /// Raised by the lexer rather than the grammar.
    pub lexical: bool,
}

impl ParseError {
    pub fn new(template: impl Into<String>, message: impl Into<String>, token: &Token) -> Self {
        Self {
            template: template.into(),
            message: message.into(),
            span: Span::new(token.pos, token.end().max(token.pos + 1)),
            line: token.line,
            column: token.column,
            lexical: false,
        }
    }

    /// Wrap the terminal error token of a token stream.
    pub fn lexical(template: impl Into<String>, token: &Token) -> Self {
        Self {
            template: template.into(),
            message: token.text.clone(),
            span: Span::new(token.pos, token.pos + 1),
            line: token.line,
            column: token.column,
            lexical: true,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = if self.lexical { "E0100" } else { "E0101" };
        Diagnostic::error(self.message.clone())
            .with_code(code)
            .with_label(Label::primary(self.span, ""))
            .with_note(format!("in template `{}`", self.template))
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "template: {}:{}:{}: {}",
            self.template, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
pub enum ExecError {
    /// `execute` was asked for a name that was never parsed.
    NotFound { name: String },
    /// A `{{template}}` action names an unknown template.
    TemplateNotDefined { name: String, span: Span },
    Field { field: String, type_name: String, span: Span },
    UndefinedFunction { name: String, span: Span },
    Function { name: String, message: String, span: Span },
    Type { message: String, span: Span },
    DepthExceeded { name: String, limit: usize, span: Span },
    Io(std::io::Error),
}

impl ExecError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn template_not_defined_at(name: impl Into<String>, span: Span) -> Self {
        Self::TemplateNotDefined { name: name.into(), span }
    }

    pub fn field_at(field: impl Into<String>, type_name: impl Into<String>, span: Span) -> Self {
        Self::Field {
            field: field.into(),
            type_name: type_name.into(),
            span,
        }
    }

    pub fn undefined_function_at(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedFunction { name: name.into(), span }
    }

    pub fn function_at(name: impl Into<String>, message: impl Into<String>, span: Span) -> Self {
        Self::Function {
            name: name.into(),
            message: message.into(),
            span,
        }
    }

    pub fn type_error_at(message: impl Into<String>, span: Span) -> Self {
        Self::Type { message: message.into(), span }
    }

    pub fn depth_exceeded_at(name: impl Into<String>, limit: usize, span: Span) -> Self {
        Self::DepthExceeded {
            name: name.into(),
            limit,
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::NotFound { .. } | Self::Io(_) => Span::dummy(),
            Self::TemplateNotDefined { span, .. } => *span,
            Self::Field { span, .. } => *span,
            Self::UndefinedFunction { span, .. } => *span,
            Self::Function { span, .. } => *span,
            Self::Type { span, .. } => *span,
            Self::DepthExceeded { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let span = self.span();
        match self {
            Self::NotFound { .. } => Diagnostic::error(self.to_string())
                .with_code("E0201")
                .with_help("parse a template with this name first"),
            Self::TemplateNotDefined { .. } => Diagnostic::error(self.to_string())
                .with_code("E0202")
                .with_label(Label::primary(span, "invoked here")),
            Self::Field { .. } => Diagnostic::error(self.to_string())
                .with_code("E0203")
                .with_label(Label::primary(span, "unknown field")),
            Self::UndefinedFunction { .. } => Diagnostic::error(self.to_string())
                .with_code("E0204")
                .with_label(Label::primary(span, "not in the function table")),
            Self::Function { .. } => Diagnostic::error(self.to_string())
                .with_code("E0205")
                .with_label(Label::primary(span, "")),
            Self::Type { .. } => Diagnostic::error(self.to_string())
                .with_code("E0206")
                .with_label(Label::primary(span, "")),
            Self::DepthExceeded { .. } => Diagnostic::error(self.to_string())
                .with_code("E0207")
                .with_label(Label::primary(span, "invoked here"))
                .with_help("look for a template that invokes itself unconditionally"),
            Self::Io(_) => Diagnostic::error(self.to_string()).with_code("E0208"),
        }
    }
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::NotFound { name } => write!(f, "template {:?} not found", name),
            ExecError::TemplateNotDefined { name, .. } => {
                write!(f, "template {:?} not defined", name)
            }
            ExecError::Field { field, type_name, .. } => {
                write!(f, "can't evaluate field {} in type {}", field, type_name)
            }
            ExecError::UndefinedFunction { name, .. } => {
                write!(f, "function {:?} not defined", name)
            }
            ExecError::Function { name, message, .. } => {
                write!(f, "error calling {}: {}", name, message)
            }
            ExecError::Type { message, .. } => write!(f, "{}", message),
            ExecError::DepthExceeded { name, limit, .. } => write!(
                f,
                "exceeded maximum template depth ({}) invoking {:?}",
                limit, name
            ),
            ExecError::Io(err) => write!(f, "write error: {}", err),
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExecError {
    fn from(err: std::io::Error) -> Self {
        ExecError::Io(err)
    }
}
