pub mod ast;
pub mod cli;
pub mod config;
pub mod convert;
pub mod diagnostic;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod template;
pub mod token;
pub mod value;

pub use config::Config;
pub use interpreter::{ExecError, FuncMap, Function, ParseError};
pub use template::Template;
pub use token::{Token, TokenKind};
pub use value::{FieldAccess, Record, Value};
