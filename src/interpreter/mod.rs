pub mod builtins;
pub mod error;
pub mod executor;
pub mod parser;
pub mod scope;

pub use builtins::{default_functions, FuncMap, Function};
pub use error::{ExecError, ParseError};
pub use executor::{Executor, DEFAULT_MAX_DEPTH};
pub use parser::{add_tree, parse, Registry, TokenParser};
pub use scope::{ScopeStack, VarStack};
