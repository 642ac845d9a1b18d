//! Kestrel scripting language runtime
//!
//! Source text is tokenized, parsed into an AST and executed by a
//! tree-walking interpreter over dynamically typed values with
//! garbage-collected strings, arrays and tables.

pub mod ast;
pub mod config;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod stdlib;
pub mod util;

pub use ast::Span;
pub use config::RuntimeConfig;
pub use error::{CompileError, Error, Result};
pub use interp::{Interpreter, RuntimeError, Value};
