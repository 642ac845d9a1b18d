//! Abstract Syntax Tree definitions

mod expr;
mod span;
mod stmt;

pub use expr::*;
pub use span::*;
pub use stmt::*;

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A parsed source file: named top-level functions plus the top-level statement block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Package name (`main` for the entry file)
    pub name: String,
    /// File the module was parsed from
    pub file: Rc<str>,
    pub functions: Vec<Rc<FnDef>>,
    pub body: Rc<Block>,
}

/// Function definition (named top-level function or function literal)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FnDef {
    pub name: Option<String>,
    pub params: Vec<Spanned<String>>,
    pub body: Block,
    pub span: Span,
    /// File the definition lives in, for diagnostics raised inside the body
    pub file: Rc<str>,
}

impl FnDef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}
