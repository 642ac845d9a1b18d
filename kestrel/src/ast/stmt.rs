//! Statement AST nodes

use super::{Expr, Spanned};
use serde::{Deserialize, Serialize};

/// A `{ ... }` statement list
pub type Block = Vec<Spanned<Stmt>>;

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// Expression evaluated for its effect
    Expr(Spanned<Expr>),

    /// `if (c) {..} elif (c) {..} else {..}`; `branches[0]` is the `if`
    If {
        branches: Vec<(Spanned<Expr>, Block)>,
        else_block: Option<Block>,
    },

    /// `switch (e) { case v: .. default: .. }`
    Switch {
        scrutinee: Spanned<Expr>,
        cases: Vec<(Spanned<Expr>, Block)>,
        default: Option<Block>,
    },

    /// `while (c) {..}`
    While { cond: Spanned<Expr>, body: Block },

    /// `for (init; cond; post) {..}`
    For {
        init: Option<Spanned<Expr>>,
        cond: Option<Spanned<Expr>>,
        post: Option<Spanned<Expr>>,
        body: Block,
    },

    /// `foreach (key, value in over) {..}` or `foreach (value in over) {..}`
    Foreach {
        key: Option<String>,
        value: String,
        over: Spanned<Expr>,
        body: Block,
    },

    Break,
    Continue,

    /// `return e;` / `return;`
    Return(Option<Spanned<Expr>>),

    /// `require name;`
    Require(String),
}
