//! Expression AST nodes

use super::{FnDef, Spanned};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Character literal (single byte)
    CharLit(u8),
    /// Boolean literal
    BoolLit(bool),
    /// 32-bit integer literal
    IntLit(i32),
    /// 64-bit integer literal (`42L`)
    LongLit(i64),
    /// Single precision literal (`1.5f`)
    FloatLit(f32),
    /// Double precision literal
    DoubleLit(f64),
    /// String literal
    StringLit(String),
    /// `null`
    Null,

    /// Variable reference
    Ident(String),

    /// Assignment to a name: `name = value`
    Assign {
        name: String,
        value: Box<Spanned<Expr>>,
    },

    /// Assignment through an index: `object[index] = value` / `object.field = value`
    IndexAssign {
        object: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },

    /// Function call
    Call {
        callee: Box<Spanned<Expr>>,
        args: Vec<Spanned<Expr>>,
    },

    /// Unary operation
    Unary {
        op: UnOp,
        expr: Box<Spanned<Expr>>,
    },

    /// Binary operation, including the short-circuiting `&&` and `||`
    Binary {
        left: Box<Spanned<Expr>>,
        op: BinOp,
        right: Box<Spanned<Expr>>,
    },

    /// Index read: `object[index]` / `object.field`
    Index {
        object: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },

    /// Array constructor: `[a, b, c]`
    Array(Vec<Spanned<Expr>>),

    /// Table constructor: `{ key: value, ... }`
    Table(Vec<(Spanned<Expr>, Spanned<Expr>)>),

    /// Function literal: `func (a, b) { ... }`
    Function(Rc<FnDef>),
}

impl Expr {
    /// Printable name of a callee, used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::Index { object, index } => match &index.node {
                Expr::StringLit(field) => format!("{}.{}", object.node.describe(), field),
                _ => format!("{}[...]", object.node.describe()),
            },
            Expr::Call { callee, .. } => format!("{}(...)", callee.node.describe()),
            Expr::Function(def) => def.display_name().to_string(),
            _ => "expression".to_string(),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    /// Logical (unsigned) shift right `>>>`
    UShr,
    And,
    Or,
}

impl BinOp {
    /// Source spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::UShr => ">>>",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le | BinOp::Eq | BinOp::Ne
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Arithmetic negation `-`
    Neg,
    /// Boolean not `!`
    Not,
    /// Bitwise complement `~`
    BitNot,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
        }
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn spanned<T>(node: T) -> Spanned<T> {
        Spanned::new(node, Span::default())
    }

    #[test]
    fn test_binop_symbols() {
        assert_eq!(BinOp::UShr.symbol(), ">>>");
        assert_eq!(BinOp::And.to_string(), "&&");
        assert!(BinOp::Le.is_comparison());
        assert!(!BinOp::Add.is_comparison());
    }

    #[test]
    fn test_describe_member_callee() {
        let expr = Expr::Index {
            object: Box::new(spanned(Expr::Ident("math".to_string()))),
            index: Box::new(spanned(Expr::StringLit("sqrt".to_string()))),
        };
        assert_eq!(expr.describe(), "math.sqrt");
        assert_eq!(Expr::IntLit(1).describe(), "expression");
    }
}
