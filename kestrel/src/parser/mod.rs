//! Recursive-descent parser
//!
//! Precedence, loosest first: assignment (right associative), `||`, `&&`,
//! `|`, `^`, `&`, equality, relational, shifts, additive, multiplicative,
//! unary, postfix (call, index, member, `++`/`--`).

use crate::ast::{BinOp, Block, Expr, FnDef, Module, Span, Spanned, Stmt, UnOp};
use crate::error::{CompileError, Result};
use crate::interp::hash::{HashTable, NameOps, Named};
use crate::lexer::{Token, tokenize};
use std::rc::Rc;


/// Registry entry used to reject a function defined twice in one module
struct FunctionEntry {
    name: String,
}

impl Named for FunctionEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Lex and parse a source file into a module named `name`
pub fn parse_source(name: &str, file: &str, source: &str) -> Result<Module> {
    let tokens = tokenize(source, file)?;
    parse(name, file, source, tokens)
}

/// Parse tokens into a module
pub fn parse(name: &str, file: &str, source: &str, tokens: Vec<(Token, Span)>) -> Result<Module> {
    let mut parser = Parser::new(file, source, tokens);
    parser.module(name)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    file: Rc<str>,
    eof: Span,
}

impl Parser {
    fn new(file: &str, source: &str, tokens: Vec<(Token, Span)>) -> Self {
        let eof = match tokens.last() {
            Some((_, last)) => Span::with_pos(source.len(), source.len(), last.line, last.column),
            None => Span::with_pos(0, 0, 1, 1),
        };
        Parser {
            tokens,
            pos: 0,
            file: Rc::from(file),
            eof,
        }
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map(|(_, s)| *s).unwrap_or(self.eof)
    }

    fn prev_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some((_, span)) => *span,
            None => self.eof,
        }
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<Span> {
        if self.check(token) {
            self.pos += 1;
            Ok(self.prev_span())
        } else {
            Err(self.unexpected(&format!("'{token}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(Spanned::new(name, self.prev_span()))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let message = match self.peek() {
            Some(found) => format!("expected {expected}, found '{found}'"),
            None => format!("expected {expected}, found end of input"),
        };
        CompileError::parser(message, self.span(), &self.file)
    }

    fn error(&self, message: impl Into<String>, span: Span) -> CompileError {
        CompileError::parser(message, span, &self.file)
    }

    // ---- items ----

    fn module(&mut self, name: &str) -> Result<Module> {
        let mut functions = Vec::new();
        let mut registry: HashTable<FunctionEntry, NameOps> = HashTable::default();
        let mut body = Vec::new();

        while self.peek().is_some() {
            if self.check(&Token::Func) && matches!(self.peek_at(1), Some(Token::Ident(_))) {
                let def = self.function_def()?;
                let name = def.display_name().to_string();
                if !registry.insert(FunctionEntry { name: name.clone() }) {
                    return Err(CompileError::redefinition(&name, def.span, &self.file));
                }
                functions.push(Rc::new(def));
            } else {
                body.push(self.statement()?);
            }
        }

        Ok(Module {
            name: name.to_string(),
            file: self.file.clone(),
            functions,
            body: Rc::new(body),
        })
    }

    /// `func name(params) { body }`
    fn function_def(&mut self) -> Result<FnDef> {
        let start = self.expect(&Token::Func)?;
        let name = self.expect_ident()?;
        self.function_rest(start, Some(name.node))
    }

    /// Parameters and body, shared by definitions and literals
    fn function_rest(&mut self, start: Span, name: Option<String>) -> Result<FnDef> {
        self.expect(&Token::LParen)?;
        let mut params: Vec<Spanned<String>> = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let param = self.expect_ident()?;
                if params.iter().any(|p| p.node == param.node) {
                    return Err(self.error(format!("duplicate parameter '{}'", param.node), param.span));
                }
                params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.block()?;
        Ok(FnDef {
            name,
            params,
            body,
            span: start.merge(self.prev_span()),
            file: self.file.clone(),
        })
    }

    // ---- statements ----

    fn block(&mut self) -> Result<Block> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.statement()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(stmts)
    }

    fn paren_expr(&mut self) -> Result<Spanned<Expr>> {
        self.expect(&Token::LParen)?;
        let expr = self.expression()?;
        self.expect(&Token::RParen)?;
        Ok(expr)
    }

    fn statement(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.span();
        let stmt = match self.peek() {
            Some(Token::If) => self.if_stmt()?,
            Some(Token::Switch) => self.switch_stmt()?,
            Some(Token::While) => {
                self.bump();
                let cond = self.paren_expr()?;
                let body = self.block()?;
                Stmt::While { cond, body }
            }
            Some(Token::For) => self.for_stmt()?,
            Some(Token::Foreach) => self.foreach_stmt()?,
            Some(Token::Break) => {
                self.bump();
                self.expect(&Token::Semi)?;
                Stmt::Break
            }
            Some(Token::Continue) => {
                self.bump();
                self.expect(&Token::Semi)?;
                Stmt::Continue
            }
            Some(Token::Return) => {
                self.bump();
                let value = if self.check(&Token::Semi) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(&Token::Semi)?;
                Stmt::Return(value)
            }
            Some(Token::Require) => {
                self.bump();
                let name = match self.peek() {
                    Some(Token::Ident(name) | Token::StringLit(name)) => name.clone(),
                    _ => return Err(self.unexpected("module name")),
                };
                self.bump();
                self.expect(&Token::Semi)?;
                Stmt::Require(name)
            }
            Some(Token::Func) if matches!(self.peek_at(1), Some(Token::Ident(_))) => {
                return Err(self.error("functions can only be defined at the top level", start));
            }
            None => return Err(self.unexpected("statement")),
            _ => {
                let expr = self.expression()?;
                self.expect(&Token::Semi)?;
                Stmt::Expr(expr)
            }
        };
        Ok(Spanned::new(stmt, start.merge(self.prev_span())))
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        self.expect(&Token::If)?;
        let mut branches = vec![(self.paren_expr()?, self.block()?)];
        while self.eat(&Token::Elif) {
            branches.push((self.paren_expr()?, self.block()?));
        }
        let else_block = if self.eat(&Token::Else) {
            // `else if` reads as `elif`
            if self.check(&Token::If) {
                let start = self.span();
                let nested = self.if_stmt()?;
                Some(vec![Spanned::new(nested, start.merge(self.prev_span()))])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { branches, else_block })
    }

    fn switch_stmt(&mut self) -> Result<Stmt> {
        self.expect(&Token::Switch)?;
        let scrutinee = self.paren_expr()?;
        self.expect(&Token::LBrace)?;
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            match self.peek() {
                Some(Token::Case) => {
                    self.bump();
                    let value = self.expression()?;
                    self.expect(&Token::Colon)?;
                    cases.push((value, self.case_body()?));
                }
                Some(Token::Default) => {
                    let span = self.span();
                    self.bump();
                    self.expect(&Token::Colon)?;
                    if default.is_some() {
                        return Err(self.error("multiple default labels in one switch", span));
                    }
                    default = Some(self.case_body()?);
                }
                Some(Token::RBrace) => break,
                _ => return Err(self.unexpected("'case', 'default' or '}'")),
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Stmt::Switch {
            scrutinee,
            cases,
            default,
        })
    }

    fn case_body(&mut self) -> Result<Block> {
        let mut stmts = Vec::new();
        while !matches!(self.peek(), Some(Token::Case | Token::Default | Token::RBrace) | None) {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn for_stmt(&mut self) -> Result<Stmt> {
        self.expect(&Token::For)?;
        self.expect(&Token::LParen)?;
        let init = self.optional_expr(&Token::Semi)?;
        self.expect(&Token::Semi)?;
        let cond = self.optional_expr(&Token::Semi)?;
        self.expect(&Token::Semi)?;
        let post = self.optional_expr(&Token::RParen)?;
        self.expect(&Token::RParen)?;
        let body = self.block()?;
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
        })
    }

    fn optional_expr(&mut self, terminator: &Token) -> Result<Option<Spanned<Expr>>> {
        if self.check(terminator) {
            Ok(None)
        } else {
            self.expression().map(Some)
        }
    }

    fn foreach_stmt(&mut self) -> Result<Stmt> {
        self.expect(&Token::Foreach)?;
        self.expect(&Token::LParen)?;
        let first = self.expect_ident()?;
        let (key, value) = if self.eat(&Token::Comma) {
            let second = self.expect_ident()?;
            (Some(first.node), second.node)
        } else {
            (None, first.node)
        };
        self.expect(&Token::In)?;
        let over = self.expression()?;
        self.expect(&Token::RParen)?;
        let body = self.block()?;
        Ok(Stmt::Foreach {
            key,
            value,
            over,
            body,
        })
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Spanned<Expr>> {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.assignment())
    }

    fn assignment(&mut self) -> Result<Spanned<Expr>> {
        let target = self.binary(0)?;
        let op = match self.peek() {
            Some(Token::Eq) => None,
            Some(Token::PlusEq) => Some(BinOp::Add),
            Some(Token::MinusEq) => Some(BinOp::Sub),
            Some(Token::StarEq) => Some(BinOp::Mul),
            Some(Token::SlashEq) => Some(BinOp::Div),
            Some(Token::PercentEq) => Some(BinOp::Mod),
            _ => return Ok(target),
        };
        let op_span = self.span();
        self.bump();
        let rhs = self.assignment()?;
        let span = target.span.merge(rhs.span);
        let value = match op {
            Some(op) => Spanned::new(
                Expr::Binary {
                    left: Box::new(target.clone()),
                    op,
                    right: Box::new(rhs),
                },
                span,
            ),
            None => rhs,
        };
        self.assign_to(target, value, span, op_span)
    }

    /// Build the assignment node for `target = value`
    fn assign_to(
        &self,
        target: Spanned<Expr>,
        value: Spanned<Expr>,
        span: Span,
        op_span: Span,
    ) -> Result<Spanned<Expr>> {
        let node = match target.node {
            Expr::Ident(name) => Expr::Assign {
                name,
                value: Box::new(value),
            },
            Expr::Index { object, index } => Expr::IndexAssign {
                object,
                index,
                value: Box::new(value),
            },
            _ => return Err(self.error("invalid assignment target", op_span)),
        };
        Ok(Spanned::new(node, span))
    }

    fn binary(&mut self, min_prec: u8) -> Result<Spanned<Expr>> {
        let mut left = self.unary()?;
        while let Some((op, prec)) = self.peek().and_then(binary_op) {
            if prec < min_prec {
                break;
            }
            self.bump();
            let right = self.binary(prec + 1)?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Spanned<Expr>> {
        let op = match self.peek() {
            Some(Token::Minus) => UnOp::Neg,
            Some(Token::Bang) => UnOp::Not,
            Some(Token::Tilde) => UnOp::BitNot,
            _ => return self.postfix(),
        };
        let start = self.span();
        self.bump();
        let expr = stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.unary())?;
        let span = start.merge(expr.span);
        Ok(Spanned::new(
            Expr::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        ))
    }

    fn postfix(&mut self) -> Result<Spanned<Expr>> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.bump();
                    let args = self.list(&Token::RParen)?;
                    let span = expr.span.merge(self.prev_span());
                    expr = Spanned::new(
                        Expr::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                Some(Token::LBracket) => {
                    self.bump();
                    let index = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    let span = expr.span.merge(self.prev_span());
                    expr = Spanned::new(
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                Some(Token::Dot) => {
                    self.bump();
                    let field = self.expect_ident()?;
                    let span = expr.span.merge(field.span);
                    expr = Spanned::new(
                        Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(field.map(Expr::StringLit)),
                        },
                        span,
                    );
                }
                Some(Token::PlusPlus | Token::MinusMinus) => {
                    let op = if self.check(&Token::PlusPlus) {
                        BinOp::Add
                    } else {
                        BinOp::Sub
                    };
                    let op_span = self.span();
                    self.bump();
                    let span = expr.span.merge(op_span);
                    let value = Spanned::new(
                        Expr::Binary {
                            left: Box::new(expr.clone()),
                            op,
                            right: Box::new(Spanned::new(Expr::IntLit(1), op_span)),
                        },
                        span,
                    );
                    expr = self.assign_to(expr, value, span, op_span)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma separated expressions up to `close` (consumed); trailing comma allowed
    fn list(&mut self, close: &Token) -> Result<Vec<Spanned<Expr>>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn primary(&mut self) -> Result<Spanned<Expr>> {
        let span = self.span();
        let node = match self.peek() {
            Some(Token::IntLit(n)) => int_literal(*n),
            Some(Token::LongLit(n)) => Expr::LongLit(*n),
            Some(Token::FloatLit(n)) => Expr::FloatLit(*n),
            Some(Token::DoubleLit(n)) => Expr::DoubleLit(*n),
            Some(Token::CharLit(c)) => Expr::CharLit(*c),
            Some(Token::StringLit(s)) => Expr::StringLit(s.clone()),
            Some(Token::True) => Expr::BoolLit(true),
            Some(Token::False) => Expr::BoolLit(false),
            Some(Token::Null) => Expr::Null,
            Some(Token::Ident(name)) => Expr::Ident(name.clone()),
            Some(Token::LParen) => {
                self.bump();
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                return Ok(Spanned::new(inner.node, span.merge(self.prev_span())));
            }
            Some(Token::LBracket) => {
                self.bump();
                let items = self.list(&Token::RBracket)?;
                return Ok(Spanned::new(Expr::Array(items), span.merge(self.prev_span())));
            }
            Some(Token::LBrace) => return self.table(),
            Some(Token::Func) => {
                self.bump();
                let def = self.function_rest(span, None)?;
                let span = def.span;
                return Ok(Spanned::new(Expr::Function(Rc::new(def)), span));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.bump();
        Ok(Spanned::new(node, span))
    }

    /// `{ name: v, "key": v, (expr): v, 1: v }`
    fn table(&mut self) -> Result<Spanned<Expr>> {
        let start = self.expect(&Token::LBrace)?;
        let mut entries = Vec::new();
        while !self.check(&Token::RBrace) {
            let key = match self.peek() {
                Some(Token::Ident(name)) => {
                    let key = Spanned::new(Expr::StringLit(name.clone()), self.span());
                    self.bump();
                    key
                }
                Some(Token::LParen) => self.primary()?,
                Some(
                    Token::StringLit(_)
                    | Token::IntLit(_)
                    | Token::LongLit(_)
                    | Token::CharLit(_)
                    | Token::FloatLit(_)
                    | Token::DoubleLit(_)
                    | Token::True
                    | Token::False,
                ) => self.primary()?,
                _ => return Err(self.unexpected("table key")),
            };
            self.expect(&Token::Colon)?;
            let value = self.expression()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Spanned::new(Expr::Table(entries), start.merge(self.prev_span())))
    }
}

/// Decimal and hex literals that do not fit in 32 bits become longs
fn int_literal(n: i64) -> Expr {
    match i32::try_from(n) {
        Ok(n) => Expr::IntLit(n),
        Err(_) => Expr::LongLit(n),
    }
}

/// Binary operator and precedence level (higher binds tighter)
fn binary_op(token: &Token) -> Option<(BinOp, u8)> {
    let entry = match token {
        Token::PipePipe => (BinOp::Or, 1),
        Token::AmpAmp => (BinOp::And, 2),
        Token::Pipe => (BinOp::BitOr, 3),
        Token::Caret => (BinOp::BitXor, 4),
        Token::Amp => (BinOp::BitAnd, 5),
        Token::EqEq => (BinOp::Eq, 6),
        Token::NotEq => (BinOp::Ne, 6),
        Token::Lt => (BinOp::Lt, 7),
        Token::LtEq => (BinOp::Le, 7),
        Token::Gt => (BinOp::Gt, 7),
        Token::GtEq => (BinOp::Ge, 7),
        Token::LtLt => (BinOp::Shl, 8),
        Token::GtGt => (BinOp::Shr, 8),
        Token::GtGtGt => (BinOp::UShr, 8),
        Token::Plus => (BinOp::Add, 9),
        Token::Minus => (BinOp::Sub, 9),
        Token::Star => (BinOp::Mul, 10),
        Token::Slash => (BinOp::Div, 10),
        Token::Percent => (BinOp::Mod, 10),
        _ => return None,
    };
    Some(entry)
}
