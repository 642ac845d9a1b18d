//! Statement executor

use super::error::{InterpResult, RuntimeError};
use super::eval::{Interpreter, STACK_GROW_SIZE, STACK_RED_ZONE};
use super::heap::ObjRef;
use super::value::Value;
use crate::ast::{Block, BinOp, Expr, Spanned, Stmt};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// How a statement finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Normal,
    Break,
    Continue,
    /// The return value is on top of the operand stack
    Return,
}

impl Interpreter {
    /// Run statements in order until one signals something other than `Normal`
    pub(super) fn exec_block(&mut self, block: &Block) -> InterpResult<Signal> {
        for stmt in block {
            let signal = self.exec(stmt)?;
            if signal != Signal::Normal {
                return Ok(signal);
            }
        }
        Ok(Signal::Normal)
    }

    /// Run a block inside a fresh local context, popped on every exit path
    fn exec_scoped(&mut self, block: &Block) -> InterpResult<Signal> {
        let depth = self.env.local_depth();
        self.env.push_local_context();
        let result = self.exec_block(block);
        self.env.truncate_locals(depth);
        result
    }

    fn exec(&mut self, stmt: &Spanned<Stmt>) -> InterpResult<Signal> {
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.exec_inner(stmt));
        result.map_err(|e| self.locate(e, stmt.span))
    }

    fn exec_inner(&mut self, stmt: &Spanned<Stmt>) -> InterpResult<Signal> {
        match &stmt.node {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                self.env.pop_value()?;
                Ok(Signal::Normal)
            }
            Stmt::If { branches, else_block } => {
                for (cond, block) in branches {
                    if self.condition(cond)? {
                        return self.exec_scoped(block);
                    }
                }
                match else_block {
                    Some(block) => self.exec_scoped(block),
                    None => Ok(Signal::Normal),
                }
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
            } => self.exec_switch(scrutinee, cases, default.as_ref()),
            Stmt::While { cond, body } => {
                while self.condition(cond)? {
                    match self.exec_scoped(body)? {
                        Signal::Break => break,
                        Signal::Return => return Ok(Signal::Return),
                        Signal::Normal | Signal::Continue => {}
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                if let Some(init) = init {
                    self.eval(init)?;
                    self.env.pop_value()?;
                }
                loop {
                    let proceed = match cond {
                        Some(cond) => self.condition(cond)?,
                        None => true,
                    };
                    if !proceed {
                        break;
                    }
                    match self.exec_scoped(body)? {
                        Signal::Break => break,
                        Signal::Return => return Ok(Signal::Return),
                        Signal::Normal | Signal::Continue => {}
                    }
                    if let Some(post) = post {
                        self.eval(post)?;
                        self.env.pop_value()?;
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::Foreach {
                key,
                value,
                over,
                body,
            } => self.exec_foreach(key.as_deref(), value, over, body),
            Stmt::Break => Ok(Signal::Break),
            Stmt::Continue => Ok(Signal::Continue),
            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.eval(expr)?,
                    None => self.env.push_null(),
                }
                Ok(Signal::Return)
            }
            Stmt::Require(name) => {
                self.require(name)?;
                Ok(Signal::Normal)
            }
        }
    }

    /// Evaluate a condition that must produce a `Bool`
    fn condition(&mut self, cond: &Spanned<Expr>) -> InterpResult<bool> {
        self.eval(cond)?;
        let value = self.env.take_value()?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::not_bool(value.type_name()))
            .map_err(|e| self.locate(e, cond.span))
    }

    fn exec_switch(
        &mut self,
        scrutinee: &Spanned<Expr>,
        cases: &[(Spanned<Expr>, Block)],
        default: Option<&Block>,
    ) -> InterpResult<Signal> {
        self.eval(scrutinee)?;

        let mut chosen = default;
        for (label, block) in cases {
            self.eval(label)?;
            let subject = self.env.peek_value(1)?.clone();
            let candidate = self.env.peek_value(0)?.clone();
            let matched = super::ops::binary(&mut self.env, BinOp::Eq, &subject, &candidate)
                .map_err(|e| self.locate(e, label.span))?;
            self.env.pop_value()?;
            if matches!(matched, Value::Bool(true)) {
                chosen = Some(block);
                break;
            }
        }

        let signal = match chosen {
            Some(block) => self.exec_scoped(block)?,
            None => Signal::Normal,
        };
        match signal {
            Signal::Return => {
                self.env.return_below(1)?;
                Ok(Signal::Return)
            }
            Signal::Break => {
                self.env.pop_value()?;
                Ok(Signal::Normal)
            }
            other => {
                self.env.pop_value()?;
                Ok(other)
            }
        }
    }

    fn exec_foreach(
        &mut self,
        key: Option<&str>,
        value: &str,
        over: &Spanned<Expr>,
        body: &Block,
    ) -> InterpResult<Signal> {
        // `over` stays on the stack for the whole loop
        self.eval(over)?;
        let target = self.env.peek_value(0)?.clone();
        let signal = match target {
            Value::Array(r) => self.foreach_array(r, key, value, body)?,
            Value::Table(r) => self.foreach_table(r, key, value, body)?,
            other => {
                let err = RuntimeError::type_error(format!(
                    "'{}' is not array/table",
                    other.type_name()
                ));
                return Err(self.locate(err, over.span));
            }
        };
        if signal == Signal::Return {
            self.env.return_below(1)?;
        } else {
            self.env.pop_value()?;
        }
        Ok(signal)
    }

    fn foreach_array(&mut self, array: ObjRef, key: Option<&str>, value: &str, body: &Block) -> InterpResult<Signal> {
        let mut index = 0;
        while index < self.env.array(array)?.len() {
            let element = self.env.array(array)?[index].clone();
            let depth = self.env.local_depth();
            self.env.push_local_context();
            if let Some(key) = key {
                self.env.define_local(key, Value::Int(index as i32))?;
            }
            self.env.define_local(value, element)?;
            let result = self.exec_block(body);
            self.env.truncate_locals(depth);
            match result? {
                Signal::Break => break,
                Signal::Return => return Ok(Signal::Return),
                Signal::Normal | Signal::Continue => {}
            }
            index += 1;
        }
        Ok(Signal::Normal)
    }

    fn foreach_table(&mut self, table: ObjRef, key: Option<&str>, value: &str, body: &Block) -> InterpResult<Signal> {
        for k in self.env.table(table)?.keys() {
            // pairs removed by the body are skipped
            let Some(element) = self.env.table(table)?.peek(&k).cloned() else {
                continue;
            };
            let depth = self.env.local_depth();
            self.env.push_local_context();
            if let Some(key) = key {
                let key_value = self.env.key_value(&k);
                self.env.define_local(key, key_value)?;
            }
            self.env.define_local(value, element)?;
            let result = self.exec_block(body);
            self.env.truncate_locals(depth);
            match result? {
                Signal::Break => break,
                Signal::Return => return Ok(Signal::Return),
                Signal::Normal | Signal::Continue => {}
            }
        }
        Ok(Signal::Normal)
    }

    /// Load, install and run a package once
    fn require(&mut self, name: &str) -> InterpResult<()> {
        if self.env.has_package(name) {
            return Ok(());
        }
        let from = self.current_file();
        let module = self.loader.load(name, Some(Path::new(&*from)))?;
        let file = module.file.clone();
        self.env.add_module(Rc::new(module))?;
        // recorded before the body runs so cyclic requires terminate
        self.env.add_package(name);
        debug!(package = name, "package loaded");

        let Some(body) = self.env.take_pending() else {
            return Ok(());
        };
        self.env.push_frame(Vec::new());
        self.files.push(file);
        let result = self.exec_block(&body);
        self.files.pop();
        self.env.pop_frame()?;
        match result? {
            Signal::Normal => Ok(()),
            Signal::Break | Signal::Continue => Err(RuntimeError::control_flow(
                "break/continue outside loop",
            )),
            Signal::Return => {
                self.env.pop_value()?;
                Err(RuntimeError::control_flow("return outside function"))
            }
        }
    }
}
