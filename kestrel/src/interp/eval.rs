//! Expression evaluator
//!
//! Every expression evaluation pushes exactly one value onto the operand
//! stack. Intermediate values stay on the stack while later operands are
//! evaluated, which keeps them rooted across the collections an allocation
//! may trigger.

use super::env::Environment;
use super::error::{InterpResult, RuntimeError};
use super::exec::Signal;
use super::loader::{FileLoader, ModuleLoader};
use super::ops;
use super::value::{Closure, Value};
use crate::ast::{BinOp, Expr, Module, Span, Spanned};
use crate::config::RuntimeConfig;
use crate::parser::parse_source;
use crate::stdlib;
use crate::util::find_similar_name;
use std::rc::Rc;
use tracing::trace;

/// Stack growth parameters for deep recursion
pub(super) const STACK_RED_ZONE: usize = 128 * 1024;
pub(super) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// The interpreter
pub struct Interpreter {
    pub(super) env: Environment,
    pub(super) loader: Box<dyn ModuleLoader>,
    /// Nested user-function calls in progress
    pub(super) depth: usize,
    /// File of the code currently running, innermost last
    pub(super) files: Vec<Rc<str>>,
}

impl Interpreter {
    /// Interpreter with the standard libraries and a file loader
    pub fn new(config: RuntimeConfig) -> InterpResult<Self> {
        let loader = Box::new(FileLoader::new(&config));
        Self::with_parts(Environment::new(config), loader)
    }

    pub fn with_parts(mut env: Environment, loader: Box<dyn ModuleLoader>) -> InterpResult<Self> {
        stdlib::register_all(&mut env)?;
        Ok(Interpreter {
            env,
            loader,
            depth: 0,
            files: Vec::new(),
        })
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn loader(&self) -> &dyn ModuleLoader {
        self.loader.as_ref()
    }

    /// Parse and run a whole program
    pub fn run_source(&mut self, name: &str, file: &str, source: &str) -> InterpResult<()> {
        let module = parse_source(name, file, source)?;
        self.run_module(module)
    }

    /// Install a module and run its top-level statements in the base frame
    pub fn run_module(&mut self, module: Module) -> InterpResult<()> {
        let name = module.name.clone();
        let file = module.file.clone();
        self.env.add_module(Rc::new(module))?;
        self.env.add_package(&name);
        let Some(body) = self.env.take_pending() else {
            return Ok(());
        };

        self.files.push(file);
        let result = self.exec_block(&body);
        self.files.pop();
        match result? {
            Signal::Normal => Ok(()),
            Signal::Break => Err(RuntimeError::control_flow("break outside loop")),
            Signal::Continue => Err(RuntimeError::control_flow("continue outside loop")),
            Signal::Return => Err(RuntimeError::control_flow("return outside function")),
        }
    }

    /// Evaluate one expression parsed from `file` and return its value
    /// (REPL, embedding)
    pub fn eval_expr(&mut self, file: &str, expr: &Spanned<Expr>) -> InterpResult<Value> {
        self.files.push(Rc::from(file));
        let result = self.eval(expr);
        self.files.pop();
        result?;
        self.env.take_value()
    }

    /// Call a function value with the given arguments
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> InterpResult<Value> {
        if !callee.is_callable() {
            return Err(RuntimeError::not_callable("value", callee.type_name()));
        }
        let argc = args.len();
        self.env.push_value(callee);
        for arg in args {
            self.env.push_value(arg);
        }
        self.call(argc)?;
        self.env.take_value()
    }

    /// Drop back to the base state after a reported error
    pub fn reset(&mut self) {
        self.env.reset();
        self.depth = 0;
        self.files.clear();
    }

    pub(super) fn current_file(&self) -> Rc<str> {
        self.files.last().cloned().unwrap_or_else(|| Rc::from("<input>"))
    }

    pub(super) fn locate(&self, err: RuntimeError, span: Span) -> RuntimeError {
        if err.file.is_some() && err.span.is_some() {
            return err;
        }
        err.locate(&self.current_file(), span)
    }

    pub(super) fn eval(&mut self, expr: &Spanned<Expr>) -> InterpResult<()> {
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(expr));
        result.map_err(|e| self.locate(e, expr.span))
    }

    fn eval_inner(&mut self, expr: &Spanned<Expr>) -> InterpResult<()> {
        match &expr.node {
            Expr::CharLit(c) => self.env.push_char(*c),
            Expr::BoolLit(b) => self.env.push_bool(*b),
            Expr::IntLit(n) => self.env.push_int(*n),
            Expr::LongLit(n) => self.env.push_long(*n),
            Expr::FloatLit(x) => self.env.push_float(*x),
            Expr::DoubleLit(x) => self.env.push_double(*x),
            Expr::StringLit(s) => self.env.push_string(s),
            Expr::Null => self.env.push_null(),

            Expr::Ident(name) => {
                let value = self.env.lookup(name)?.unwrap_or(Value::Null);
                self.env.push_value(value);
            }

            Expr::Assign { name, value } => {
                self.eval(value)?;
                let value = self.env.peek_value(0)?.clone();
                self.env.assign(name, value)?;
            }

            Expr::IndexAssign { object, index, value } => {
                self.eval(object)?;
                self.eval(index)?;
                self.eval(value)?;
                let object = self.env.peek_value(2)?.clone();
                let index = self.env.peek_value(1)?.clone();
                let value = self.env.peek_value(0)?.clone();
                self.env.index_set(&object, &index, value)?;
                self.env.return_below(2)?;
            }

            Expr::Index { object, index } => {
                self.eval(object)?;
                self.eval(index)?;
                let object = self.env.peek_value(1)?.clone();
                let index = self.env.peek_value(0)?.clone();
                let value = self.env.index_get(&object, &index)?;
                self.env.push_value(value);
                self.env.return_below(2)?;
            }

            Expr::Call { callee, args } => {
                self.eval(callee)?;
                let value = self.env.peek_value(0)?;
                if !value.is_callable() {
                    return Err(self.undefined_callee(&callee.node));
                }
                for arg in args {
                    self.eval(arg)?;
                }
                self.call(args.len())?;
            }

            Expr::Unary { op, expr } => {
                self.eval(expr)?;
                let operand = self.env.take_value()?;
                let result = ops::unary(*op, &operand)?;
                self.env.push_value(result);
            }

            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right)?,

            Expr::Array(items) => {
                self.env.push_array();
                for item in items {
                    self.eval(item)?;
                    self.env.array_push_top()?;
                }
            }

            Expr::Table(pairs) => {
                self.env.push_table();
                for (key, value) in pairs {
                    self.eval(key)?;
                    self.eval(value)?;
                    self.env.table_set_top()?;
                }
            }

            Expr::Function(def) => {
                let closure = Closure::new(def.clone(), self.env.capture_scopes());
                self.env.push_function(Rc::new(closure));
            }
        }
        Ok(())
    }

    fn eval_binary(&mut self, left: &Spanned<Expr>, op: BinOp, right: &Spanned<Expr>) -> InterpResult<()> {
        self.eval(left)?;

        // `&&` and `||` skip the right side once the left decides the result
        let decided = match (op, self.env.peek_value(0)?) {
            (BinOp::And, Value::Bool(false)) => true,
            (BinOp::Or, Value::Bool(true)) => true,
            _ => false,
        };
        if decided {
            return Ok(());
        }

        self.eval(right)?;
        let lhs = self.env.peek_value(1)?.clone();
        let rhs = self.env.peek_value(0)?.clone();
        let result = ops::binary(&mut self.env, op, &lhs, &rhs)?;
        self.env.push_value(result);
        self.env.return_below(2)
    }

    fn undefined_callee(&self, callee: &Expr) -> RuntimeError {
        let name = callee.describe();
        let value = match self.env.peek_value(0) {
            Ok(value) => value,
            Err(err) => return err,
        };
        if !value.is_null_like() {
            return RuntimeError::not_callable(&name, value.type_name());
        }
        let suggestion = match callee {
            Expr::Ident(_) => {
                let names = self.env.visible_names();
                find_similar_name(&name, names.iter().map(String::as_str)).map(str::to_string)
            }
            _ => None,
        };
        RuntimeError::undefined_reference(&name, suggestion.as_deref())
    }

    /// Call the callee sitting below `argc` arguments; leaves one result in
    /// place of the callee and the arguments
    pub(super) fn call(&mut self, argc: usize) -> InterpResult<()> {
        let callee = self.env.peek_value(argc)?.clone();
        match callee {
            Value::NativeFunction(native) => {
                trace!(function = native.name, argc, "native call");
                (native.func)(&mut self.env, argc)?;
                self.env.return_below(1)
            }
            Value::Function(closure) => self.call_closure(&closure, argc),
            other => Err(RuntimeError::not_callable("value", other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: &Closure, argc: usize) -> InterpResult<()> {
        let limit = self.env.config().max_call_depth;
        if self.depth >= limit {
            return Err(RuntimeError::stack_overflow(limit));
        }
        let def = &closure.def;
        trace!(function = def.display_name(), argc, depth = self.depth, "call");

        let bindings: Vec<(String, Value)> = def
            .params
            .iter()
            .enumerate()
            .take(argc)
            .map(|(i, param)| (param.node.clone(), self.env.arg(argc, i)))
            .collect();
        let params = self.env.new_scope(bindings);
        let base = self.env.stack_len() - argc;
        self.env.truncate_stack(base);

        let mut scopes = closure.captured.to_vec();
        scopes.push(params);
        self.env.push_frame(scopes);
        self.files.push(def.file.clone());
        self.depth += 1;

        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.exec_block(&def.body));

        self.depth -= 1;
        self.files.pop();
        self.env.pop_frame()?;

        match result? {
            Signal::Return => self.env.return_below(1),
            Signal::Normal => {
                self.env.pop_value()?;
                self.env.push_null();
                Ok(())
            }
            Signal::Break | Signal::Continue => {
                Err(RuntimeError::control_flow("break/continue outside loop"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ErrorKind;
    use crate::interp::loader::MemoryLoader;
    use crate::parser::parse_source;

    fn interp() -> Interpreter {
        let env = Environment::with_output(RuntimeConfig::default(), Box::new(std::io::sink()));
        Interpreter::with_parts(env, Box::new(MemoryLoader::new())).unwrap()
    }

    /// Run `source`, then evaluate the expression statement `expr`
    fn eval_after(source: &str, expr: &str) -> InterpResult<Value> {
        let mut interp = interp();
        interp.run_source("main", "main.ks", source)?;
        let module = parse_source("expr", "expr.ks", &format!("{expr};")).unwrap();
        let crate::ast::Stmt::Expr(e) = &module.body[0].node else {
            panic!("not an expression statement");
        };
        let value = interp.eval_expr(&module.file, e)?;
        Ok(value)
    }

    fn eval_int(source: &str, expr: &str) -> i64 {
        eval_after(source, expr).unwrap().as_integer().unwrap()
    }

    #[test]
    fn test_literals_and_arithmetic() {
        assert_eq!(eval_int("", "1 + 2 * 3"), 7);
        assert_eq!(eval_int("", "(1 + 2) * 3"), 9);
        assert_eq!(eval_int("", "-5 % 3"), -2);
        assert!(matches!(eval_after("", "2L * 3").unwrap(), Value::Long(6)));
    }

    #[test]
    fn test_unbound_identifier_is_null() {
        assert!(matches!(eval_after("", "nothing").unwrap(), Value::Null));
    }

    #[test]
    fn test_assignment_is_an_expression() {
        assert_eq!(eval_int("a = b = 4;", "a + b"), 8);
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        let value = eval_after("hit = false; func f() { hit = true; return true; }", "false && f()").unwrap();
        assert!(matches!(value, Value::Bool(false)));
        assert!(matches!(eval_after("", "true || undefined_fn()").unwrap(), Value::Bool(true)));
    }

    #[test]
    fn test_function_call_and_recursion() {
        let source = "func fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }";
        assert_eq!(eval_int(source, "fib(15)"), 610);
    }

    #[test]
    fn test_missing_arguments_read_null() {
        let source = "func f(a, b) { return b == null; }";
        assert!(matches!(eval_after(source, "f(1)").unwrap(), Value::Bool(true)));
        assert!(matches!(eval_after(source, "f(1, 2, 3)").unwrap(), Value::Bool(false)));
    }

    #[test]
    fn test_function_without_return_yields_null() {
        assert!(matches!(eval_after("func f() { 1; }", "f()").unwrap(), Value::Null));
    }

    #[test]
    fn test_closure_sees_captured_scope() {
        let source = "
            func make() {
                foreach (n in [10]) {
                    return func (x) { return x + n; };
                }
            }
            add = make();
        ";
        assert_eq!(eval_int(source, "add(5)"), 15);
    }

    #[test]
    fn test_array_and_table_indexing() {
        let source = "a = [1, 2, 3]; t = { x: 1, \"y\": 2, (1 + 1): 3 }; a[3] = 4; t.z = a[1];";
        assert_eq!(eval_int(source, "a[3] + t.x + t[\"y\"] + t[2] + t.z"), 4 + 1 + 2 + 3 + 2);
        assert!(matches!(eval_after(source, "t.missing").unwrap(), Value::Null));
        assert!(matches!(eval_after("s = \"hi\";", "s[1]").unwrap(), Value::Char(b'i')));
    }

    #[test]
    fn test_index_out_of_bounds() {
        let err = eval_after("a = [1];", "a[5]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
    }

    #[test]
    fn test_postfix_increment_updates_binding() {
        assert_eq!(eval_int("i = 1; i++; i++;", "i"), 3);
        assert_eq!(eval_int("t = { n: 1 }; t.n += 4;", "t.n"), 5);
    }

    #[test]
    fn test_undefined_function_suggests_name() {
        let err = eval_after("func greet() {}", "gret()").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedReference);
        assert_eq!(err.message, "undefined reference to 'gret' (did you mean 'greet'?)");
    }

    #[test]
    fn test_calling_a_non_function() {
        let err = eval_after("x = 1;", "x()").unwrap_err();
        assert_eq!(err.message, "'x' is a int, not a function");
    }

    #[test]
    fn test_call_depth_limit() {
        let env = Environment::with_output(
            RuntimeConfig::default().with_max_call_depth(50),
            Box::new(std::io::sink()),
        );
        let mut interp = Interpreter::with_parts(env, Box::new(MemoryLoader::new())).unwrap();
        let err = interp
            .run_source("main", "main.ks", "func f(n) { return f(n + 1); } f(0);")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::StackOverflow);
        assert_eq!(err.message, "stack overflow: call depth exceeded 50");
    }

    #[test]
    fn test_error_location() {
        let mut interp = interp();
        let err = interp.run_source("main", "main.ks", "x = 1;\ny = x / 0;").unwrap_err();
        assert_eq!(err.to_string(), "main.ks:2:5: runtime error: division by zero");
    }

    #[test]
    fn test_call_value_from_host() {
        let mut interp = interp();
        interp.run_source("main", "main.ks", "func twice(x) { return x * 2; }").unwrap();
        let f = interp.env().get_global("twice").unwrap();
        let result = interp.call_value(f, vec![Value::Int(21)]).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }

    #[test]
    fn test_stack_is_balanced_after_statements() {
        let mut interp = interp();
        interp
            .run_source("main", "main.ks", "func f(a) { return [a, { k: a }]; } x = f(1); x[1].k = 2;")
            .unwrap();
        assert_eq!(interp.env().stack_len(), 0);
    }
}
