//! Runtime errors for the interpreter

use crate::ast::Span;
use crate::error::CompileError;
use std::fmt;
use std::rc::Rc;

/// Runtime error during interpretation
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// File of the innermost node that saw the error
    pub file: Option<Rc<str>>,
    pub span: Option<Span>,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Call of a name that is not bound to a function
    UndefinedReference,
    /// Wrong value type (conditions, foreach targets, native arguments)
    TypeError,
    /// Operator not defined for the operand types
    UnsupportedOperand,
    /// break/continue/return where no loop or function can take it
    ControlFlowMisuse,
    /// Integer division or modulo by zero
    DivideByZero,
    IndexOutOfBounds,
    /// Call depth limit reached
    StackOverflow,
    /// Handle to a heap object that no longer exists
    DanglingReference,
    /// Operand stack popped while empty
    StackUnderflow,
    /// `require` could not resolve a module
    ModuleNotFound,
    Io,
    AssertionFailed,
    /// Lexing or parsing failed in a required module
    Syntax,
    /// A function defined twice in one module
    Redefinition,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            file: None,
            span: None,
        }
    }

    pub fn undefined_reference(name: &str, suggestion: Option<&str>) -> Self {
        let message = match suggestion {
            Some(similar) => format!("undefined reference to '{name}' (did you mean '{similar}'?)"),
            None => format!("undefined reference to '{name}'"),
        };
        Self::new(ErrorKind::UndefinedReference, message)
    }

    pub fn not_callable(name: &str, type_name: &str) -> Self {
        Self::new(
            ErrorKind::UndefinedReference,
            format!("'{name}' is a {type_name}, not a function"),
        )
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn not_bool(type_name: &str) -> Self {
        Self::type_error(format!("{type_name} cannot be converted to bool"))
    }

    pub fn bad_argument(function: &str, position: usize, expected: &str, got: &str) -> Self {
        Self::type_error(format!(
            "{function}: argument {position} must be {expected}, got {got}"
        ))
    }

    pub fn unsupported_operand(op: &str, left: &str, right: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedOperand,
            format!("unsupported operand types for '{op}': '{left}' and '{right}'"),
        )
    }

    pub fn unsupported_unary(op: &str, operand: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedOperand,
            format!("unsupported operand type for '{op}': '{operand}'"),
        )
    }

    pub fn control_flow(message: &str) -> Self {
        Self::new(ErrorKind::ControlFlowMisuse, message)
    }

    pub fn divide_by_zero() -> Self {
        Self::new(ErrorKind::DivideByZero, "division by zero")
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfBounds,
            format!("index {index} out of bounds for length {len}"),
        )
    }

    pub fn stack_overflow(limit: usize) -> Self {
        Self::new(
            ErrorKind::StackOverflow,
            format!("stack overflow: call depth exceeded {limit}"),
        )
    }

    pub fn dangling_reference() -> Self {
        Self::new(ErrorKind::DanglingReference, "dangling reference to a collected object")
    }

    pub fn stack_underflow() -> Self {
        Self::new(ErrorKind::StackUnderflow, "operand stack underflow")
    }

    pub fn module_not_found(name: &str) -> Self {
        Self::new(ErrorKind::ModuleNotFound, format!("module '{name}' not found"))
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn assertion_failed(message: Option<&str>) -> Self {
        let message = match message {
            Some(m) => format!("assertion failed: {m}"),
            None => "assertion failed".to_string(),
        };
        Self::new(ErrorKind::AssertionFailed, message)
    }

    /// Attach a location unless one is already set
    pub fn locate(mut self, file: &Rc<str>, span: Span) -> Self {
        if self.file.is_none() {
            self.file = Some(file.clone());
        }
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    fn category(&self) -> &'static str {
        match self.kind {
            ErrorKind::Syntax | ErrorKind::Redefinition => "syntax error",
            _ => "runtime error",
        }
    }
}

impl From<CompileError> for RuntimeError {
    fn from(err: CompileError) -> Self {
        let kind = match err {
            CompileError::Redefinition { .. } => ErrorKind::Redefinition,
            CompileError::Lexer { .. } | CompileError::Parser { .. } => ErrorKind::Syntax,
        };
        RuntimeError {
            kind,
            message: err.message().to_string(),
            file: Some(Rc::from(err.file())),
            span: Some(err.span()),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, &self.span) {
            (Some(file), Some(span)) => {
                write!(f, "{file}:{span}: {}: {}", self.category(), self.message)
            }
            (Some(file), None) => write!(f, "{file}: {}: {}", self.category(), self.message),
            _ => write!(f, "{}: {}", self.category(), self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;
