//! Tree-walking interpreter
//!
//! The evaluator walks the AST directly. Values that live on the heap
//! (strings, arrays, tables) are reclaimed by a mark-and-sweep collector
//! whose roots are the globals, the operand stack and every live scope.

mod env;
mod error;
mod eval;
mod exec;
pub mod hash;
pub mod heap;
pub mod loader;
mod ops;
pub mod table;
mod value;

pub use env::Environment;
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use eval::Interpreter;
pub use exec::Signal;
pub use heap::{GcPolicy, GcStats, ObjRef};
pub use loader::{FileLoader, MemoryLoader, ModuleLoader};
pub use ops::{binary, unary};
pub use table::{Key, Table};
pub use value::{Closure, Native, NativeFn, Object, Value, format_float, format_single};
