//! Runtime values for the interpreter

use super::env::Environment;
use super::error::InterpResult;
use super::heap::ObjRef;
use super::table::Table;
use crate::ast::FnDef;
use std::fmt;
use std::rc::Rc;

/// Host function: receives the environment and its argument count, pops the
/// arguments and pushes exactly one result
pub type NativeFn = fn(&mut Environment, usize) -> InterpResult<()>;

/// Host function value with its qualified name
#[derive(Clone, Copy)]
pub struct Native {
    pub name: &'static str,
    pub func: NativeFn,
}

impl Native {
    pub const fn new(name: &'static str, func: NativeFn) -> Self {
        Native { name, func }
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.name)
    }
}

impl PartialEq for Native {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// User function plus the local contexts visible where it was created
#[derive(Debug)]
pub struct Closure {
    pub def: Rc<FnDef>,
    pub captured: Rc<[ObjRef]>,
}

impl Closure {
    pub fn new(def: Rc<FnDef>, captured: Rc<[ObjRef]>) -> Self {
        Closure { def, captured }
    }
}

/// Runtime value
///
/// Handles (`String`, `Array`, `Table`, `Reference`) alias the heap object
/// they point at; copying a value copies the handle.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Unset
    #[default]
    Nil,
    Char(u8),
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(ObjRef),
    Array(ObjRef),
    Table(ObjRef),
    Function(Rc<Closure>),
    NativeFunction(Native),
    /// Opaque host integer
    Pointer(usize),
    /// Untyped handle to any heap object
    Reference(ObjRef),
    /// The `null` literal
    Null,
}

impl Value {
    /// Get type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Char(_) => "char",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::NativeFunction(_) => "native function",
            Value::Pointer(_) => "pointer",
            Value::Reference(_) => "reference",
            Value::Null => "null",
        }
    }

    pub fn is_null_like(&self) -> bool {
        matches!(self, Value::Nil | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::NativeFunction(_))
    }

    /// Heap object this value points at, if any
    pub fn object(&self) -> Option<ObjRef> {
        match self {
            Value::String(r) | Value::Array(r) | Value::Table(r) | Value::Reference(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `Int` when `n` fits in 32 bits, `Long` otherwise
    pub fn integer(n: i64) -> Value {
        i32::try_from(n).map_or(Value::Long(n), Value::Int)
    }

    /// A length or count as an integer value
    pub fn count(n: usize) -> Value {
        i64::try_from(n).map_or(Value::Long(i64::MAX), Value::integer)
    }

    /// Integer view of `Char`, `Int` and `Long`
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Char(c) => Some(i64::from(*c)),
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of every number kind
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(f64::from(*x)),
            Value::Double(x) => Some(*x),
            other => other.as_integer().map(|n| n as f64),
        }
    }

    /// Identity comparison for handle kinds
    pub fn same_handle(&self, other: &Value) -> Option<bool> {
        let same = match (self, other) {
            (Value::Array(a), Value::Array(b))
            | (Value::Table(a), Value::Table(b))
            | (Value::Reference(a), Value::Reference(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => a == b,
            (Value::Pointer(a), Value::Pointer(b)) => a == b,
            _ => return None,
        };
        Some(same)
    }
}

/// Heap payload
#[derive(Debug)]
pub enum Object {
    /// Byte string; not required to be valid UTF-8
    String(Vec<u8>),
    Array(Vec<Value>),
    Table(Table),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::String(_) => "string",
            Object::Array(_) => "array",
            Object::Table(_) => "table",
        }
    }

    /// Value of the matching handle kind
    pub fn handle(&self, r: ObjRef) -> Value {
        match self {
            Object::String(_) => Value::String(r),
            Object::Array(_) => Value::Array(r),
            Object::Table(_) => Value::Table(r),
        }
    }
}

/// Format a floating point number so whole values keep a decimal point
pub fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Single precision counterpart of [`format_float`]
pub fn format_single(x: f32) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e7 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_noop(_env: &mut Environment, _argc: usize) -> InterpResult<()> {
        Ok(())
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Long(1).type_name(), "long");
        assert_eq!(Value::Double(1.0).type_name(), "double");
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::default().type_name(), "nil");
        assert_eq!(
            Value::NativeFunction(Native::new("print", native_noop)).type_name(),
            "native function"
        );
    }

    #[test]
    fn test_scalar_copy_is_independent() {
        let a = Value::Int(1);
        let mut b = a.clone();
        if let Value::Int(n) = &mut b {
            *n += 1;
        }
        assert!(matches!(a, Value::Int(1)));
        assert!(matches!(b, Value::Int(2)));
    }

    #[test]
    fn test_null_like() {
        assert!(Value::Null.is_null_like());
        assert!(Value::Nil.is_null_like());
        assert!(!Value::Int(0).is_null_like());
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Char(b'a').as_integer(), Some(97));
        assert_eq!(Value::Long(-5).as_integer(), Some(-5));
        assert_eq!(Value::Double(1.5).as_integer(), None);
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_counts_widen_to_long() {
        assert!(matches!(Value::count(3), Value::Int(3)));
        assert!(matches!(Value::count(i32::MAX as usize + 1), Value::Long(2147483648)));
        assert!(matches!(Value::integer(-1), Value::Int(-1)));
        assert!(matches!(Value::integer(i64::MIN), Value::Long(i64::MIN)));
    }

    #[test]
    fn test_native_equality_by_name() {
        let a = Value::NativeFunction(Native::new("math.sqrt", native_noop));
        let b = Value::NativeFunction(Native::new("math.sqrt", native_noop));
        let c = Value::NativeFunction(Native::new("math.abs", native_noop));
        assert_eq!(a.same_handle(&b), Some(true));
        assert_eq!(a.same_handle(&c), Some(false));
        assert_eq!(a.same_handle(&Value::Int(1)), None);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(3.5), "3.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_single(1.1), "1.1");
        assert_eq!(format_single(2.0), "2.0");
    }
}
