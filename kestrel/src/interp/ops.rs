//! Operators and numeric promotion
//!
//! Mixed numeric operands are promoted before the operation: `Char` wins
//! over every integer kind, then `Double > Float > Long > Int`. `Char` never
//! mixes with floating point. Integer arithmetic wraps and shift amounts are
//! masked to the operand width.

use super::env::Environment;
use super::error::{InterpResult, RuntimeError};
use super::value::{Object, Value};
use crate::ast::{BinOp, UnOp};
use std::cmp::Ordering;

/// Numeric operand after promotion
#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Char(u8),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Int,
    Long,
    Float,
    Double,
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Char(c) => Some(Num::Char(*c)),
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Long(n) => Some(Num::Long(*n)),
            Value::Float(x) => Some(Num::Float(*x)),
            Value::Double(x) => Some(Num::Double(*x)),
            _ => None,
        }
    }

    fn is_floating(self) -> bool {
        matches!(self, Num::Float(_) | Num::Double(_))
    }

    fn rank(self) -> Rank {
        match self {
            Num::Char(_) | Num::Int(_) => Rank::Int,
            Num::Long(_) => Rank::Long,
            Num::Float(_) => Rank::Float,
            Num::Double(_) => Rank::Double,
        }
    }

    fn integer(self) -> i64 {
        match self {
            Num::Char(c) => i64::from(c),
            Num::Int(n) => i64::from(n),
            Num::Long(n) => n,
            Num::Float(x) => x as i64,
            Num::Double(x) => x as i64,
        }
    }

    fn double(self) -> f64 {
        match self {
            Num::Float(x) => f64::from(x),
            Num::Double(x) => x,
            other => other.integer() as f64,
        }
    }

    fn single(self) -> f32 {
        match self {
            Num::Float(x) => x,
            Num::Double(x) => x as f32,
            other => other.integer() as f32,
        }
    }
}

/// Integer width an operation runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Char,
    Int,
    Long,
}

impl Width {
    fn wrap(self, n: i64) -> Value {
        match self {
            Width::Char => Value::Char(n as u8),
            Width::Int => Value::Int(n as i32),
            Width::Long => Value::Long(n),
        }
    }
}

/// Apply a binary operator. `&&`/`||` reaching here have both sides evaluated.
pub fn binary(env: &mut Environment, op: BinOp, left: &Value, right: &Value) -> InterpResult<Value> {
    let unsupported = || RuntimeError::unsupported_operand(op.symbol(), left.type_name(), right.type_name());

    if left.is_null_like() || right.is_null_like() {
        let both = left.is_null_like() && right.is_null_like();
        return match op {
            BinOp::Eq => Ok(Value::Bool(both)),
            BinOp::Ne => Ok(Value::Bool(!both)),
            _ => Err(unsupported()),
        };
    }

    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return numeric(op, a, b).ok_or_else(unsupported)?;
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => {
            let result = match op {
                BinOp::Eq => a == b,
                BinOp::Ne => a != b,
                BinOp::BitAnd | BinOp::And => *a && *b,
                BinOp::BitOr | BinOp::Or => *a || *b,
                BinOp::BitXor => a != b,
                _ => return Err(unsupported()),
            };
            Ok(Value::Bool(result))
        }
        (Value::String(a), Value::String(b)) => {
            let (a, b) = (*a, *b);
            if op == BinOp::Add {
                let joined = [env.string(a)?, env.string(b)?].concat();
                return Ok(Value::String(env.takeover(Object::String(joined))));
            }
            let ordering = env.string(a)?.cmp(env.string(b)?);
            compare(op, ordering).map(Value::Bool).ok_or_else(unsupported)
        }
        _ => match (op, left.same_handle(right)) {
            (BinOp::Eq, Some(same)) => Ok(Value::Bool(same)),
            (BinOp::Ne, Some(same)) => Ok(Value::Bool(!same)),
            _ => Err(unsupported()),
        },
    }
}

fn compare(op: BinOp, ordering: Ordering) -> Option<bool> {
    let result = match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => return None,
    };
    Some(result)
}

/// `None` when the pairing or the operator is not defined; `Some(Err)` for
/// division by zero
fn numeric(op: BinOp, a: Num, b: Num) -> Option<InterpResult<Value>> {
    let has_char = matches!(a, Num::Char(_)) || matches!(b, Num::Char(_));
    if has_char {
        if a.is_floating() || b.is_floating() {
            return None;
        }
        return integer(op, a.integer(), b.integer(), Width::Char);
    }
    match a.rank().max(b.rank()) {
        Rank::Int => integer(op, a.integer(), b.integer(), Width::Int),
        Rank::Long => integer(op, a.integer(), b.integer(), Width::Long),
        Rank::Float => floating(op, f64::from(a.single()), f64::from(b.single()), false),
        Rank::Double => floating(op, a.double(), b.double(), true),
    }
}

fn integer(op: BinOp, a: i64, b: i64, width: Width) -> Option<InterpResult<Value>> {
    if let Some(result) = compare(op, a.cmp(&b)) {
        return Some(Ok(Value::Bool(result)));
    }
    let n = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Mod if b == 0 => return Some(Err(RuntimeError::divide_by_zero())),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod => a.wrapping_rem(b),
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl | BinOp::Shr | BinOp::UShr => return Some(Ok(shift(op, a, b, width))),
        _ => return None,
    };
    Some(Ok(width.wrap(n)))
}

fn shift(op: BinOp, a: i64, b: i64, width: Width) -> Value {
    match width {
        Width::Char => {
            let (a, s) = (a as u8, (b & 7) as u32);
            Value::Char(if op == BinOp::Shl { a << s } else { a >> s })
        }
        Width::Int => {
            let (a, s) = (a as i32, (b & 31) as u32);
            Value::Int(match op {
                BinOp::Shl => a.wrapping_shl(s),
                BinOp::Shr => a >> s,
                _ => ((a as u32) >> s) as i32,
            })
        }
        Width::Long => {
            let s = (b & 63) as u32;
            Value::Long(match op {
                BinOp::Shl => a.wrapping_shl(s),
                BinOp::Shr => a >> s,
                _ => ((a as u64) >> s) as i64,
            })
        }
    }
}

fn floating(op: BinOp, a: f64, b: f64, double: bool) -> Option<InterpResult<Value>> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        BinOp::Eq => return Some(Ok(Value::Bool(a == b))),
        BinOp::Ne => return Some(Ok(Value::Bool(a != b))),
        BinOp::Lt => return Some(Ok(Value::Bool(a < b))),
        BinOp::Le => return Some(Ok(Value::Bool(a <= b))),
        BinOp::Gt => return Some(Ok(Value::Bool(a > b))),
        BinOp::Ge => return Some(Ok(Value::Bool(a >= b))),
        _ => return None,
    };
    let value = if double {
        Value::Double(result)
    } else {
        Value::Float(result as f32)
    };
    Some(Ok(value))
}

/// Apply a unary operator
pub fn unary(op: UnOp, value: &Value) -> InterpResult<Value> {
    let result = match (op, value) {
        (UnOp::Neg, Value::Char(c)) => Value::Char(c.wrapping_neg()),
        (UnOp::Neg, Value::Int(n)) => Value::Int(n.wrapping_neg()),
        (UnOp::Neg, Value::Long(n)) => Value::Long(n.wrapping_neg()),
        (UnOp::Neg, Value::Float(x)) => Value::Float(-x),
        (UnOp::Neg, Value::Double(x)) => Value::Double(-x),
        (UnOp::Not, Value::Bool(b)) => Value::Bool(!b),
        (UnOp::BitNot, Value::Char(c)) => Value::Char(!c),
        (UnOp::BitNot, Value::Int(n)) => Value::Int(!n),
        (UnOp::BitNot, Value::Long(n)) => Value::Long(!n),
        _ => return Err(RuntimeError::unsupported_unary(op.symbol(), value.type_name())),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::interp::ErrorKind;

    fn env() -> Environment {
        Environment::with_output(RuntimeConfig::default(), Box::new(std::io::sink()))
    }

    fn eval(op: BinOp, left: Value, right: Value) -> InterpResult<Value> {
        binary(&mut env(), op, &left, &right)
    }

    fn kind(result: InterpResult<Value>) -> &'static str {
        result.map(|v| v.type_name()).unwrap_or("error")
    }

    #[test]
    fn test_int_plus_double_is_double() {
        assert!(matches!(
            eval(BinOp::Add, Value::Int(2), Value::Double(1.5)),
            Ok(Value::Double(x)) if x == 3.5
        ));
    }

    #[test]
    fn test_char_plus_int_is_char() {
        assert!(matches!(
            eval(BinOp::Add, Value::Char(b'a'), Value::Int(1)),
            Ok(Value::Char(b'b'))
        ));
    }

    #[test]
    fn test_promotion_table() {
        let samples = [
            Value::Char(3),
            Value::Int(3),
            Value::Long(3),
            Value::Float(3.0),
            Value::Double(3.0),
        ];
        let expected = [
            ["char", "char", "char", "error", "error"],
            ["char", "int", "long", "float", "double"],
            ["char", "long", "long", "float", "double"],
            ["error", "float", "float", "float", "double"],
            ["error", "double", "double", "double", "double"],
        ];
        for (i, left) in samples.iter().enumerate() {
            for (j, right) in samples.iter().enumerate() {
                let got = kind(eval(BinOp::Add, left.clone(), right.clone()));
                assert_eq!(got, expected[i][j], "{} + {}", left.type_name(), right.type_name());
            }
        }
    }

    #[test]
    fn test_int_arithmetic_wraps() {
        assert!(matches!(
            eval(BinOp::Add, Value::Int(i32::MAX), Value::Int(1)),
            Ok(Value::Int(i32::MIN))
        ));
        assert!(matches!(
            eval(BinOp::Div, Value::Int(i32::MIN), Value::Int(-1)),
            Ok(Value::Int(i32::MIN))
        ));
    }

    #[test]
    fn test_integer_division_by_zero() {
        let err = eval(BinOp::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivideByZero);
        let err = eval(BinOp::Mod, Value::Long(1), Value::Char(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivideByZero);
    }

    #[test]
    fn test_float_division_by_zero_is_ieee() {
        assert!(matches!(
            eval(BinOp::Div, Value::Double(1.0), Value::Int(0)),
            Ok(Value::Double(x)) if x.is_infinite()
        ));
    }

    #[test]
    fn test_shifts() {
        assert!(matches!(eval(BinOp::Shl, Value::Int(1), Value::Int(33)), Ok(Value::Int(2))));
        assert!(matches!(eval(BinOp::Shr, Value::Int(-8), Value::Int(1)), Ok(Value::Int(-4))));
        assert!(matches!(
            eval(BinOp::UShr, Value::Int(-1), Value::Int(28)),
            Ok(Value::Int(15))
        ));
        assert!(matches!(
            eval(BinOp::UShr, Value::Long(-1), Value::Int(60)),
            Ok(Value::Long(15))
        ));
    }

    #[test]
    fn test_comparisons() {
        assert!(matches!(eval(BinOp::Lt, Value::Int(1), Value::Long(2)), Ok(Value::Bool(true))));
        assert!(matches!(eval(BinOp::Ge, Value::Double(1.0), Value::Int(1)), Ok(Value::Bool(true))));
        assert!(matches!(eval(BinOp::Eq, Value::Int(1), Value::Int(2)), Ok(Value::Bool(false))));
    }

    #[test]
    fn test_bool_operators() {
        assert!(matches!(eval(BinOp::And, Value::Bool(true), Value::Bool(false)), Ok(Value::Bool(false))));
        assert!(matches!(eval(BinOp::BitXor, Value::Bool(true), Value::Bool(false)), Ok(Value::Bool(true))));
        let err = eval(BinOp::Add, Value::Bool(true), Value::Bool(true)).unwrap_err();
        assert_eq!(err.message, "unsupported operand types for '+': 'bool' and 'bool'");
        assert!(eval(BinOp::Eq, Value::Bool(true), Value::Int(1)).is_err());
    }

    #[test]
    fn test_null_like_only_equality() {
        assert!(matches!(eval(BinOp::Eq, Value::Null, Value::Nil), Ok(Value::Bool(true))));
        assert!(matches!(eval(BinOp::Ne, Value::Null, Value::Int(0)), Ok(Value::Bool(true))));
        assert!(eval(BinOp::Lt, Value::Null, Value::Int(0)).is_err());
    }

    #[test]
    fn test_string_operators() {
        let mut env = env();
        env.push_string("ab");
        env.push_string("c");
        let a = env.peek_value(1).unwrap().clone();
        let b = env.peek_value(0).unwrap().clone();

        let joined = binary(&mut env, BinOp::Add, &a, &b).unwrap();
        assert_eq!(env.display(&joined), "abc");
        assert!(matches!(binary(&mut env, BinOp::Lt, &a, &b), Ok(Value::Bool(true))));
        assert!(binary(&mut env, BinOp::Sub, &a, &b).is_err());
        assert!(binary(&mut env, BinOp::Add, &a, &Value::Int(1)).is_err());
    }

    #[test]
    fn test_handle_identity() {
        let mut env = env();
        env.push_array();
        env.push_array();
        let a = env.peek_value(1).unwrap().clone();
        let b = env.peek_value(0).unwrap().clone();
        assert!(matches!(binary(&mut env, BinOp::Eq, &a, &a.clone()), Ok(Value::Bool(true))));
        assert!(matches!(binary(&mut env, BinOp::Ne, &a, &b), Ok(Value::Bool(true))));
        assert!(binary(&mut env, BinOp::Lt, &a, &b).is_err());
    }

    #[test]
    fn test_unary() {
        assert!(matches!(unary(UnOp::Neg, &Value::Int(3)), Ok(Value::Int(-3))));
        assert!(matches!(unary(UnOp::Not, &Value::Bool(false)), Ok(Value::Bool(true))));
        assert!(matches!(unary(UnOp::BitNot, &Value::Long(0)), Ok(Value::Long(-1))));
        let err = unary(UnOp::Not, &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedOperand);
        assert!(unary(UnOp::BitNot, &Value::Double(1.0)).is_err());
    }
}
