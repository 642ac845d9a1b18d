//! `math` library

use crate::interp::{Environment, InterpResult, Native, RuntimeError, Value};

const NATIVES: &[Native] = &[
    Native::new("math.sqrt", math_sqrt),
    Native::new("math.pow", math_pow),
    Native::new("math.abs", math_abs),
    Native::new("math.floor", math_floor),
    Native::new("math.ceil", math_ceil),
    Native::new("math.sin", math_sin),
    Native::new("math.cos", math_cos),
    Native::new("math.tan", math_tan),
    Native::new("math.log", math_log),
    Native::new("math.exp", math_exp),
    Native::new("math.min", math_min),
    Native::new("math.max", math_max),
];

pub fn register(env: &mut Environment) -> InterpResult<()> {
    env.register_library("math", NATIVES)?;
    env.set_library_value("math", "pi", Value::Double(std::f64::consts::PI))
}

/// One-argument function over doubles
fn unary(env: &mut Environment, argc: usize, name: &str, f: fn(f64) -> f64) -> InterpResult<()> {
    let x = env.arg_double(name, argc, 0)?;
    env.return_value(argc, Value::Double(f(x)))
}

fn math_sqrt(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.sqrt", f64::sqrt)
}

fn math_pow(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let base = env.arg_double("math.pow", argc, 0)?;
    let exponent = env.arg_double("math.pow", argc, 1)?;
    env.return_value(argc, Value::Double(base.powf(exponent)))
}

/// Keeps the argument's numeric kind
fn math_abs(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let result = match env.arg(argc, 0) {
        Value::Char(c) => Value::Char(c),
        Value::Int(n) => Value::Int(n.wrapping_abs()),
        Value::Long(n) => Value::Long(n.wrapping_abs()),
        Value::Float(x) => Value::Float(x.abs()),
        Value::Double(x) => Value::Double(x.abs()),
        other => return Err(RuntimeError::bad_argument("math.abs", 1, "a number", other.type_name())),
    };
    env.return_value(argc, result)
}

fn math_floor(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.floor", f64::floor)
}

fn math_ceil(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.ceil", f64::ceil)
}

fn math_sin(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.sin", f64::sin)
}

fn math_cos(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.cos", f64::cos)
}

fn math_tan(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.tan", f64::tan)
}

fn math_log(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.log", f64::ln)
}

fn math_exp(env: &mut Environment, argc: usize) -> InterpResult<()> {
    unary(env, argc, "math.exp", f64::exp)
}

/// Smallest (`want_less`) or largest argument, returned unconverted
fn extreme(env: &mut Environment, argc: usize, name: &str, want_less: bool) -> InterpResult<()> {
    if argc == 0 {
        return Err(RuntimeError::type_error(format!("{name}: expected at least one argument")));
    }
    let mut best = env.arg(argc, 0);
    let mut best_key = env.arg_double(name, argc, 0)?;
    for i in 1..argc {
        let key = env.arg_double(name, argc, i)?;
        if (want_less && key < best_key) || (!want_less && key > best_key) {
            best = env.arg(argc, i);
            best_key = key;
        }
    }
    env.return_value(argc, best)
}

fn math_min(env: &mut Environment, argc: usize) -> InterpResult<()> {
    extreme(env, argc, "math.min", true)
}

fn math_max(env: &mut Environment, argc: usize) -> InterpResult<()> {
    extreme(env, argc, "math.max", false)
}

#[cfg(test)]
mod tests {
    use crate::stdlib::testing::{failure, printed};

    #[test]
    fn test_sqrt_and_pow() {
        assert_eq!(printed("print(math.sqrt(16), math.pow(2, 10));"), "4.0 1024.0");
    }

    #[test]
    fn test_abs_keeps_kind() {
        assert_eq!(printed("print(math.abs(-3), math.abs(-3L), math.abs(-1.5));"), "3 3 1.5");
    }

    #[test]
    fn test_floor_ceil() {
        assert_eq!(printed("print(math.floor(2.7), math.ceil(2.1));"), "2.0 3.0");
    }

    #[test]
    fn test_min_max_return_original_value() {
        assert_eq!(printed("print(math.min(3, 1L, 2.5), math.max(3, 1L, 2.5));"), "1 3");
    }

    #[test]
    fn test_pi_constant() {
        assert_eq!(printed("print(math.pi > 3.14 && math.pi < 3.15);"), "true");
    }

    #[test]
    fn test_bad_argument() {
        let err = failure("math.sqrt(\"x\");");
        assert_eq!(err.message, "math.sqrt: argument 1 must be a number, got string");
    }
}
