//! Global functions: printing, conversion and container helpers

use crate::interp::{Environment, InterpResult, Native, RuntimeError, Value};

const NATIVES: &[Native] = &[
    Native::new("print", builtin_print),
    Native::new("println", builtin_println),
    Native::new("typeof", builtin_typeof),
    Native::new("tostring", builtin_tostring),
    Native::new("len", builtin_len),
    Native::new("push", builtin_push),
    Native::new("pop", builtin_pop),
    Native::new("keys", builtin_keys),
    Native::new("remove", builtin_remove),
    Native::new("assert", builtin_assert),
];

pub fn register(env: &mut Environment) -> InterpResult<()> {
    for native in NATIVES {
        env.register_global(*native)?;
    }
    Ok(())
}

/// Arguments rendered and joined by single spaces
fn joined_args(env: &Environment, argc: usize) -> Vec<u8> {
    (0..argc)
        .map(|i| env.display_bytes(&env.arg(argc, i)))
        .collect::<Vec<_>>()
        .join(&b' ')
}

fn builtin_print(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let text = joined_args(env, argc);
    env.write_output(&text)?;
    env.return_value(argc, Value::Null)
}

fn builtin_println(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let mut text = joined_args(env, argc);
    text.push(b'\n');
    env.write_output(&text)?;
    env.return_value(argc, Value::Null)
}

fn builtin_typeof(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let name = env.arg(argc, 0).type_name();
    env.return_string(argc, name.to_string())
}

fn builtin_tostring(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let text = env.display_bytes(&env.arg(argc, 0));
    env.return_bytes(argc, text)
}

fn builtin_len(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let len = match env.arg(argc, 0) {
        Value::String(r) => env.string(r)?.len(),
        Value::Array(r) => env.array(r)?.len(),
        Value::Table(r) => env.table(r)?.len(),
        other => {
            return Err(RuntimeError::bad_argument(
                "len",
                1,
                "a string, array or table",
                other.type_name(),
            ));
        }
    };
    env.return_value(argc, Value::count(len))
}

/// `push(array, value)`: append and return the new length
fn builtin_push(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let array = env.arg_array("push", argc, 0)?;
    let value = env.arg(argc, 1);
    let items = env.array_mut(array)?;
    items.push(value);
    let len = items.len();
    env.return_value(argc, Value::count(len))
}

/// `pop(array)`: remove and return the last element, `null` when empty
fn builtin_pop(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let array = env.arg_array("pop", argc, 0)?;
    let last = env.array_mut(array)?.pop().unwrap_or(Value::Null);
    env.return_value(argc, last)
}

/// `keys(table)`: array of the table's keys in iteration order
fn builtin_keys(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let table = env.arg_table("keys", argc, 0)?;
    let keys = env.table(table)?.keys();
    env.push_array();
    for key in &keys {
        let value = env.key_value(key);
        env.push_value(value);
        env.array_push_top()?;
    }
    env.return_below(argc)
}

/// `remove(table, key)` or `remove(array, index)`: the removed value, or `null`
fn builtin_remove(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let removed = match env.arg(argc, 0) {
        Value::Table(r) => {
            let key = env.key_of(&env.arg(argc, 1))?;
            env.table_mut(r)?.remove(&key)
        }
        Value::Array(r) => {
            let index = env.arg_int("remove", argc, 1)?;
            let items = env.array_mut(r)?;
            if index < 0 || index as usize >= items.len() {
                return Err(RuntimeError::index_out_of_bounds(index, items.len()));
            }
            Some(items.remove(index as usize))
        }
        other => {
            return Err(RuntimeError::bad_argument(
                "remove",
                1,
                "a table or array",
                other.type_name(),
            ));
        }
    };
    env.return_value(argc, removed.unwrap_or(Value::Null))
}

/// `assert(condition, message?)`
fn builtin_assert(env: &mut Environment, argc: usize) -> InterpResult<()> {
    if env.arg_bool("assert", argc, 0)? {
        return env.return_value(argc, Value::Null);
    }
    let message = match env.arg(argc, 1) {
        Value::Nil | Value::Null => None,
        other => Some(env.display(&other)),
    };
    Err(RuntimeError::assertion_failed(message.as_deref()))
}

#[cfg(test)]
mod tests {
    use crate::interp::ErrorKind;
    use crate::stdlib::testing::{failure, printed};

    #[test]
    fn test_print_joins_with_spaces() {
        assert_eq!(printed("print(1, \"a\", 2.5, true, null);"), "1 a 2.5 true null");
        assert_eq!(printed("println(\"x\"); println();"), "x\n\n");
    }

    #[test]
    fn test_print_nested_values() {
        assert_eq!(printed("print([1, \"two\", [3L]]);"), "[1, \"two\", [3]]");
        assert_eq!(printed("print({ k: 'c' });"), "{k: 'c'}");
    }

    #[test]
    fn test_typeof_and_tostring() {
        assert_eq!(
            printed("print(typeof(1), typeof(1L), typeof(1.0f), typeof(\"s\"), typeof(print));"),
            "int long float string native function"
        );
        assert_eq!(printed("s = tostring(12) + \"!\"; print(s);"), "12!");
    }

    #[test]
    fn test_len() {
        assert_eq!(printed("print(len(\"abc\"), len([1, 2]), len({ a: 1 }));"), "3 2 1");
        let err = failure("len(3);");
        assert_eq!(err.message, "len: argument 1 must be a string, array or table, got int");
    }

    #[test]
    fn test_push_pop() {
        assert_eq!(
            printed("a = []; push(a, 1); n = push(a, 2); print(n, pop(a), a, pop([]));"),
            "2 2 [1] null"
        );
    }

    #[test]
    fn test_keys_and_remove() {
        assert_eq!(printed("t = { x: 1 }; print(keys(t));"), "[\"x\"]");
        assert_eq!(
            printed("t = { x: 1, y: 2 }; v = remove(t, \"x\"); print(v, len(t), remove(t, \"x\"));"),
            "1 1 null"
        );
        assert_eq!(printed("a = [1, 2, 3]; remove(a, 0); print(a);"), "[2, 3]");
    }

    #[test]
    fn test_assert() {
        assert_eq!(printed("assert(1 < 2); print(\"ok\");"), "ok");
        let err = failure("assert(false, \"boom\");");
        assert_eq!(err.kind, ErrorKind::AssertionFailed);
        assert_eq!(err.message, "assertion failed: boom");
        assert_eq!(failure("assert(false);").message, "assertion failed");
    }
}
