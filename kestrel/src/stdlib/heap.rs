//! `heap` library: collector control and untyped references

use crate::interp::{Environment, InterpResult, Native, RuntimeError, Value};

const NATIVES: &[Native] = &[
    Native::new("heap.collect", heap_collect),
    Native::new("heap.count", heap_count),
    Native::new("heap.ref", heap_ref),
    Native::new("heap.deref", heap_deref),
    Native::new("heap.address", heap_address),
];

pub fn register(env: &mut Environment) -> InterpResult<()> {
    env.register_library("heap", NATIVES)
}

/// `collect()`: run a cycle now, returns the number of freed objects
fn heap_collect(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let freed = env.collect_garbage();
    env.return_value(argc, Value::count(freed))
}

/// `count()`: live heap objects
fn heap_count(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let live = env.heap().live_objects();
    env.return_value(argc, Value::count(live))
}

/// `ref(v)`: untyped handle to the object behind a string, array or table
fn heap_ref(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let value = env.arg(argc, 0);
    match value.object() {
        Some(r) => env.return_value(argc, Value::Reference(r)),
        None => Err(RuntimeError::bad_argument(
            "heap.ref",
            1,
            "a heap object",
            value.type_name(),
        )),
    }
}

/// `deref(r)`: typed handle for a reference
fn heap_deref(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let r = match env.arg(argc, 0) {
        Value::Reference(r) => r,
        other => {
            return Err(RuntimeError::bad_argument(
                "heap.deref",
                1,
                "a reference",
                other.type_name(),
            ));
        }
    };
    let handle = env
        .heap()
        .get(r)
        .map(|object| object.handle(r))
        .ok_or_else(RuntimeError::dangling_reference)?;
    env.return_value(argc, handle)
}

/// `address(v)`: opaque pointer identifying a heap object
fn heap_address(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let value = env.arg(argc, 0);
    match value.object() {
        Some(r) => env.return_value(argc, Value::Pointer(r.address())),
        None => Err(RuntimeError::bad_argument(
            "heap.address",
            1,
            "a heap object",
            value.type_name(),
        )),
    }
}
