//! Native libraries
//!
//! Core functions are installed as globals; the others live in named
//! tables (`math.sqrt`, `string.upper`, ...).

mod builtins;
mod file;
mod heap;
mod math;
mod os;
mod string;

use crate::interp::{Environment, InterpResult};

/// Install every library into the global table
pub fn register_all(env: &mut Environment) -> InterpResult<()> {
    builtins::register(env)?;
    math::register(env)?;
    string::register(env)?;
    file::register(env)?;
    heap::register(env)?;
    os::register(env)?;
    Ok(())
}
