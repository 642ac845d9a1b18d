//! `os` library: time and environment

use crate::interp::{Environment, InterpResult, Native, Value};
use chrono::{Local, Utc};

const NATIVES: &[Native] = &[
    Native::new("os.time", os_time),
    Native::new("os.clock", os_clock),
    Native::new("os.date", os_date),
    Native::new("os.getenv", os_getenv),
];

/// Format used by `os.date()` without arguments
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn register(env: &mut Environment) -> InterpResult<()> {
    env.register_library("os", NATIVES)
}

/// `time()`: seconds since the Unix epoch
fn os_time(env: &mut Environment, argc: usize) -> InterpResult<()> {
    env.return_value(argc, Value::Long(Utc::now().timestamp()))
}

/// `clock()`: seconds since the Unix epoch with microsecond resolution
fn os_clock(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let micros = Utc::now().timestamp_micros();
    env.return_value(argc, Value::Double(micros as f64 / 1e6))
}

/// `date(format?)`: local time rendered with a strftime format
fn os_date(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let format = match env.arg(argc, 0) {
        Value::Nil | Value::Null => DEFAULT_DATE_FORMAT.to_string(),
        _ => env.arg_str("os.date", argc, 0)?,
    };
    let mut text = String::new();
    // invalid format specifiers make chrono's Display fail
    if std::fmt::write(&mut text, format_args!("{}", Local::now().format(&format))).is_err() {
        text = Local::now().format(DEFAULT_DATE_FORMAT).to_string();
    }
    env.return_string(argc, text)
}

/// `getenv(name)`: the variable's value, or `null` when unset
fn os_getenv(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let name = env.arg_str("os.getenv", argc, 0)?;
    match std::env::var(&name) {
        Ok(value) => env.return_string(argc, value),
        Err(_) => env.return_value(argc, Value::Null),
    }
}
