//! `file` library

use crate::interp::{Environment, InterpResult, Native, RuntimeError, Value};
use std::fs;
use std::io::Write;
use std::path::Path;

const NATIVES: &[Native] = &[
    Native::new("file.read", file_read),
    Native::new("file.write", file_write),
    Native::new("file.append", file_append),
    Native::new("file.exists", file_exists),
    Native::new("file.remove", file_remove),
];

pub fn register(env: &mut Environment) -> InterpResult<()> {
    env.register_library("file", NATIVES)
}

fn io_error(action: &str, path: &str, err: std::io::Error) -> RuntimeError {
    RuntimeError::io_error(format!("cannot {action} '{path}': {err}"))
}

fn file_read(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let path = env.arg_str("file.read", argc, 0)?;
    let contents = fs::read(&path).map_err(|e| io_error("read", &path, e))?;
    env.return_bytes(argc, contents)
}

fn file_write(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let path = env.arg_str("file.write", argc, 0)?;
    let contents = env.arg_bytes("file.write", argc, 1)?;
    fs::write(&path, contents).map_err(|e| io_error("write", &path, e))?;
    env.return_value(argc, Value::Bool(true))
}

fn file_append(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let path = env.arg_str("file.append", argc, 0)?;
    let contents = env.arg_bytes("file.append", argc, 1)?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| file.write_all(&contents))
        .map_err(|e| io_error("append to", &path, e))?;
    env.return_value(argc, Value::Bool(true))
}

fn file_exists(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let path = env.arg_str("file.exists", argc, 0)?;
    env.return_value(argc, Value::Bool(Path::new(&path).exists()))
}

/// `remove(path)`: false when there was nothing to remove
fn file_remove(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let path = env.arg_str("file.remove", argc, 0)?;
    let removed = match fs::remove_file(&path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(io_error("remove", &path, e)),
    };
    env.return_value(argc, Value::Bool(removed))
}

#[cfg(test)]
mod tests {
    use crate::interp::ErrorKind;
    use crate::stdlib::testing::{failure, printed};

    fn scratch(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("kestrel-file-{}-{name}", std::process::id()))
            .display()
            .to_string()
            .replace('\\', "/")
    }

    #[test]
    fn test_write_append_read_remove() {
        let path = scratch("rw.txt");
        let source = format!(
            "p = \"{path}\";
             file.write(p, \"ab\");
             file.append(p, \"cd\");
             print(file.read(p), file.exists(p), file.remove(p), file.exists(p), file.remove(p));"
        );
        assert_eq!(printed(&source), "abcd true true false false");
    }

    #[test]
    fn test_contents_are_raw_bytes() {
        let path = scratch("bytes.bin");
        let source = format!(
            "p = \"{path}\";
             b = string.from('\\0' + 255);
             file.write(p, b);
             back = file.read(p);
             file.remove(p);
             print(len(back), back == b);"
        );
        assert_eq!(printed(&source), "1 true");
    }

    #[test]
    fn test_read_missing_file() {
        let path = scratch("missing.txt");
        let err = failure(&format!("file.read(\"{path}\");"));
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.message.starts_with("cannot read"));
    }
}
