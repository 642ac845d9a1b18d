//! `string` library
//!
//! Strings are byte strings: lengths, offsets and `char_at` count bytes.

use crate::interp::{Environment, InterpResult, Native, RuntimeError, Value};

const NATIVES: &[Native] = &[
    Native::new("string.len", string_len),
    Native::new("string.sub", string_sub),
    Native::new("string.upper", string_upper),
    Native::new("string.lower", string_lower),
    Native::new("string.find", string_find),
    Native::new("string.split", string_split),
    Native::new("string.char_at", string_char_at),
    Native::new("string.trim", string_trim),
    Native::new("string.repeat", string_repeat),
    Native::new("string.from", string_from),
    Native::new("string.parse_int", string_parse_int),
    Native::new("string.parse_double", string_parse_double),
];

pub fn register(env: &mut Environment) -> InterpResult<()> {
    env.register_library("string", NATIVES)
}

/// Longest string `repeat` will build
const MAX_REPEAT_BYTES: usize = 1 << 30;

fn string_len(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.len", argc, 0)?;
    env.return_value(argc, Value::count(s.len()))
}

/// `sub(s, start, count?)`: bytes from `start`, clamped to the string
fn string_sub(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.sub", argc, 0)?;
    let len = i64::try_from(s.len()).unwrap_or(i64::MAX);
    let start = env.arg_int("string.sub", argc, 1)?.clamp(0, len) as usize;
    let end = match env.arg(argc, 2) {
        Value::Nil | Value::Null => s.len(),
        _ => {
            let count = env.arg_int("string.sub", argc, 2)?.clamp(0, len) as usize;
            start.saturating_add(count).min(s.len())
        }
    };
    env.return_bytes(argc, s[start..end].to_vec())
}

fn string_upper(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.upper", argc, 0)?;
    env.return_bytes(argc, s.to_ascii_uppercase())
}

fn string_lower(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.lower", argc, 0)?;
    env.return_bytes(argc, s.to_ascii_lowercase())
}

/// Byte offset of the first occurrence of `needle`
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// `find(s, needle)`: byte offset of the first match, or -1
fn string_find(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.find", argc, 0)?;
    let needle = env.arg_bytes("string.find", argc, 1)?;
    let index = find_bytes(&s, &needle).map_or(Value::Int(-1), Value::count);
    env.return_value(argc, index)
}

/// `split(s, sep)`: array of the pieces between separators; an empty
/// separator splits into single bytes
fn string_split(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.split", argc, 0)?;
    let sep = env.arg_bytes("string.split", argc, 1)?;
    let mut pieces: Vec<&[u8]> = Vec::new();
    if sep.is_empty() {
        pieces.extend(s.chunks(1));
    } else {
        let mut rest = s.as_slice();
        while let Some(at) = find_bytes(rest, &sep) {
            pieces.push(&rest[..at]);
            rest = &rest[at + sep.len()..];
        }
        pieces.push(rest);
    }
    env.push_array();
    for piece in pieces {
        env.push_bytes(piece.to_vec());
        env.array_push_top()?;
    }
    env.return_below(argc)
}

fn string_char_at(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.char_at", argc, 0)?;
    let index = env.arg_int("string.char_at", argc, 1)?;
    match s.get(usize::try_from(index).unwrap_or(usize::MAX)) {
        Some(&byte) => env.return_value(argc, Value::Char(byte)),
        None => Err(RuntimeError::index_out_of_bounds(index, s.len())),
    }
}

fn string_trim(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.trim", argc, 0)?;
    env.return_bytes(argc, s.trim_ascii().to_vec())
}

fn string_repeat(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.repeat", argc, 0)?;
    let count = env.arg_int("string.repeat", argc, 1)?.max(0);
    let total = usize::try_from(count)
        .ok()
        .and_then(|count| s.len().checked_mul(count))
        .filter(|&total| total <= MAX_REPEAT_BYTES);
    if total.is_none() {
        return Err(RuntimeError::type_error(format!(
            "string.repeat: result longer than {MAX_REPEAT_BYTES} bytes"
        )));
    }
    // `total` fits, so `count` does too
    env.return_bytes(argc, s.repeat(count as usize))
}

/// `from(v)`: a char, an array of chars, or the printed form of anything else
fn string_from(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let bytes = match env.arg(argc, 0) {
        Value::Char(c) => vec![c],
        Value::Array(r) => {
            let chars: Option<Vec<u8>> = env
                .array(r)?
                .iter()
                .map(|item| match item {
                    Value::Char(c) => Some(*c),
                    _ => None,
                })
                .collect();
            match chars {
                Some(chars) => chars,
                None => env.display_bytes(&Value::Array(r)),
            }
        }
        other => env.display_bytes(&other),
    };
    env.return_bytes(argc, bytes)
}

/// `parse_int(s)`: an `int`, a `long` when it does not fit, or `null`
fn string_parse_int(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.parse_int", argc, 0)?;
    let value = std::str::from_utf8(&s)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map_or(Value::Null, Value::integer);
    env.return_value(argc, value)
}

fn string_parse_double(env: &mut Environment, argc: usize) -> InterpResult<()> {
    let s = env.arg_bytes("string.parse_double", argc, 0)?;
    let value = std::str::from_utf8(&s)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map_or(Value::Null, Value::Double);
    env.return_value(argc, value)
}

#[cfg(test)]
mod tests {
    use crate::interp::ErrorKind;
    use crate::stdlib::testing::{failure, printed};

    #[test]
    fn test_sub() {
        assert_eq!(
            printed("s = \"hello\"; print(string.sub(s, 1, 3), string.sub(s, 3), string.sub(s, 9));"),
            "ell lo "
        );
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(
            printed("print(string.upper(\"ab\"), string.lower(\"CD\"), string.trim(\"  x \"));"),
            "AB cd x"
        );
    }

    #[test]
    fn test_find() {
        assert_eq!(printed("print(string.find(\"banana\", \"na\"), string.find(\"a\", \"z\"));"), "2 -1");
    }

    #[test]
    fn test_split() {
        assert_eq!(printed("print(string.split(\"a,b,,c\", \",\"));"), "[\"a\", \"b\", \"\", \"c\"]");
        assert_eq!(printed("print(string.split(\"ab\", \"\"));"), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_char_at() {
        assert_eq!(printed("c = string.char_at(\"abc\", 1); print(c, c + 1);"), "b c");
        assert_eq!(failure("string.char_at(\"abc\", 3);").kind, ErrorKind::IndexOutOfBounds);
    }

    #[test]
    fn test_repeat_and_from() {
        assert_eq!(printed("print(string.repeat(\"ab\", 3));"), "ababab");
        assert_eq!(printed("print(string.from(['h', 'i']), string.from('x'), string.from(12));"), "hi x 12");
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(
            printed("print(string.parse_int(\" 42 \"), typeof(string.parse_int(\"9999999999\")), string.parse_int(\"x\"));"),
            "42 long null"
        );
        assert_eq!(printed("print(string.parse_double(\"2.5\") * 2);"), "5.0");
    }

    #[test]
    fn test_len_counts_bytes() {
        assert_eq!(printed("print(string.len(\"abc\"), string.len(\"\u{e9}\"));"), "3 2");
    }

    #[test]
    fn test_repeat_rejects_huge_results() {
        let err = failure("x = string.repeat(\"ab\", 4611686018427387904L);");
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert!(err.message.starts_with("string.repeat: result longer than"));
        assert_eq!(printed("print(len(string.repeat(\"ab\", -3)));"), "0");
    }

    #[test]
    fn test_high_byte_chars_round_trip() {
        let source = "
            c = '\\0' + 255;
            s = string.from(c);
            t = string.from([c, 'a']);
            print(len(s), s[0] == c, len(t), t[0] == c, string.char_at(t, 1));
        ";
        assert_eq!(printed(source), "1 true 2 true a");
    }

    #[test]
    fn test_sub_splits_multibyte_text_by_bytes() {
        let source = "
            s = \"\u{e9}x\";
            head = string.sub(s, 0, 1);
            tail = string.sub(s, 1);
            print(len(head), len(tail), head + tail == s, tail[0] == s[1]);
        ";
        assert_eq!(printed(source), "1 2 true true");
    }

    #[test]
    fn test_split_and_find_on_bytes() {
        assert_eq!(printed("print(len(string.split(\"\u{e9}\", \"\")), string.find(\"a\u{e9}b\", \"b\"));"), "2 3");
    }
}
