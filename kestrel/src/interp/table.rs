//! Table values: Value-keyed maps on the generic hash table

use super::error::{InterpResult, RuntimeError};
use super::hash::{HashTable, NodeOps};
use super::heap::{Heap, ObjRef, trace_value};
use super::value::{Closure, Native, Object, Value};
use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::rc::Rc;

/// Hashable form of a value used as a table key.
///
/// Distinct scalar types never compare equal, strings compare by content,
/// arrays/tables/references/functions by identity and natives by name.
/// Floating point keys compare by bit pattern.
#[derive(Debug, Clone)]
pub enum Key {
    Nil,
    Null,
    Char(u8),
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Rc<[u8]>),
    Array(ObjRef),
    Table(ObjRef),
    Reference(ObjRef),
    Function(Rc<Closure>),
    Native(Native),
    Pointer(usize),
}

impl Key {
    pub fn string(s: &str) -> Key {
        Key::bytes(s.as_bytes())
    }

    pub fn bytes(s: &[u8]) -> Key {
        Key::Str(Rc::from(s))
    }

    /// Convert a value; string keys copy the string content
    pub fn from_value(value: &Value, heap: &Heap) -> InterpResult<Key> {
        let key = match value {
            Value::Nil => Key::Nil,
            Value::Null => Key::Null,
            Value::Char(c) => Key::Char(*c),
            Value::Bool(b) => Key::Bool(*b),
            Value::Int(n) => Key::Int(*n),
            Value::Long(n) => Key::Long(*n),
            Value::Float(x) => Key::Float(*x),
            Value::Double(x) => Key::Double(*x),
            Value::String(r) => match heap.get(*r) {
                Some(Object::String(s)) => Key::bytes(s),
                _ => return Err(RuntimeError::dangling_reference()),
            },
            Value::Array(r) => Key::Array(*r),
            Value::Table(r) => Key::Table(*r),
            Value::Reference(r) => Key::Reference(*r),
            Value::Function(f) => Key::Function(f.clone()),
            Value::NativeFunction(n) => Key::Native(*n),
            Value::Pointer(p) => Key::Pointer(*p),
        };
        Ok(key)
    }

    /// The value this key was made from; `None` for strings, which need a
    /// fresh heap allocation
    pub fn to_value(&self) -> Option<Value> {
        let value = match self {
            Key::Nil => Value::Nil,
            Key::Null => Value::Null,
            Key::Char(c) => Value::Char(*c),
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(n) => Value::Int(*n),
            Key::Long(n) => Value::Long(*n),
            Key::Float(x) => Value::Float(*x),
            Key::Double(x) => Value::Double(*x),
            Key::Str(_) => return None,
            Key::Array(r) => Value::Array(*r),
            Key::Table(r) => Value::Table(*r),
            Key::Reference(r) => Value::Reference(*r),
            Key::Function(f) => Value::Function(f.clone()),
            Key::Native(n) => Value::NativeFunction(*n),
            Key::Pointer(p) => Value::Pointer(*p),
        };
        Some(value)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Key::Str(s) => Some(&**s),
            _ => None,
        }
    }

    /// String key that is valid UTF-8, such as a variable name
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|s| std::str::from_utf8(s).ok())
    }

    fn tag(&self) -> u8 {
        match self {
            Key::Nil => 0,
            Key::Null => 1,
            Key::Char(_) => 2,
            Key::Bool(_) => 3,
            Key::Int(_) => 4,
            Key::Long(_) => 5,
            Key::Float(_) => 6,
            Key::Double(_) => 7,
            Key::Str(_) => 8,
            Key::Array(_) => 9,
            Key::Table(_) => 10,
            Key::Reference(_) => 11,
            Key::Function(_) => 12,
            Key::Native(_) => 13,
            Key::Pointer(_) => 14,
        }
    }

    fn hash(&self) -> u64 {
        let mut h = FxHasher::default();
        h.write_u8(self.tag());
        match self {
            Key::Nil | Key::Null => {}
            Key::Char(c) => h.write_u8(*c),
            Key::Bool(b) => h.write_u8(u8::from(*b)),
            Key::Int(n) => h.write_i32(*n),
            Key::Long(n) => h.write_i64(*n),
            Key::Float(x) => h.write_u32(x.to_bits()),
            Key::Double(x) => h.write_u64(x.to_bits()),
            Key::Str(s) => h.write(s),
            Key::Array(r) | Key::Table(r) | Key::Reference(r) => h.write_usize(r.address()),
            Key::Function(f) => h.write_usize(Rc::as_ptr(f) as usize),
            Key::Native(n) => h.write(n.name.as_bytes()),
            Key::Pointer(p) => h.write_usize(*p),
        }
        h.finish()
    }

    fn trace(&self, worklist: &mut Vec<ObjRef>) {
        match self {
            Key::Array(r) | Key::Table(r) | Key::Reference(r) => worklist.push(*r),
            Key::Function(f) => worklist.extend(f.captured.iter().copied()),
            _ => {}
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Nil, Key::Nil) | (Key::Null, Key::Null) => true,
            (Key::Char(a), Key::Char(b)) => a == b,
            (Key::Bool(a), Key::Bool(b)) => a == b,
            (Key::Int(a), Key::Int(b)) => a == b,
            (Key::Long(a), Key::Long(b)) => a == b,
            (Key::Float(a), Key::Float(b)) => a.to_bits() == b.to_bits(),
            (Key::Double(a), Key::Double(b)) => a.to_bits() == b.to_bits(),
            (Key::Str(a), Key::Str(b)) => a == b,
            (Key::Array(a), Key::Array(b))
            | (Key::Table(a), Key::Table(b))
            | (Key::Reference(a), Key::Reference(b)) => a == b,
            (Key::Function(a), Key::Function(b)) => Rc::ptr_eq(a, b),
            (Key::Native(a), Key::Native(b)) => a == b,
            (Key::Pointer(a), Key::Pointer(b)) => a == b,
            _ => false,
        }
    }
}

/// Table entry
#[derive(Debug)]
pub struct Pair {
    pub key: Key,
    pub value: Value,
}

impl Pair {
    fn lookup(key: &Key) -> Pair {
        Pair {
            key: key.clone(),
            value: Value::Nil,
        }
    }
}

/// [`NodeOps`] for table entries
#[derive(Debug, Default, Clone, Copy)]
pub struct PairOps;

impl NodeOps<Pair> for PairOps {
    fn hash(&self, node: &Pair) -> u64 {
        node.key.hash()
    }

    fn compare(&self, a: &Pair, b: &Pair) -> bool {
        a.key == b.key
    }
}

/// The table value type
#[derive(Debug, Default)]
pub struct Table {
    pairs: HashTable<Pair, PairOps>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.size()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&mut self, key: &Key) -> Option<&Value> {
        self.pairs.search(&Pair::lookup(key)).map(|p| &p.value)
    }

    pub fn get_mut(&mut self, key: &Key) -> Option<&mut Value> {
        self.pairs.search_mut(&Pair::lookup(key)).map(|p| &mut p.value)
    }

    /// Lookup without advancing a pending rehash
    pub fn peek(&self, key: &Key) -> Option<&Value> {
        self.pairs.peek(&Pair::lookup(key)).map(|p| &p.value)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.peek(key).is_some()
    }

    /// Insert or overwrite; returns true when the key was new
    pub fn set(&mut self, key: Key, value: Value) -> bool {
        self.pairs.replace(Pair { key, value })
    }

    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        self.pairs.take(&Pair::lookup(key)).map(|p| p.value)
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Keys in iteration order
    pub fn keys(&self) -> Vec<Key> {
        self.pairs.iter().map(|p| p.key.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.pairs.iter().map(|p| (&p.key, &p.value))
    }

    /// Push every heap object reachable from the keys and values
    pub fn trace(&self, worklist: &mut Vec<ObjRef>) {
        for pair in self.pairs.iter() {
            pair.key.trace(worklist);
            trace_value(&pair.value, worklist);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::heap::GcPolicy;

    #[test]
    fn test_scalar_types_never_collide() {
        let mut table = Table::new();
        table.set(Key::Int(1), Value::Int(10));
        table.set(Key::Long(1), Value::Int(20));
        table.set(Key::Char(1), Value::Int(30));
        assert_eq!(table.len(), 3);
        assert!(matches!(table.get(&Key::Long(1)), Some(Value::Int(20))));
        assert!(table.get(&Key::Double(1.0)).is_none());
    }

    #[test]
    fn test_string_keys_compare_by_content() {
        let mut heap = Heap::new(GcPolicy::EveryAllocation);
        let a = heap.takeover(Object::String(b"name".to_vec()));
        let b = heap.takeover(Object::String(b"name".to_vec()));
        let ka = Key::from_value(&Value::String(a), &heap).unwrap();
        let kb = Key::from_value(&Value::String(b), &heap).unwrap();
        assert_eq!(ka, kb);

        let mut table = Table::new();
        assert!(table.set(ka, Value::Int(1)));
        assert!(!table.set(kb, Value::Int(2)));
        assert!(matches!(table.peek(&Key::string("name")), Some(Value::Int(2))));
    }

    #[test]
    fn test_handle_keys_compare_by_identity() {
        let mut heap = Heap::new(GcPolicy::EveryAllocation);
        let a = heap.takeover(Object::Array(Vec::new()));
        let b = heap.takeover(Object::Array(Vec::new()));
        assert_ne!(Key::Array(a), Key::Array(b));
        assert_ne!(Key::Array(a), Key::Table(a));
        assert_eq!(Key::Array(a), Key::Array(a));
    }

    #[test]
    fn test_remove_and_keys() {
        let mut table = Table::new();
        for i in 0..20 {
            table.set(Key::Int(i), Value::Int(i * 2));
        }
        assert!(matches!(table.remove(&Key::Int(4)), Some(Value::Int(8))));
        assert!(table.remove(&Key::Int(4)).is_none());
        assert_eq!(table.keys().len(), 19);
        assert!(!table.contains(&Key::Int(4)));
    }

    #[test]
    fn test_key_round_trips_to_value() {
        assert!(matches!(Key::Bool(true).to_value(), Some(Value::Bool(true))));
        assert!(Key::string("s").to_value().is_none());
        assert!(Key::Null.to_value().unwrap().is_null_like());
    }

    #[test]
    fn test_byte_string_keys() {
        let high = Key::bytes(&[0xff, b'a']);
        assert_eq!(high, Key::bytes(&[0xff, b'a']));
        assert_eq!(high.as_bytes(), Some(&[0xff, b'a'][..]));
        assert_eq!(high.as_str(), None);
        assert_eq!(Key::string("name").as_str(), Some("name"));
    }

    #[test]
    fn test_float_keys_by_bits() {
        assert_eq!(Key::Double(f64::NAN), Key::Double(f64::NAN));
        assert_ne!(Key::Double(0.0), Key::Double(-0.0));
    }
}
