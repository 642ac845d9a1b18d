//! Execution environment
//!
//! One `Environment` owns everything a running program touches: the heap,
//! the global table, the operand stack, the stack of local-context frames
//! and the registries of loaded modules and packages. Expressions leave
//! their result on the operand stack; everything reachable from the stack,
//! the globals or any scope in any frame survives a collection.

use super::error::{InterpResult, RuntimeError};
use super::hash::{HashTable, NameOps, Named};
use super::heap::{GcRoot, GcStats, Heap, ObjRef};
use super::table::{Key, Table};
use super::value::{Closure, Native, Object, Value, format_float, format_single};
use crate::ast::{Block, Module};
use crate::config::RuntimeConfig;
use std::io::Write;
use std::rc::Rc;
use tracing::debug;

/// A loaded module
#[derive(Debug)]
pub struct ModuleEntry {
    pub name: String,
    pub module: Rc<Module>,
}

impl Named for ModuleEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A package name recorded by `require`
#[derive(Debug)]
pub struct PackageEntry {
    pub name: String,
}

impl Named for PackageEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Runtime state of one program
pub struct Environment {
    heap: Heap,
    globals: ObjRef,
    stack: Vec<Value>,
    /// Each frame is the ordered scope list of one call, innermost last
    frames: Vec<Vec<ObjRef>>,
    pending: Vec<Rc<Block>>,
    modules: HashTable<ModuleEntry, NameOps>,
    packages: HashTable<PackageEntry, NameOps>,
    out: Box<dyn Write>,
    config: RuntimeConfig,
    torn_down: bool,
}

impl Environment {
    /// Create an environment writing program output to stdout
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_output(config, Box::new(std::io::stdout()))
    }

    pub fn with_output(config: RuntimeConfig, out: Box<dyn Write>) -> Self {
        let mut heap = Heap::new(config.gc_policy);
        let globals = heap.takeover(Object::Table(Table::new()));
        Environment {
            heap,
            globals,
            stack: Vec::new(),
            frames: vec![Vec::new()],
            pending: Vec::new(),
            modules: HashTable::default(),
            packages: HashTable::default(),
            out,
            config,
            torn_down: false,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    // ---- allocation and collection ----

    /// Allocate an object, collecting first when the policy asks for it
    pub fn alloc_object(&mut self, object: Object) -> ObjRef {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.takeover(object)
    }

    /// Track an object without collecting
    pub fn takeover(&mut self, object: Object) -> ObjRef {
        self.heap.takeover(object)
    }

    /// Run a collection now; returns the number of freed objects
    pub fn collect_garbage(&mut self) -> usize {
        let roots = std::iter::once(GcRoot::Object(self.globals))
            .chain(self.stack.iter().map(GcRoot::Value))
            .chain(self.frames.iter().flatten().map(|r| GcRoot::Object(*r)));
        self.heap.collect(roots)
    }

    // ---- heap object access ----

    pub fn string(&self, r: ObjRef) -> InterpResult<&[u8]> {
        match self.heap.get(r) {
            Some(Object::String(s)) => Ok(s),
            _ => Err(RuntimeError::dangling_reference()),
        }
    }

    pub fn array(&self, r: ObjRef) -> InterpResult<&[Value]> {
        match self.heap.get(r) {
            Some(Object::Array(items)) => Ok(items),
            _ => Err(RuntimeError::dangling_reference()),
        }
    }

    pub fn array_mut(&mut self, r: ObjRef) -> InterpResult<&mut Vec<Value>> {
        match self.heap.get_mut(r) {
            Some(Object::Array(items)) => Ok(items),
            _ => Err(RuntimeError::dangling_reference()),
        }
    }

    pub fn table(&self, r: ObjRef) -> InterpResult<&Table> {
        match self.heap.get(r) {
            Some(Object::Table(table)) => Ok(table),
            _ => Err(RuntimeError::dangling_reference()),
        }
    }

    pub fn table_mut(&mut self, r: ObjRef) -> InterpResult<&mut Table> {
        match self.heap.get_mut(r) {
            Some(Object::Table(table)) => Ok(table),
            _ => Err(RuntimeError::dangling_reference()),
        }
    }

    /// Table key for a value
    pub fn key_of(&self, value: &Value) -> InterpResult<Key> {
        Key::from_value(value, &self.heap)
    }

    /// Value for a table key; string keys allocate a fresh string
    pub fn key_value(&mut self, key: &Key) -> Value {
        match (key.to_value(), key.as_bytes()) {
            (Some(value), _) => value,
            (None, Some(s)) => {
                let s = s.to_vec();
                Value::String(self.alloc_object(Object::String(s)))
            }
            (None, None) => Value::Null,
        }
    }

    // ---- operand stack ----

    pub fn push_value(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn push_char(&mut self, c: u8) {
        self.stack.push(Value::Char(c));
    }

    pub fn push_bool(&mut self, b: bool) {
        self.stack.push(Value::Bool(b));
    }

    pub fn push_int(&mut self, n: i32) {
        self.stack.push(Value::Int(n));
    }

    pub fn push_long(&mut self, n: i64) {
        self.stack.push(Value::Long(n));
    }

    pub fn push_float(&mut self, x: f32) {
        self.stack.push(Value::Float(x));
    }

    pub fn push_double(&mut self, x: f64) {
        self.stack.push(Value::Double(x));
    }

    pub fn push_null(&mut self) {
        self.stack.push(Value::Null);
    }

    pub fn push_pointer(&mut self, p: usize) {
        self.stack.push(Value::Pointer(p));
    }

    pub fn push_string(&mut self, s: &str) {
        self.push_bytes(s.as_bytes().to_vec());
    }

    pub fn push_bytes(&mut self, s: Vec<u8>) {
        let r = self.alloc_object(Object::String(s));
        self.stack.push(Value::String(r));
    }

    pub fn push_array(&mut self) {
        let r = self.alloc_object(Object::Array(Vec::new()));
        self.stack.push(Value::Array(r));
    }

    pub fn push_table(&mut self) {
        let r = self.alloc_object(Object::Table(Table::new()));
        self.stack.push(Value::Table(r));
    }

    pub fn push_function(&mut self, closure: Rc<Closure>) {
        self.stack.push(Value::Function(closure));
    }

    pub fn push_native_function(&mut self, native: Native) {
        self.stack.push(Value::NativeFunction(native));
    }

    /// Pop and discard the top value
    pub fn pop_value(&mut self) -> InterpResult<()> {
        self.take_value().map(drop)
    }

    /// Pop the top value
    pub fn take_value(&mut self) -> InterpResult<Value> {
        self.stack.pop().ok_or_else(RuntimeError::stack_underflow)
    }

    /// Value `depth` entries below the top (0 is the top)
    pub fn peek_value(&self, depth: usize) -> InterpResult<&Value> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .map(|i| &self.stack[i])
            .ok_or_else(RuntimeError::stack_underflow)
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn truncate_stack(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    /// Swap the top two values
    pub fn xchg_stack(&mut self) -> InterpResult<()> {
        let len = self.stack.len();
        if len < 2 {
            return Err(RuntimeError::stack_underflow());
        }
        self.stack.swap(len - 1, len - 2);
        Ok(())
    }

    /// Move the top value down over the `n` values below it, dropping them
    pub fn return_below(&mut self, n: usize) -> InterpResult<()> {
        let top = self.take_value()?;
        let len = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(RuntimeError::stack_underflow)?;
        self.stack.truncate(len);
        self.stack.push(top);
        Ok(())
    }

    /// Pop a value and append it to the array just below it
    pub fn array_push_top(&mut self) -> InterpResult<()> {
        let value = self.take_value()?;
        match self.peek_value(0)? {
            Value::Array(r) => {
                let r = *r;
                self.array_mut(r)?.push(value);
                Ok(())
            }
            other => Err(RuntimeError::type_error(format!(
                "cannot append to {}",
                other.type_name()
            ))),
        }
    }

    /// Pop a value and a key and store them in the table just below
    pub fn table_set_top(&mut self) -> InterpResult<()> {
        let value = self.take_value()?;
        let key = self.take_value()?;
        let key = self.key_of(&key)?;
        match self.peek_value(0)? {
            Value::Table(r) => {
                let r = *r;
                self.table_mut(r)?.set(key, value);
                Ok(())
            }
            other => Err(RuntimeError::type_error(format!(
                "cannot store a key in {}",
                other.type_name()
            ))),
        }
    }

    // ---- local contexts and frames ----

    fn frame_mut(&mut self) -> &mut Vec<ObjRef> {
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn frame(&self) -> &[ObjRef] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Open a new innermost scope in the active frame
    pub fn push_local_context(&mut self) {
        let scope = self.alloc_object(Object::Table(Table::new()));
        self.frame_mut().push(scope);
    }

    pub fn pop_local_context(&mut self) -> InterpResult<()> {
        self.frame_mut()
            .pop()
            .map(drop)
            .ok_or_else(RuntimeError::stack_underflow)
    }

    /// Number of scopes in the active frame
    pub fn local_depth(&self) -> usize {
        self.frame().len()
    }

    /// Drop innermost scopes until `depth` remain
    pub fn truncate_locals(&mut self, depth: usize) {
        self.frame_mut().truncate(depth);
    }

    /// Snapshot of the active frame's scopes, for closures
    pub fn capture_scopes(&self) -> Rc<[ObjRef]> {
        Rc::from(self.frame())
    }

    /// Enter a call: the callee sees exactly `scopes`
    pub fn push_frame(&mut self, scopes: Vec<ObjRef>) {
        self.frames.push(scopes);
    }

    pub fn pop_frame(&mut self) -> InterpResult<()> {
        if self.frames.len() <= 1 {
            return Err(RuntimeError::stack_underflow());
        }
        self.frames.pop();
        Ok(())
    }

    /// Allocate a scope table holding the given bindings
    pub fn new_scope(&mut self, bindings: impl IntoIterator<Item = (String, Value)>) -> ObjRef {
        let mut table = Table::new();
        for (name, value) in bindings {
            table.set(Key::string(&name), value);
        }
        self.alloc_object(Object::Table(table))
    }

    // ---- bindings ----

    /// Innermost binding of `name`, falling back to the globals
    pub fn lookup(&mut self, name: &str) -> InterpResult<Option<Value>> {
        let key = Key::string(name);
        for i in (0..self.local_depth()).rev() {
            let scope = self.frame()[i];
            if let Some(value) = self.table_mut(scope)?.get(&key) {
                return Ok(Some(value.clone()));
            }
        }
        let globals = self.globals;
        Ok(self.table_mut(globals)?.get(&key).cloned())
    }

    /// Overwrite the nearest binding of `name`, creating a global when none exists
    pub fn assign(&mut self, name: &str, value: Value) -> InterpResult<()> {
        let key = Key::string(name);
        for i in (0..self.local_depth()).rev() {
            let scope = self.frame()[i];
            if let Some(slot) = self.table_mut(scope)?.get_mut(&key) {
                *slot = value;
                return Ok(());
            }
        }
        let globals = self.globals;
        self.table_mut(globals)?.set(key, value);
        Ok(())
    }

    /// Bind `name` in the innermost scope (the globals when the frame has none)
    pub fn define_local(&mut self, name: &str, value: Value) -> InterpResult<()> {
        let scope = self.frame().last().copied().unwrap_or(self.globals);
        self.table_mut(scope)?.set(Key::string(name), value);
        Ok(())
    }

    pub fn set_global(&mut self, name: &str, value: Value) -> InterpResult<()> {
        let globals = self.globals;
        self.table_mut(globals)?.set(Key::string(name), value);
        Ok(())
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.table(self.globals).ok()?.peek(&Key::string(name)).cloned()
    }

    /// Every name visible from the active frame, for suggestions
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for &scope in self.frame().iter().chain(std::iter::once(&self.globals)) {
            if let Ok(table) = self.table(scope) {
                names.extend(table.iter().filter_map(|(k, _)| k.as_str().map(str::to_string)));
            }
        }
        names
    }

    // ---- modules and packages ----

    /// Install a parsed module: its named functions become globals and its
    /// body is queued on the pending-block stack
    pub fn add_module(&mut self, module: Rc<Module>) -> InterpResult<()> {
        for def in &module.functions {
            let captured: Rc<[ObjRef]> = Rc::new([]);
            let closure = Rc::new(Closure::new(def.clone(), captured));
            self.set_global(def.display_name(), Value::Function(closure))?;
        }
        debug!(
            module = %module.name,
            functions = module.functions.len(),
            "module installed"
        );
        self.pending.push(module.body.clone());
        self.modules.replace(ModuleEntry {
            name: module.name.clone(),
            module,
        });
        Ok(())
    }

    /// Pop the most recently queued module body
    pub fn take_pending(&mut self) -> Option<Rc<Block>> {
        self.pending.pop()
    }

    /// Every module installed so far, in no particular order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.modules.iter()
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.packages
            .peek(&PackageEntry {
                name: name.to_string(),
            })
            .is_some()
    }

    /// Record a package; false when it was already recorded
    pub fn add_package(&mut self, name: &str) -> bool {
        self.packages.insert(PackageEntry {
            name: name.to_string(),
        })
    }

    // ---- native libraries ----

    /// Create the global table `name` and fill it with `natives`, keyed by the
    /// part of each qualified name after the last dot
    pub fn register_library(&mut self, name: &str, natives: &[Native]) -> InterpResult<()> {
        let lib = self.alloc_object(Object::Table(Table::new()));
        self.set_global(name, Value::Table(lib))?;
        let table = self.table_mut(lib)?;
        for native in natives {
            let field = native.name.rsplit('.').next().unwrap_or(native.name);
            table.set(Key::string(field), Value::NativeFunction(*native));
        }
        debug!(library = name, functions = natives.len(), "library registered");
        Ok(())
    }

    /// Store a constant in a registered library
    pub fn set_library_value(&mut self, library: &str, field: &str, value: Value) -> InterpResult<()> {
        match self.get_global(library) {
            Some(Value::Table(r)) => {
                self.table_mut(r)?.set(Key::string(field), value);
                Ok(())
            }
            _ => Err(RuntimeError::undefined_reference(library, None)),
        }
    }

    pub fn register_global(&mut self, native: Native) -> InterpResult<()> {
        self.set_global(native.name, Value::NativeFunction(native))
    }

    // ---- native argument access ----

    /// Argument `i` of a native called with `argc` arguments (`Null` when missing)
    pub fn arg(&self, argc: usize, i: usize) -> Value {
        if i >= argc {
            return Value::Null;
        }
        self.stack
            .len()
            .checked_sub(argc - i)
            .map(|at| self.stack[at].clone())
            .unwrap_or(Value::Null)
    }

    fn bad_arg(&self, function: &str, argc: usize, i: usize, expected: &str) -> RuntimeError {
        RuntimeError::bad_argument(function, i + 1, expected, self.arg(argc, i).type_name())
    }

    pub fn arg_int(&self, function: &str, argc: usize, i: usize) -> InterpResult<i64> {
        self.arg(argc, i)
            .as_integer()
            .ok_or_else(|| self.bad_arg(function, argc, i, "an integer"))
    }

    pub fn arg_double(&self, function: &str, argc: usize, i: usize) -> InterpResult<f64> {
        self.arg(argc, i)
            .as_f64()
            .ok_or_else(|| self.bad_arg(function, argc, i, "a number"))
    }

    pub fn arg_bool(&self, function: &str, argc: usize, i: usize) -> InterpResult<bool> {
        self.arg(argc, i)
            .as_bool()
            .ok_or_else(|| self.bad_arg(function, argc, i, "a bool"))
    }

    /// String argument that must be valid UTF-8 (paths, formats, numbers)
    pub fn arg_str(&self, function: &str, argc: usize, i: usize) -> InterpResult<String> {
        String::from_utf8(self.arg_bytes(function, argc, i)?).map_err(|_| {
            RuntimeError::type_error(format!(
                "{function}: argument {} is not valid UTF-8",
                i + 1
            ))
        })
    }

    pub fn arg_bytes(&self, function: &str, argc: usize, i: usize) -> InterpResult<Vec<u8>> {
        match self.arg(argc, i) {
            Value::String(r) => Ok(self.string(r)?.to_vec()),
            _ => Err(self.bad_arg(function, argc, i, "a string")),
        }
    }

    pub fn arg_array(&self, function: &str, argc: usize, i: usize) -> InterpResult<ObjRef> {
        match self.arg(argc, i) {
            Value::Array(r) => Ok(r),
            _ => Err(self.bad_arg(function, argc, i, "an array")),
        }
    }

    pub fn arg_table(&self, function: &str, argc: usize, i: usize) -> InterpResult<ObjRef> {
        match self.arg(argc, i) {
            Value::Table(r) => Ok(r),
            _ => Err(self.bad_arg(function, argc, i, "a table")),
        }
    }

    /// Drop a native's arguments and push its result
    pub fn return_value(&mut self, argc: usize, value: Value) -> InterpResult<()> {
        let len = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or_else(RuntimeError::stack_underflow)?;
        self.stack.truncate(len);
        self.stack.push(value);
        Ok(())
    }

    /// Drop a native's arguments and push a new string
    pub fn return_string(&mut self, argc: usize, s: String) -> InterpResult<()> {
        self.return_bytes(argc, s.into_bytes())
    }

    pub fn return_bytes(&mut self, argc: usize, s: Vec<u8>) -> InterpResult<()> {
        let len = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or_else(RuntimeError::stack_underflow)?;
        self.stack.truncate(len);
        self.push_bytes(s);
        Ok(())
    }

    // ---- indexing ----

    /// `object[index]`
    pub fn index_get(&mut self, object: &Value, index: &Value) -> InterpResult<Value> {
        match object {
            Value::Array(r) => {
                let items = self.array(*r)?;
                let i = element_index(index, items.len())?;
                Ok(items[i].clone())
            }
            Value::String(r) => {
                let bytes = self.string(*r)?;
                let i = element_index(index, bytes.len())?;
                Ok(Value::Char(bytes[i]))
            }
            Value::Table(r) => {
                let key = self.key_of(index)?;
                Ok(self.table_mut(*r)?.get(&key).cloned().unwrap_or(Value::Null))
            }
            other => Err(RuntimeError::type_error(format!(
                "'{}' is not indexable",
                other.type_name()
            ))),
        }
    }

    /// `object[index] = value`; writing one past the end of an array appends
    pub fn index_set(&mut self, object: &Value, index: &Value, value: Value) -> InterpResult<()> {
        match object {
            Value::Array(r) => {
                let items = self.array_mut(*r)?;
                let len = items.len();
                match index.as_integer() {
                    Some(i) if i >= 0 && i as usize == len => items.push(value),
                    _ => {
                        let i = element_index(index, len)?;
                        items[i] = value;
                    }
                }
                Ok(())
            }
            Value::Table(r) => {
                let key = self.key_of(index)?;
                self.table_mut(*r)?.set(key, value);
                Ok(())
            }
            Value::String(_) => Err(RuntimeError::type_error("strings are immutable")),
            other => Err(RuntimeError::type_error(format!(
                "'{}' does not support index assignment",
                other.type_name()
            ))),
        }
    }

    // ---- output ----

    pub fn write_output(&mut self, bytes: &[u8]) -> InterpResult<()> {
        self.out
            .write_all(bytes)
            .map_err(|e| RuntimeError::io_error(format!("write failed: {e}")))
    }

    pub fn flush_output(&mut self) -> InterpResult<()> {
        self.out
            .flush()
            .map_err(|e| RuntimeError::io_error(format!("flush failed: {e}")))
    }

    // ---- display ----

    pub fn type_name(&self, value: &Value) -> &'static str {
        value.type_name()
    }

    /// Printable form of a value for diagnostics and the REPL
    pub fn display(&self, value: &Value) -> String {
        String::from_utf8_lossy(&self.display_bytes(value)).into_owned()
    }

    /// Printed bytes of a value; strings nested in containers are quoted
    /// with non-printable bytes escaped
    pub fn display_bytes(&self, value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_display(value, &mut out, &mut Vec::new(), false);
        out
    }

    fn write_display(&self, value: &Value, out: &mut Vec<u8>, seen: &mut Vec<ObjRef>, nested: bool) {
        match value {
            Value::Nil => out.extend_from_slice(b"nil"),
            Value::Null => out.extend_from_slice(b"null"),
            Value::Char(c) if nested => {
                let _ = write!(out, "'{}'", std::ascii::escape_default(*c));
            }
            Value::Char(c) => out.push(*c),
            Value::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            Value::Int(n) => {
                let _ = write!(out, "{n}");
            }
            Value::Long(n) => {
                let _ = write!(out, "{n}");
            }
            Value::Float(x) => out.extend_from_slice(format_single(*x).as_bytes()),
            Value::Double(x) => out.extend_from_slice(format_float(*x).as_bytes()),
            Value::String(r) => match self.string(*r) {
                Ok(s) if nested => {
                    let _ = write!(out, "\"{}\"", s.escape_ascii());
                }
                Ok(s) => out.extend_from_slice(s),
                Err(_) => out.extend_from_slice(b"<dangling>"),
            },
            Value::Array(r) => {
                let Ok(items) = self.array(*r) else {
                    out.extend_from_slice(b"<dangling>");
                    return;
                };
                if seen.contains(r) {
                    out.extend_from_slice(b"[...]");
                    return;
                }
                seen.push(*r);
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.extend_from_slice(b", ");
                    }
                    self.write_display(item, out, seen, true);
                }
                out.push(b']');
                seen.pop();
            }
            Value::Table(r) => {
                let Ok(table) = self.table(*r) else {
                    out.extend_from_slice(b"<dangling>");
                    return;
                };
                if seen.contains(r) {
                    out.extend_from_slice(b"{...}");
                    return;
                }
                seen.push(*r);
                out.push(b'{');
                for (i, (key, value)) in table.iter().enumerate() {
                    if i > 0 {
                        out.extend_from_slice(b", ");
                    }
                    match (key.as_bytes(), key.to_value()) {
                        (Some(s), _) => out.extend_from_slice(s),
                        (None, Some(k)) => self.write_display(&k, out, seen, true),
                        (None, None) => {}
                    }
                    out.extend_from_slice(b": ");
                    self.write_display(value, out, seen, true);
                }
                out.push(b'}');
                seen.pop();
            }
            Value::Function(closure) => {
                let _ = write!(out, "<function {}>", closure.def.display_name());
            }
            Value::NativeFunction(native) => {
                let _ = write!(out, "<native function {}>", native.name);
            }
            Value::Pointer(p) => {
                let _ = write!(out, "0x{p:x}");
            }
            Value::Reference(r) => {
                let kind = self.heap.get(*r).map(Object::type_name).unwrap_or("dangling");
                let _ = write!(out, "<reference to {kind} 0x{:x}>", r.address());
            }
        }
    }

    // ---- lifecycle ----

    /// Drop back to the base state after a reported error
    pub fn reset(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.frames.push(Vec::new());
        self.pending.clear();
    }

    /// Clear the globals, collect, then free whatever is left
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        let _ = self.flush_output();
        let globals = self.globals;
        if let Ok(table) = self.table_mut(globals) {
            table.clear();
        }
        self.stack.clear();
        self.frames.clear();
        self.pending.clear();
        self.heap.collect([GcRoot::Object(globals)]);
        let leftover = self.heap.free_all();
        let stats = self.heap.stats();
        debug!(
            collections = stats.collections,
            allocated = stats.allocated,
            freed = stats.freed,
            peak_live = stats.peak_live,
            leftover,
            "environment torn down"
        );
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Position `index` in a sequence of `len` elements
fn element_index(index: &Value, len: usize) -> InterpResult<usize> {
    let Some(i) = index.as_integer() else {
        return Err(RuntimeError::type_error(format!(
            "index must be an integer, got {}",
            index.type_name()
        )));
    };
    if i < 0 || i as usize >= len {
        return Err(RuntimeError::index_out_of_bounds(i, len));
    }
    Ok(i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::GcPolicy;

    fn env() -> Environment {
        Environment::with_output(RuntimeConfig::default(), Box::new(std::io::sink()))
    }

    #[test]
    fn test_stack_push_pop() {
        let mut env = env();
        env.push_int(1);
        env.push_bool(true);
        assert_eq!(env.stack_len(), 2);
        assert!(matches!(env.take_value().unwrap(), Value::Bool(true)));
        env.pop_value().unwrap();
        assert!(env.pop_value().is_err());
    }

    #[test]
    fn test_xchg_and_return_below() {
        let mut env = env();
        env.push_int(1);
        env.push_int(2);
        env.push_int(3);
        env.xchg_stack().unwrap();
        assert!(matches!(env.peek_value(0).unwrap(), Value::Int(2)));
        env.return_below(2).unwrap();
        assert_eq!(env.stack_len(), 1);
        assert!(matches!(env.peek_value(0).unwrap(), Value::Int(2)));
    }

    #[test]
    fn test_assign_creates_global_and_updates_nearest() {
        let mut env = env();
        env.assign("x", Value::Int(1)).unwrap();
        env.push_local_context();
        env.assign("x", Value::Int(2)).unwrap();
        env.pop_local_context().unwrap();
        assert!(matches!(env.lookup("x").unwrap(), Some(Value::Int(2))));
    }

    #[test]
    fn test_define_local_shadows_global() {
        let mut env = env();
        env.set_global("x", Value::Int(1)).unwrap();
        env.push_local_context();
        env.define_local("x", Value::Int(5)).unwrap();
        env.assign("x", Value::Int(6)).unwrap();
        assert!(matches!(env.lookup("x").unwrap(), Some(Value::Int(6))));
        env.pop_local_context().unwrap();
        assert!(matches!(env.lookup("x").unwrap(), Some(Value::Int(1))));
        assert!(env.lookup("missing").unwrap().is_none());
    }

    #[test]
    fn test_frames_hide_caller_locals() {
        let mut env = env();
        env.push_local_context();
        env.define_local("caller", Value::Int(1)).unwrap();
        let param = env.new_scope([("a".to_string(), Value::Int(2))]);
        env.push_frame(vec![param]);
        assert!(env.lookup("caller").unwrap().is_none());
        assert!(matches!(env.lookup("a").unwrap(), Some(Value::Int(2))));
        env.pop_frame().unwrap();
        assert!(env.pop_frame().is_err());
        assert!(env.lookup("caller").unwrap().is_some());
    }

    #[test]
    fn test_string_handles_alias() {
        let mut env = env();
        env.push_string("abc");
        let a = env.take_value().unwrap();
        let b = a.clone();
        env.push_value(a);
        assert_eq!(b.object(), env.peek_value(0).unwrap().object());
    }

    #[test]
    fn test_gc_round_trip_returns_to_baseline() {
        let mut env = env();
        env.collect_garbage();
        let baseline = env.heap().live_objects();
        for i in 0..100 {
            env.push_string(&format!("s{i}"));
        }
        assert_eq!(env.heap().live_objects(), baseline + 100);
        for _ in 0..100 {
            env.pop_value().unwrap();
        }
        env.collect_garbage();
        assert_eq!(env.heap().live_objects(), baseline);
    }

    #[test]
    fn test_every_allocation_policy_frees_unrooted() {
        let mut env = env();
        assert_eq!(env.heap().policy(), GcPolicy::EveryAllocation);
        env.push_string("a");
        env.pop_value().unwrap();
        let before = env.gc_stats().freed;
        env.push_string("b");
        assert_eq!(env.gc_stats().freed, before + 1);
    }

    #[test]
    fn test_locals_survive_collection() {
        let mut env = env();
        env.push_local_context();
        env.push_string("kept");
        let s = env.take_value().unwrap();
        env.define_local("s", s.clone()).unwrap();
        env.collect_garbage();
        let r = s.object().unwrap();
        assert_eq!(env.string(r).unwrap(), b"kept");
    }

    #[test]
    fn test_index_get_and_set() {
        let mut env = env();
        env.push_array();
        let array = env.take_value().unwrap();
        env.push_value(array.clone());
        env.index_set(&array, &Value::Int(0), Value::Int(7)).unwrap();
        assert!(matches!(env.index_get(&array, &Value::Int(0)).unwrap(), Value::Int(7)));
        let err = env.index_get(&array, &Value::Int(3)).unwrap_err();
        assert_eq!(err.kind, crate::interp::ErrorKind::IndexOutOfBounds);
    }

    #[test]
    fn test_display_nested() {
        let mut env = env();
        env.push_array();
        env.push_int(1);
        env.array_push_top().unwrap();
        env.push_string("x");
        env.array_push_top().unwrap();
        env.push_double(2.0);
        env.array_push_top().unwrap();
        let array = env.peek_value(0).unwrap().clone();
        assert_eq!(env.display(&array), r#"[1, "x", 2.0]"#);
    }

    #[test]
    fn test_display_keeps_raw_bytes() {
        let mut env = env();
        env.push_bytes(vec![b'a', 0xff]);
        let s = env.take_value().unwrap();
        assert_eq!(env.display_bytes(&s), vec![b'a', 0xff]);
        assert_eq!(env.display_bytes(&Value::Char(0xff)), vec![0xff]);

        env.push_array();
        env.push_value(s);
        env.array_push_top().unwrap();
        env.push_char(0xff);
        env.array_push_top().unwrap();
        let array = env.take_value().unwrap();
        assert_eq!(env.display(&array), r#"["a\xff", '\xff']"#);
    }

    #[test]
    fn test_string_index_reads_bytes() {
        let mut env = env();
        env.push_bytes(vec![0xc3, 0xbf]);
        let s = env.peek_value(0).unwrap().clone();
        assert!(matches!(env.index_get(&s, &Value::Int(0)).unwrap(), Value::Char(0xc3)));
        assert!(matches!(env.index_get(&s, &Value::Int(1)).unwrap(), Value::Char(0xbf)));
    }

    #[test]
    fn test_modules_registry_lists_installed_modules() {
        let mut env = env();
        let module = crate::parser::parse_source("util", "util.ks", "func f() {}").unwrap();
        env.add_module(Rc::new(module)).unwrap();
        assert!(env.take_pending().is_some());
        let names: Vec<&str> = env.modules().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["util"]);
        assert_eq!(env.modules().count(), 1);
    }

    #[test]
    fn test_display_cycle() {
        let mut env = env();
        env.push_array();
        let array = env.peek_value(0).unwrap().clone();
        env.push_value(array.clone());
        env.array_push_top().unwrap();
        assert_eq!(env.display(&array), "[[...]]");
    }

    fn native_noop(env: &mut Environment, argc: usize) -> InterpResult<()> {
        env.return_value(argc, Value::Null)
    }

    #[test]
    fn test_register_library() {
        let mut env = env();
        env.register_library("demo", &[Native::new("demo.noop", native_noop)])
            .unwrap();
        env.set_library_value("demo", "answer", Value::Int(42)).unwrap();
        let Some(Value::Table(lib)) = env.get_global("demo") else {
            panic!("library table missing");
        };
        let table = env.table(lib).unwrap();
        assert!(matches!(table.peek(&Key::string("noop")), Some(Value::NativeFunction(n)) if n.name == "demo.noop"));
        assert!(matches!(table.peek(&Key::string("answer")), Some(Value::Int(42))));
    }

    #[test]
    fn test_packages_are_idempotent() {
        let mut env = env();
        assert!(!env.has_package("util"));
        assert!(env.add_package("util"));
        assert!(!env.add_package("util"));
        assert!(env.has_package("util"));
    }

    #[test]
    fn test_native_args() {
        let mut env = env();
        env.push_int(3);
        env.push_string("s");
        assert_eq!(env.arg_int("f", 2, 0).unwrap(), 3);
        assert_eq!(env.arg_str("f", 2, 1).unwrap(), "s");
        assert_eq!(env.arg_bytes("f", 2, 1).unwrap(), b"s");
        let err = env.arg_int("f", 2, 1).unwrap_err();
        assert_eq!(err.message, "f: argument 2 must be an integer, got string");
        assert!(env.arg(2, 5).is_null_like());
        env.return_value(2, Value::Bool(true)).unwrap();
        assert_eq!(env.stack_len(), 1);
    }

    #[test]
    fn test_teardown_frees_everything() {
        let mut env = env();
        env.push_string("a");
        env.set_global("t", Value::Null).unwrap();
        env.teardown();
        assert_eq!(env.heap().live_objects(), 0);
        env.teardown();
    }
}
