//! The virtual machine.
//!
//! A single value stack, the string pool, the heap, the global code pool,
//! and the globals/locals dicts. `eval` walks one code block; operator and
//! attribute dispatch route through the per-type modules, which call back
//! into `eval` for user code, so the interpreter is reentrant on one
//! thread.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    builtins,
    code::{Code, Instr, Op},
    compiler::Compiler,
    error::{RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, MAX_CACHED_STR_LEN, StrId, build_char_cache},
    io::{PrintWriter, StdPrint},
    types::{self, Dict, Func, class},
    value::{CmpResult, Type, Value},
};

/// Maximum number of values on the stack.
pub const VM_STACK_SIZE: usize = 1024 * 1024;

/// The range of small-int singletons. Ints are immediates, so the range
/// documents the identity guarantee rather than backing a cache.
pub const MIN_CACHED_INT: i64 = -100;
pub const MAX_CACHED_INT: i64 = 100;

/// Debug-print intensities; observable settings, not semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub print_tokens: u8,
    pub print_code: u8,
    pub print_stack: u8,
    pub print_eval: u8,
}

/// Interned ids of the names the VM itself dispatches on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Names {
    pub at: StrId,
    pub name: StrId,
    pub iter: StrId,
    pub next: StrId,
    pub init: StrId,
    pub cmp: StrId,
    pub print: StrId,
}

/// One VM: stack, caches, heap, globals, and the current locals scope.
pub struct Vm {
    stack: Vec<Value>,
    pub(crate) heap: Heap,
    pub(crate) interns: Interns,
    char_strs: [StrId; 256],
    /// Append-only pool of shared func cells; `LOAD_FUNC i` pushes entry i.
    code_pool: Vec<HeapId>,
    globals: HeapId,
    locals: Option<HeapId>,
    pub(crate) names: Names,
    op_names: [StrId; Op::ALL.len()],
    pub flags: DebugFlags,
    writer: Box<dyn PrintWriter>,
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        Self::with_writer(Box::new(StdPrint))
    }

    #[must_use]
    pub fn with_writer(writer: Box<dyn PrintWriter>) -> Self {
        let mut interns = Interns::new();
        let char_strs = build_char_cache(&mut interns);
        let names = Names {
            at: interns.intern(b"@"),
            name: interns.intern(b"name"),
            iter: interns.intern(b"__iter__"),
            next: interns.intern(b"__next__"),
            init: interns.intern(b"__init__"),
            cmp: interns.intern(b"__cmp__"),
            print: interns.intern(b"__print__"),
        };
        let mut op_names = [names.at; Op::ALL.len()];
        for (slot, op) in op_names.iter_mut().zip(Op::ALL) {
            *slot = interns.intern(op.token().as_bytes());
        }
        let mut heap = Heap::new();
        let globals = heap.alloc(HeapData::Dict(Dict::new()));
        let mut vm = Self {
            stack: Vec::new(),
            heap,
            interns,
            char_strs,
            code_pool: Vec::new(),
            globals,
            locals: None,
            names,
            op_names,
            flags: DebugFlags::default(),
            writer,
        };
        vm.install_globals();
        builtins::install(&mut vm);
        vm
    }

    /// Replaces the output writer, e.g. to capture print output.
    pub fn set_writer(&mut self, writer: Box<dyn PrintWriter>) {
        self.writer = writer;
    }

    fn install_globals(&mut self) {
        self.set_global(b"null", Value::Null);
        self.set_global(b"true", Value::Bool(true));
        self.set_global(b"false", Value::Bool(false));
        self.set_global(b"type", Value::Type(Type::Type));
        self.set_global(b"nulltype", Value::Type(Type::Null));
        self.set_global(b"bool", Value::Type(Type::Bool));
        self.set_global(b"int", Value::Type(Type::Int));
        self.set_global(b"str", Value::Type(Type::Str));
        self.set_global(b"list", Value::Type(Type::List));
        self.set_global(b"dict", Value::Type(Type::Dict));
        self.set_global(b"iterator", Value::Type(Type::Iterator));
        self.set_global(b"func", Value::Type(Type::Func));
        self.set_global(b"vm", Value::Vm);
    }

    /// Defines or replaces a global.
    pub fn set_global(&mut self, name: &[u8], value: Value) {
        let id = self.interns.intern(name);
        self.heap.dict_mut(self.globals).set(id, value);
    }

    /// Looks up a global by name.
    #[must_use]
    pub fn get_global(&self, name: &[u8]) -> Option<Value> {
        let id = self.interns.lookup(name)?;
        self.heap.dict(self.globals).get(id)
    }

    /// Registers a native function as a global.
    pub(crate) fn set_builtin(&mut self, name: &[u8], f: types::NativeFn) {
        let name_id = self.interns.intern(name);
        let func_id = self.heap.alloc(HeapData::Func(Func::native(Some(name_id), f)));
        self.heap.dict_mut(self.globals).set(name_id, Value::Ref(func_id));
    }

    pub(crate) fn globals_id(&self) -> HeapId {
        self.globals
    }

    pub(crate) fn locals_id(&self) -> Option<HeapId> {
        self.locals
    }

    // ---------------------------------------------------------------
    // Stack
    // ---------------------------------------------------------------

    pub fn push(&mut self, value: Value) -> RunResult<()> {
        if self.stack.len() >= VM_STACK_SIZE {
            return Err(RunError::stack("Out of stack space!"));
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> RunResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RunError::stack("Tried to pop from an empty stack!"))
    }

    pub fn top(&self) -> RunResult<Value> {
        self.stack_get(0)
    }

    /// Reads the value `i` entries below the top.
    pub fn stack_get(&self, i: usize) -> RunResult<Value> {
        let len = self.stack.len();
        if i >= len {
            return Err(RunError::stack(format!(
                "Can't get at index {i} from stack of size {len}"
            )));
        }
        Ok(self.stack[len - 1 - i])
    }

    /// Replaces the value `i` entries below the top.
    pub fn stack_set(&mut self, i: usize, value: Value) -> RunResult<()> {
        let len = self.stack.len();
        if i >= len {
            return Err(RunError::stack(format!(
                "Can't set at index {i} in stack of size {len}"
            )));
        }
        self.stack[len - 1 - i] = value;
        Ok(())
    }

    /// Removes and returns the value `i` entries below the top, closing
    /// the gap. This is how a binary operator's receiver is pulled out
    /// from under its argument.
    pub fn pluck(&mut self, i: usize) -> RunResult<Value> {
        let value = self.stack_get(i)?;
        let index = self.stack.len() - 1 - i;
        self.stack.remove(index);
        Ok(value)
    }

    pub fn drop_n(&mut self, n: usize) -> RunResult<()> {
        let len = self.stack.len();
        if n > len {
            return Err(RunError::stack(format!(
                "Tried to pop {n} items from stack of size {len}"
            )));
        }
        self.stack.truncate(len - n);
        Ok(())
    }

    /// Removes the top `n` values, returned bottom-to-top. The caller has
    /// already checked `n` against the stack size.
    pub(crate) fn split_off_top(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    #[must_use]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn stack_values(&self) -> &[Value] {
        &self.stack
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    // ---------------------------------------------------------------
    // Coercions and helpers
    // ---------------------------------------------------------------

    /// Everything is truthy except `null` and `false`.
    #[must_use]
    pub fn to_bool(&self, value: Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => b,
            _ => true,
        }
    }

    pub fn to_int(&self, value: Value) -> RunResult<i64> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(RunError::type_error(format!(
                "Cannot coerce '{}' to int",
                self.type_name(other)
            ))),
        }
    }

    /// Borrows the bytes of a string value.
    pub fn str_bytes(&self, value: Value) -> RunResult<&[u8]> {
        match value {
            Value::Str(id) => Ok(self.interns.get(id)),
            Value::Ref(id) => {
                if let HeapData::Str(bytes) = self.heap.get(id) {
                    Ok(bytes)
                } else {
                    Err(self.str_coerce_error(value))
                }
            }
            other => Err(self.str_coerce_error(other)),
        }
    }

    /// Owned copy of a string value's bytes.
    pub fn to_str_bytes(&self, value: Value) -> RunResult<Vec<u8>> {
        self.str_bytes(value).map(<[u8]>::to_vec)
    }

    fn str_coerce_error(&self, value: Value) -> RunError {
        RunError::type_error(format!("Cannot coerce '{}' to str", self.type_name(value)))
    }

    /// The pool id for a string value, interning heap strings on demand
    /// (dict keys are pool ids).
    pub(crate) fn to_str_id(&mut self, value: Value) -> RunResult<StrId> {
        match value {
            Value::Str(id) => Ok(id),
            _ => {
                let bytes = self.to_str_bytes(value)?;
                Ok(self.interns.intern(&bytes))
            }
        }
    }

    /// A string value must be exactly one byte long to be a char.
    pub fn to_char(&self, value: Value) -> RunResult<u8> {
        let bytes = self.str_bytes(value)?;
        if let [b] = bytes {
            Ok(*b)
        } else {
            Err(RunError::type_error(format!(
                "Cannot coerce str of size {} to char",
                bytes.len()
            )))
        }
    }

    /// A pair is a two-element list.
    pub(crate) fn to_pair(&self, value: Value) -> RunResult<(Value, Value)> {
        if let Value::Ref(id) = value
            && let HeapData::List(list) = self.heap.get(id)
        {
            return list.assert_pair();
        }
        Err(RunError::type_error(format!(
            "Can't interpret '{}' as a pair",
            self.type_name(value)
        )))
    }

    /// The singleton single-byte string for `b` (the empty string for 0).
    #[must_use]
    pub fn char_str(&self, b: u8) -> Value {
        Value::Str(self.char_strs[b as usize])
    }

    /// Builds a string value: the pooled singleton when one exists for a
    /// short string, otherwise a fresh heap cell.
    pub fn make_str(&mut self, bytes: &[u8]) -> Value {
        if bytes.len() < MAX_CACHED_STR_LEN
            && let Some(id) = self.interns.lookup(bytes)
        {
            return Value::Str(id);
        }
        let id = self.heap.alloc(HeapData::Str(bytes.into()));
        Value::Ref(id)
    }

    pub(crate) fn is_func(&self, value: Value) -> bool {
        matches!(value, Value::Ref(id) if matches!(self.heap.get(id), HeapData::Func(_)))
    }

    /// The type name used in diagnostics; instances report their class.
    #[must_use]
    pub fn type_name(&self, value: Value) -> String {
        match value {
            Value::Null => Type::Null.to_string(),
            Value::Bool(_) => Type::Bool.to_string(),
            Value::Int(_) => Type::Int.to_string(),
            Value::Str(_) => Type::Str.to_string(),
            Value::Type(_) => Type::Type.to_string(),
            Value::Vm => Type::Vm.to_string(),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Str(_) => Type::Str.to_string(),
                HeapData::List(_) => Type::List.to_string(),
                HeapData::Dict(_) => Type::Dict.to_string(),
                HeapData::Iter(_) => Type::Iterator.to_string(),
                HeapData::Func(_) => Type::Func.to_string(),
                HeapData::Class(_) => Type::Type.to_string(),
                HeapData::Instance(instance) => {
                    let class = class::class_record(self, instance.class);
                    self.interns.display(class.name)
                }
            },
        }
    }

    /// The type descriptor of a value, as a value (`typeof` builtin).
    #[must_use]
    pub fn type_of_value(&self, value: Value) -> Value {
        match value {
            Value::Null => Value::Type(Type::Null),
            Value::Bool(_) => Value::Type(Type::Bool),
            Value::Int(_) => Value::Type(Type::Int),
            Value::Str(_) => Value::Type(Type::Str),
            Value::Type(_) => Value::Type(Type::Type),
            Value::Vm => Value::Type(Type::Vm),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Str(_) => Value::Type(Type::Str),
                HeapData::List(_) => Value::Type(Type::List),
                HeapData::Dict(_) => Value::Type(Type::Dict),
                HeapData::Iter(_) => Value::Type(Type::Iterator),
                HeapData::Func(_) => Value::Type(Type::Func),
                HeapData::Class(_) => Value::Type(Type::Type),
                HeapData::Instance(instance) => Value::Ref(instance.class),
            },
        }
    }

    /// Identity: singletons are identical when equal, heap values when
    /// they are the same cell.
    #[must_use]
    pub fn is_identical(&self, a: Value, b: Value) -> bool {
        a == b
    }

    // ---------------------------------------------------------------
    // Comparison
    // ---------------------------------------------------------------

    /// Three-way comparison through the receiver's type. Types without an
    /// ordering compare as equal only when identical.
    pub fn cmp(&mut self, a: Value, b: Value) -> RunResult<CmpResult> {
        match a {
            Value::Int(i) => Ok(match b {
                Value::Int(j) => CmpResult::from_ordering(i.cmp(&j)),
                _ => CmpResult::Ne,
            }),
            Value::Str(_) => Ok(self.str_cmp(a, b)),
            Value::Type(t) => Ok(match b {
                Value::Type(u) if t == u => CmpResult::Eq,
                _ => CmpResult::Ne,
            }),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Str(_) => Ok(self.str_cmp(a, b)),
                HeapData::Class(_) => Ok(match b {
                    Value::Ref(other) if other == id => CmpResult::Eq,
                    _ => CmpResult::Ne,
                }),
                HeapData::Instance(_) => class::instance_cmp(self, a, id, b),
                _ => Ok(self.identity_cmp(a, b)),
            },
            _ => Ok(self.identity_cmp(a, b)),
        }
    }

    fn identity_cmp(&self, a: Value, b: Value) -> CmpResult {
        if self.is_identical(a, b) {
            CmpResult::Eq
        } else {
            CmpResult::Ne
        }
    }

    fn str_cmp(&self, a: Value, b: Value) -> CmpResult {
        let Ok(a_bytes) = self.str_bytes(a) else {
            return CmpResult::Ne;
        };
        let Ok(b_bytes) = self.str_bytes(b) else {
            return CmpResult::Ne;
        };
        CmpResult::from_ordering(a_bytes.cmp(b_bytes))
    }

    // ---------------------------------------------------------------
    // Attribute dispatch
    // ---------------------------------------------------------------

    /// Routes a getter through the target's type; the hook for operators,
    /// method calls, and attribute access alike.
    pub fn get_attr(&mut self, target: Value, name: StrId) -> RunResult<()> {
        let name_buf: SmallVec<[u8; 24]> = SmallVec::from_slice(self.interns.get(name));
        let name_bytes = name_buf.as_slice();
        let handled = match target {
            Value::Null => false,
            Value::Bool(_) => types::boolean::getter(self, target, name, name_bytes)?,
            Value::Int(_) => types::int::getter(self, target, name, name_bytes)?,
            Value::Str(_) => types::str::getter(self, target, name, name_bytes)?,
            Value::Type(t) => types::type_obj::getter(self, t, name_bytes)?,
            Value::Vm => types::vm_obj::getter(self, name_bytes)?,
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Str(_) => types::str::getter(self, target, name, name_bytes)?,
                HeapData::List(_) => types::list::getter(self, target, id, name_bytes)?,
                HeapData::Dict(_) => types::dict::getter(self, target, id, name_bytes)?,
                HeapData::Iter(_) => types::iter::getter(self, target, id, name_bytes)?,
                HeapData::Func(_) => types::func::getter(self, id, name_bytes)?,
                HeapData::Class(_) => types::type_obj::class_value_getter(self, target, id, name, name_bytes)?,
                HeapData::Instance(_) => class::instance_getter(self, target, id, name, name_bytes)?,
            },
        };
        if handled {
            Ok(())
        } else {
            Err(RunError::name(format!(
                "Object of type '{}' has no getter '{}'",
                self.type_name(target),
                String::from_utf8_lossy(name_bytes)
            )))
        }
    }

    /// Routes a setter through the target's type.
    pub fn set_attr(&mut self, target: Value, name: StrId) -> RunResult<()> {
        let name_buf: SmallVec<[u8; 24]> = SmallVec::from_slice(self.interns.get(name));
        let name_bytes = name_buf.as_slice();
        let handled = match target {
            Value::Type(t) => types::type_obj::setter(self, t, name_bytes)?,
            Value::Vm => types::vm_obj::setter(self, name_bytes)?,
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Func(_) => types::func::setter(self, id, name_bytes)?,
                HeapData::Class(_) => types::type_obj::class_value_setter(self, target, id, name)?,
                HeapData::Instance(_) => class::instance_setter(self, target, id, name)?,
                _ => false,
            },
            _ => false,
        };
        if handled {
            Ok(())
        } else {
            Err(RunError::name(format!(
                "Object of type '{}' has no setter '{}'",
                self.type_name(target),
                String::from_utf8_lossy(name_bytes)
            )))
        }
    }

    /// Invokes a value: its `@` getter.
    pub fn call_value(&mut self, value: Value) -> RunResult<()> {
        self.get_attr(value, self.names.at)
    }

    /// Pops an iterable and leaves nothing: returns its iterator.
    pub(crate) fn pop_iter(&mut self) -> RunResult<Value> {
        let value = self.pop()?;
        self.get_attr(value, self.names.iter)?;
        self.pop()
    }

    /// Steps an iterator: `Some(value)` or `None` once exhausted.
    pub(crate) fn next_value(&mut self, iter: Value) -> RunResult<Option<Value>> {
        self.get_attr(iter, self.names.next)?;
        let more = self.pop()?;
        if self.to_bool(more) {
            Ok(Some(self.pop()?))
        } else {
            Ok(None)
        }
    }

    // ---------------------------------------------------------------
    // Printing
    // ---------------------------------------------------------------

    pub(crate) fn write_out(&mut self, bytes: &[u8]) {
        self.writer.write_bytes(bytes);
    }

    /// Prints a value to the output writer, honoring `__print__` hooks.
    pub fn print_value(&mut self, value: Value) -> RunResult<()> {
        match value {
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::List(list) => {
                    let elems = list.elems.clone();
                    self.write_out(b"[");
                    for (i, elem) in elems.iter().enumerate() {
                        if i > 0 {
                            self.write_out(b", ");
                        }
                        self.print_value(*elem)?;
                    }
                    self.write_out(b"]");
                    Ok(())
                }
                HeapData::Dict(dict) => {
                    let entries: Vec<_> = dict.entries().collect();
                    self.write_out(b"{");
                    for (i, (key, val)) in entries.iter().enumerate() {
                        if i > 0 {
                            self.write_out(b", ");
                        }
                        let mut key_bytes = self.interns.get(*key).to_vec();
                        key_bytes.extend_from_slice(b": ");
                        self.write_out(&key_bytes);
                        self.print_value(*val)?;
                    }
                    self.write_out(b"}");
                    Ok(())
                }
                HeapData::Instance(instance) => {
                    let class = class::class_record(self, instance.class);
                    if let Some(print_func) = self.heap.dict(class.getters).get(self.names.print) {
                        self.push(value)?;
                        self.call_value(print_func)
                    } else {
                        let repr = self.debug_repr(value);
                        self.write_out(repr.as_bytes());
                        Ok(())
                    }
                }
                _ => {
                    let repr = self.shallow_repr(value);
                    self.write_out(&repr);
                    Ok(())
                }
            },
            _ => {
                let repr = self.shallow_repr(value);
                self.write_out(&repr);
                Ok(())
            }
        }
    }

    /// Non-recursive printed form for values that need no dispatch.
    fn shallow_repr(&self, value: Value) -> Vec<u8> {
        let mut out = Vec::new();
        match value {
            Value::Null => out.extend_from_slice(b"null"),
            Value::Bool(b) => out.extend_from_slice(if b { b"true" } else { b"false" }),
            Value::Int(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Value::Str(id) => types::str::push_quoted(&mut out, self.interns.get(id)),
            Value::Type(t) => out.extend_from_slice(format!("<type '{t}'>").as_bytes()),
            Value::Vm => out.extend_from_slice(b"<'vm' object at 0x0>"),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Str(bytes) => types::str::push_quoted(&mut out, bytes),
                HeapData::Iter(iter) => {
                    out.extend_from_slice(format!("<{} iterator at 0x{:x}>", iter.kind.name(), id.index()).as_bytes());
                }
                HeapData::Func(func) => {
                    let what = match &func.kind {
                        types::FuncKind::Native(_) => "built-in function",
                        types::FuncKind::Block(code) if code.is_func => "function",
                        types::FuncKind::Block(_) => "code block",
                    };
                    let name = func
                        .name
                        .map_or_else(|| "(no name)".to_owned(), |n| self.interns.display(n));
                    out.extend_from_slice(format!("<{what} {name} at 0x{:x}>", id.index()).as_bytes());
                }
                HeapData::Class(class) => {
                    out.extend_from_slice(format!("<type '{}'>", self.interns.display(class.name)).as_bytes());
                }
                HeapData::Instance(instance) => {
                    let class = class::class_record(self, instance.class);
                    out.extend_from_slice(
                        format!("<'{}' object at 0x{:x}>", self.interns.display(class.name), id.index()).as_bytes(),
                    );
                }
                HeapData::List(_) | HeapData::Dict(_) => {
                    out.extend_from_slice(self.debug_repr(value).as_bytes());
                }
            },
        }
        out
    }

    /// Hook-free rendering for debug traces and host snapshots; instances
    /// always print the generic form.
    pub(crate) fn debug_repr(&self, value: Value) -> String {
        match value {
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::List(list) => {
                    let parts: Vec<_> = list.elems.iter().map(|e| self.debug_repr(*e)).collect();
                    format!("[{}]", parts.join(", "))
                }
                HeapData::Dict(dict) => {
                    let parts: Vec<_> = dict
                        .entries()
                        .map(|(k, v)| format!("{}: {}", self.interns.display(k), self.debug_repr(v)))
                        .collect();
                    format!("{{{}}}", parts.join(", "))
                }
                _ => String::from_utf8_lossy(&self.shallow_repr(value)).into_owned(),
            },
            _ => String::from_utf8_lossy(&self.shallow_repr(value)).into_owned(),
        }
    }

    // ---------------------------------------------------------------
    // Evaluation
    // ---------------------------------------------------------------

    /// Runs one code block.
    ///
    /// A function block (or an explicit `locals`) gets its own locals
    /// scope for the duration; the caller's scope is restored on every
    /// exit path.
    pub fn eval(&mut self, code: &Code, locals: Option<HeapId>) -> RunResult<()> {
        let swapped = if locals.is_some() || code.is_func {
            let scope = locals.unwrap_or_else(|| self.heap.alloc(HeapData::Dict(Dict::new())));
            Some(std::mem::replace(&mut self.locals, Some(scope)))
        } else {
            None
        };
        let result = self.eval_instrs(code);
        if let Some(previous) = swapped {
            self.locals = previous;
        }
        result
    }

    fn eval_instrs(&mut self, code: &Code) -> RunResult<()> {
        for &instr in &code.instrs {
            if self.flags.print_eval > 0 {
                eprintln!("{}", Code::render_instr(instr, &self.interns));
            }
            self.exec_instr(instr)?;
            if self.flags.print_stack > 0 {
                eprintln!("=== STACK:");
                for value in &self.stack {
                    eprintln!("{}", self.debug_repr(*value));
                }
                eprintln!("=== END STACK");
            }
        }
        Ok(())
    }

    fn exec_instr(&mut self, instr: Instr) -> RunResult<()> {
        match instr {
            Instr::LoadInt(i) => self.push(Value::Int(i)),
            Instr::LoadStr(id) => self.push(Value::Str(id)),
            Instr::LoadFunc(index) => {
                let cell = self.code_pool[index as usize];
                self.push(Value::Ref(cell))
            }
            Instr::LoadGlobal(name) | Instr::CallGlobal(name) => {
                let Some(value) = self.heap.dict(self.globals).get(name) else {
                    return Err(RunError::name(format!(
                        "Global variable not found: {}",
                        self.interns.display(name)
                    )));
                };
                if matches!(instr, Instr::CallGlobal(_)) {
                    self.call_value(value)
                } else {
                    self.push(value)
                }
            }
            Instr::LoadLocal(name) | Instr::CallLocal(name) => {
                let Some(scope) = self.locals else {
                    return Err(RunError::name(format!(
                        "Tried to use local variable '{}', but there are no locals",
                        self.interns.display(name)
                    )));
                };
                let Some(value) = self.heap.dict(scope).get(name) else {
                    return Err(RunError::name(format!(
                        "Local variable not found: {}",
                        self.interns.display(name)
                    )));
                };
                if matches!(instr, Instr::CallLocal(_)) {
                    self.call_value(value)
                } else {
                    self.push(value)
                }
            }
            Instr::StoreGlobal(name) => {
                let value = self.pop()?;
                self.heap.dict_mut(self.globals).set(name, value);
                Ok(())
            }
            Instr::StoreLocal(name) => {
                let Some(scope) = self.locals else {
                    return Err(RunError::name(format!(
                        "Tried to store to local variable '{}', but there are no locals",
                        self.interns.display(name)
                    )));
                };
                let value = self.pop()?;
                self.heap.dict_mut(scope).set(name, value);
                Ok(())
            }
            Instr::Getter(name) => {
                let target = self.pop()?;
                self.get_attr(target, name)
            }
            Instr::Setter(name) => {
                let target = self.pop()?;
                self.set_attr(target, name)
            }
            Instr::RenameFunc(name) => {
                let target = self.top()?;
                if !self.is_func(target) {
                    return Err(self.rename_error(target));
                }
                let Value::Ref(id) = target else { unreachable!() };
                if let HeapData::Func(func) = self.heap.get_mut(id) {
                    func.name = Some(name);
                }
                Ok(())
            }
            _ => {
                let op = instr.as_op().expect("non-operand instruction is an operator");
                self.exec_op(op)
            }
        }
    }

    fn rename_error(&self, value: Value) -> RunError {
        RunError::type_error(format!("Can't use '$' with object of type '{}'", self.type_name(value)))
    }

    fn exec_op(&mut self, op: Op) -> RunResult<()> {
        if op.is_cmp() {
            let other = self.pop()?;
            let receiver = self.pop()?;
            let cmp = self.cmp(receiver, other)?;
            let result = match op {
                Op::Eq => cmp == CmpResult::Eq,
                Op::Ne => cmp != CmpResult::Eq,
                Op::Lt => cmp == CmpResult::Lt,
                Op::Le => cmp == CmpResult::Lt || cmp == CmpResult::Eq,
                Op::Gt => cmp == CmpResult::Gt,
                Op::Ge => cmp == CmpResult::Gt || cmp == CmpResult::Eq,
                _ => unreachable!(),
            };
            self.push(Value::Bool(result))
        } else {
            // The receiver sits under the operator's other arguments;
            // pull it out and let its getter consume the rest.
            let n_args = op.arity() - 1;
            let receiver = self.pluck(n_args)?;
            self.get_attr(receiver, self.op_names[op as usize])
        }
    }

    // ---------------------------------------------------------------
    // Compile-and-run entry points
    // ---------------------------------------------------------------

    /// Adds a closed block to the global code pool, wrapping it in the
    /// shared func cell `LOAD_FUNC` will push.
    pub(crate) fn push_code(&mut self, code: Rc<Code>) -> u32 {
        let cell = self.heap.alloc(HeapData::Func(Func::block(None, code)));
        self.code_pool.push(cell);
        (self.code_pool.len() - 1) as u32
    }

    /// Compiles and evaluates complete source text.
    pub fn eval_text(&mut self, text: &[u8], filename: &str) -> RunResult<()> {
        let mut compiler = Compiler::new(filename);
        compiler.compile(self, text)?;
        let Some(code) = compiler.pop_runnable_code(self) else {
            return Err(RunError::parse("Code evaluated from text had an unterminated block"));
        };
        self.eval(&code, None)
    }

    /// Reads and evaluates a source file.
    pub fn include(&mut self, path: &str) -> RunResult<()> {
        let text = std::fs::read(path)
            .map_err(|err| RunError::resource(format!("Could not open file '{path}': {err}")))?;
        let mut compiler = Compiler::new(path);
        compiler.compile(self, &text)?;
        let Some(code) = compiler.pop_runnable_code(self) else {
            return Err(RunError::parse(format!(
                "Code included from '{path}' had an unterminated block"
            )));
        };
        self.eval(&code, None)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
