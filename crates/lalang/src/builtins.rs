//! Native builtin functions, registered as globals at VM creation.
//!
//! Control flow (`if`, `while`, `for`) lives here rather than in the
//! instruction set: each builtin pops its operands and calls back into the
//! VM's dispatch, reentering `eval` for user code. Callee errors propagate
//! straight through.

use std::io::{BufRead, Write as _};

use crate::{
    error::{RunError, RunResult},
    heap::HeapData,
    types::{Iter, class, dict},
    value::Value,
    vm::Vm,
};

pub(crate) fn install(vm: &mut Vm) {
    vm.set_builtin(b"is", builtin_is);
    vm.set_builtin(b"if", builtin_if);
    vm.set_builtin(b"ifelse", builtin_ifelse);
    vm.set_builtin(b"while", builtin_while);
    vm.set_builtin(b"iter", builtin_iter);
    vm.set_builtin(b"next", builtin_next);
    vm.set_builtin(b"for", builtin_for);
    vm.set_builtin(b"range", builtin_range);
    vm.set_builtin(b"pair", builtin_pair);
    vm.set_builtin(b"globals", builtin_globals);
    vm.set_builtin(b"locals", builtin_locals);
    vm.set_builtin(b"typeof", builtin_typeof);
    vm.set_builtin(b"print", builtin_print);
    vm.set_builtin(b"dup", builtin_dup);
    vm.set_builtin(b"drop", builtin_drop);
    vm.set_builtin(b"swap", builtin_swap);
    vm.set_builtin(b"get", builtin_get);
    vm.set_builtin(b"set", builtin_set);
    vm.set_builtin(b"clear", builtin_clear);
    vm.set_builtin(b"print_stack", builtin_print_stack);
    vm.set_builtin(b"readline", builtin_readline);
    vm.set_builtin(b"readfile", builtin_readfile);
    vm.set_builtin(b"eval", builtin_eval);
    vm.set_builtin(b"error", builtin_error);
    vm.set_builtin(b"class", builtin_class);
}

/// `a b @is` - referential identity.
fn builtin_is(vm: &mut Vm) -> RunResult<()> {
    let a = vm.pop()?;
    let b = vm.pop()?;
    let identical = vm.is_identical(a, b);
    vm.push(Value::Bool(identical))
}

/// `cond body @if` - run `body` when `cond` is truthy.
fn builtin_if(vm: &mut Vm) -> RunResult<()> {
    let body = vm.pop()?;
    let cond = vm.pop()?;
    if vm.to_bool(cond) {
        vm.call_value(body)?;
    }
    Ok(())
}

/// `cond then else @ifelse` - run one branch or the other.
fn builtin_ifelse(vm: &mut Vm) -> RunResult<()> {
    let else_body = vm.pop()?;
    let then_body = vm.pop()?;
    let cond = vm.pop()?;
    if vm.to_bool(cond) {
        vm.call_value(then_body)
    } else {
        vm.call_value(else_body)
    }
}

/// `cond_func body @while` - call `cond_func` before each round; run
/// `body` while it yields truthy.
fn builtin_while(vm: &mut Vm) -> RunResult<()> {
    let body = vm.pop()?;
    let cond_func = vm.pop()?;
    loop {
        vm.call_value(cond_func)?;
        let cond = vm.pop()?;
        if !vm.to_bool(cond) {
            return Ok(());
        }
        vm.call_value(body)?;
    }
}

/// `x @iter` - push `x`'s iterator.
fn builtin_iter(vm: &mut Vm) -> RunResult<()> {
    let value = vm.pop()?;
    vm.get_attr(value, vm.names.iter)
}

/// `it @next` - step an iterator: pushes (value, true) or (false).
fn builtin_next(vm: &mut Vm) -> RunResult<()> {
    let value = vm.pop()?;
    vm.get_attr(value, vm.names.next)
}

/// `body iterable @for` - push each yielded value and run `body` on it.
fn builtin_for(vm: &mut Vm) -> RunResult<()> {
    let iterable = vm.pop()?;
    let body = vm.pop()?;
    vm.get_attr(iterable, vm.names.iter)?;
    let iter = vm.pop()?;
    while let Some(value) = vm.next_value(iter)? {
        vm.push(value)?;
        vm.call_value(body)?;
    }
    Ok(())
}

/// `start end @range` - iterator over [start, end).
fn builtin_range(vm: &mut Vm) -> RunResult<()> {
    let end_value = vm.pop()?;
    let end = vm.to_int(end_value)?;
    let start_value = vm.pop()?;
    let start = vm.to_int(start_value)?;
    let iter = Iter::new_range(start, end);
    let id = vm.heap.alloc(HeapData::Iter(iter));
    vm.push(Value::Ref(id))
}

/// `a b @pair` - two-element list.
fn builtin_pair(vm: &mut Vm) -> RunResult<()> {
    let second = vm.pop()?;
    let first = vm.pop()?;
    let pair = dict::make_pair(vm, first, second);
    vm.push(pair)
}

/// `@globals` - the globals dict itself, not a copy.
fn builtin_globals(vm: &mut Vm) -> RunResult<()> {
    let globals = vm.globals_id();
    vm.push(Value::Ref(globals))
}

/// `@locals` - the current locals dict, or null outside any scope.
fn builtin_locals(vm: &mut Vm) -> RunResult<()> {
    let value = vm.locals_id().map_or(Value::Null, Value::Ref);
    vm.push(value)
}

/// `x @typeof` - the value's type descriptor.
fn builtin_typeof(vm: &mut Vm) -> RunResult<()> {
    let value = vm.pop()?;
    let ty = vm.type_of_value(value);
    vm.push(ty)
}

/// `x @print` - print with a trailing newline.
fn builtin_print(vm: &mut Vm) -> RunResult<()> {
    let value = vm.pop()?;
    vm.print_value(value)?;
    vm.write_out(b"\n");
    Ok(())
}

fn builtin_dup(vm: &mut Vm) -> RunResult<()> {
    let top = vm.top()?;
    vm.push(top)
}

fn builtin_drop(vm: &mut Vm) -> RunResult<()> {
    vm.pop()?;
    Ok(())
}

fn builtin_swap(vm: &mut Vm) -> RunResult<()> {
    let y = vm.pop()?;
    let x = vm.pop()?;
    vm.push(y)?;
    vm.push(x)
}

/// `i @get` - copy the value `i` entries below the top.
fn builtin_get(vm: &mut Vm) -> RunResult<()> {
    let index_value = vm.pop()?;
    let i = vm.to_int(index_value)?;
    if i < 0 {
        return Err(RunError::stack(format!(
            "Can't get at index {i} from stack of size {}",
            vm.stack_len()
        )));
    }
    let value = vm.stack_get(i as usize)?;
    vm.push(value)
}

/// `value i @set` - replace the value `i` entries below the top.
fn builtin_set(vm: &mut Vm) -> RunResult<()> {
    let index_value = vm.pop()?;
    let i = vm.to_int(index_value)?;
    let value = vm.pop()?;
    if i < 0 {
        return Err(RunError::stack(format!(
            "Can't set at index {i} in stack of size {}",
            vm.stack_len()
        )));
    }
    vm.stack_set(i as usize, value)
}

fn builtin_clear(vm: &mut Vm) -> RunResult<()> {
    vm.clear_stack();
    Ok(())
}

/// `@print_stack` - print the whole stack, bottom to top.
fn builtin_print_stack(vm: &mut Vm) -> RunResult<()> {
    let values: Vec<Value> = vm.stack_values().to_vec();
    for value in values {
        vm.print_value(value)?;
        vm.write_out(b"\n");
    }
    Ok(())
}

/// `@readline` - one line from stdin, trailing newline included.
fn builtin_readline(vm: &mut Vm) -> RunResult<()> {
    let mut line = Vec::new();
    let mut stdin = std::io::stdin().lock();
    stdin
        .read_until(b'\n', &mut line)
        .map_err(|err| RunError::resource(format!("Error getting line from stdin: {err}")))?;
    let _ = std::io::stdout().flush();
    let value = vm.make_str(&line);
    vm.push(value)
}

/// `filename @readfile` - file contents, or null when the file does not
/// exist.
fn builtin_readfile(vm: &mut Vm) -> RunResult<()> {
    let filename_value = vm.pop()?;
    let filename = vm.to_str_bytes(filename_value)?;
    let filename = String::from_utf8_lossy(&filename).into_owned();
    match std::fs::read(&filename) {
        Ok(text) => {
            let value = vm.make_str(&text);
            vm.push(value)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => vm.push(Value::Null),
        Err(err) => Err(RunError::resource(format!("Could not open file '{filename}': {err}"))),
    }
}

/// `text @eval` - compile and run source text; the metaprogramming hook.
fn builtin_eval(vm: &mut Vm) -> RunResult<()> {
    let text_value = vm.pop()?;
    let text = vm.to_str_bytes(text_value)?;
    vm.eval_text(&text, "<eval>")
}

/// `msg @error` - abort with a user diagnostic.
fn builtin_error(vm: &mut Vm) -> RunResult<()> {
    let value = vm.pop()?;
    let message = match vm.str_bytes(value) {
        Ok(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Err(_) => vm.debug_repr(value),
    };
    Err(RunError::user(message))
}

/// `name @class` - a fresh user class.
fn builtin_class(vm: &mut Vm) -> RunResult<()> {
    let name_value = vm.pop()?;
    let name = vm.to_str_id(name_value)?;
    let id = class::new_class(vm, name);
    vm.push(Value::Ref(id))
}
