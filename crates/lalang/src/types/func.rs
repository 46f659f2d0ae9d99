//! Function values.
//!
//! A func either wraps a native function or a compiled code block, plus an
//! optional bound stack prefix (values pushed before the call, closing
//! over data) and an optional bound locals dict (closing over names).
//! Calling with bound locals runs on a *copy*, so mutations inside the
//! call never leak back into the function value.

use std::rc::Rc;

use crate::{
    code::Code,
    error::{RunError, RunResult},
    heap::{HeapData, HeapId},
    intern::StrId,
    types::{Dict, List},
    value::Value,
    vm::Vm,
};

/// A builtin implemented in the host language.
pub(crate) type NativeFn = fn(&mut Vm) -> RunResult<()>;

/// What a func runs when called.
#[derive(Debug, Clone)]
pub(crate) enum FuncKind {
    Native(NativeFn),
    Block(Rc<Code>),
}

/// The function record.
#[derive(Debug, Clone)]
pub(crate) struct Func {
    pub name: Option<StrId>,
    pub kind: FuncKind,
    /// Bound stack prefix, shared by reference with any list value
    /// obtained from `.stack`.
    pub stack: Option<HeapId>,
    /// Bound locals, shared by reference with any dict value obtained
    /// from `.locals`.
    pub locals: Option<HeapId>,
}

impl Func {
    pub fn native(name: Option<StrId>, f: NativeFn) -> Self {
        Self {
            name,
            kind: FuncKind::Native(f),
            stack: None,
            locals: None,
        }
    }

    pub fn block(name: Option<StrId>, code: Rc<Code>) -> Self {
        Self {
            name,
            kind: FuncKind::Block(code),
            stack: None,
            locals: None,
        }
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        matches!(self.kind, FuncKind::Native(_))
    }
}

fn clone_record(vm: &Vm, id: HeapId) -> Func {
    let HeapData::Func(func) = vm.heap.get(id) else {
        unreachable!("func getter dispatched on non-func");
    };
    func.clone()
}

fn display_name(vm: &Vm, func: &Func) -> String {
    func.name
        .map_or_else(|| "(no name)".to_owned(), |id| vm.interns.display(id))
}

/// Pushes the bound stack prefix back-to-front, so the first bound element
/// ends up on top.
fn push_bound_stack(vm: &mut Vm, stack: Option<HeapId>) -> RunResult<()> {
    if let Some(stack_id) = stack {
        let elems = vm.heap.list(stack_id).elems.clone();
        for value in elems.iter().rev() {
            vm.push(*value)?;
        }
    }
    Ok(())
}

/// Invokes the func: the `@` getter.
pub(crate) fn call(vm: &mut Vm, id: HeapId) -> RunResult<()> {
    let func = clone_record(vm, id);
    if func.is_native() && func.locals.is_some() {
        return Err(RunError::type_error(format!(
            "Tried to call a native function ({}) with locals",
            display_name(vm, &func)
        )));
    }
    push_bound_stack(vm, func.stack)?;
    match func.kind {
        FuncKind::Native(f) => f(vm),
        FuncKind::Block(code) => {
            let locals_id = func.locals.map(|bound| {
                let copy = vm.heap.dict(bound).clone();
                vm.heap.alloc(HeapData::Dict(copy))
            });
            vm.eval(&code, locals_id)
        }
    }
}

pub(crate) fn getter(vm: &mut Vm, id: HeapId, name: &[u8]) -> RunResult<bool> {
    match name {
        b"@" => call(vm, id)?,
        b"to_dict" => {
            // Run the function and return its final locals as a dict: the
            // closure-as-record trick.
            let func = clone_record(vm, id);
            let FuncKind::Block(code) = func.kind else {
                return Err(RunError::type_error(format!(
                    "Tried to call a native function ({}) with locals",
                    display_name(vm, &func)
                )));
            };
            push_bound_stack(vm, func.stack)?;
            let locals = match func.locals {
                Some(bound) => vm.heap.dict(bound).clone(),
                None => Dict::new(),
            };
            let locals_id = vm.heap.alloc(HeapData::Dict(locals));
            vm.eval(&code, Some(locals_id))?;
            vm.push(Value::Ref(locals_id))?;
        }
        b"name" => {
            let func = clone_record(vm, id);
            let value = func.name.map_or(Value::Null, Value::Str);
            vm.push(value)?;
        }
        b"copy" => {
            let mut func = clone_record(vm, id);
            if let Some(stack_id) = func.stack {
                let copy = vm.heap.list(stack_id).clone();
                func.stack = Some(vm.heap.alloc(HeapData::List(copy)));
            }
            if let Some(locals_id) = func.locals {
                let copy = vm.heap.dict(locals_id).clone();
                func.locals = Some(vm.heap.alloc(HeapData::Dict(copy)));
            }
            let copy_id = vm.heap.alloc(HeapData::Func(func));
            vm.push(Value::Ref(copy_id))?;
        }
        b"stack" => {
            let func = clone_record(vm, id);
            let value = func.stack.map_or(Value::Null, Value::Ref);
            vm.push(value)?;
        }
        b"locals" => {
            let func = clone_record(vm, id);
            let value = func.locals.map_or(Value::Null, Value::Ref);
            vm.push(value)?;
        }
        b"push_stack" => {
            let value = vm.pop()?;
            let stack_id = match clone_record(vm, id).stack {
                Some(stack_id) => stack_id,
                None => {
                    let stack_id = vm.heap.alloc(HeapData::List(List::new()));
                    let HeapData::Func(func) = vm.heap.get_mut(id) else {
                        unreachable!();
                    };
                    func.stack = Some(stack_id);
                    stack_id
                }
            };
            vm.heap.list_mut(stack_id).elems.push(value);
        }
        b"set_local" => {
            let key_value = vm.pop()?;
            let key = vm.to_str_id(key_value)?;
            let value = vm.pop()?;
            let locals_id = match clone_record(vm, id).locals {
                Some(locals_id) => locals_id,
                None => {
                    let locals_id = vm.heap.alloc(HeapData::Dict(Dict::new()));
                    let HeapData::Func(func) = vm.heap.get_mut(id) else {
                        unreachable!();
                    };
                    func.locals = Some(locals_id);
                    locals_id
                }
            };
            vm.heap.dict_mut(locals_id).set(key, value);
        }
        b"print_code" => {
            let func = clone_record(vm, id);
            match func.kind {
                FuncKind::Native(_) => vm.write_out(b"Can't print code of built-in function!\n"),
                FuncKind::Block(code) => {
                    let rendered = code.render(&vm.interns, 0);
                    vm.write_out(rendered.as_bytes());
                }
            }
        }
        _ => return Ok(false),
    }
    Ok(true)
}

pub(crate) fn setter(vm: &mut Vm, id: HeapId, name: &[u8]) -> RunResult<bool> {
    match name {
        b"name" => {
            let name_value = vm.pop()?;
            let name_id = vm.to_str_id(name_value)?;
            let HeapData::Func(func) = vm.heap.get_mut(id) else {
                unreachable!("func setter dispatched on non-func");
            };
            func.name = Some(name_id);
        }
        b"stack" => {
            let value = vm.pop()?;
            let stack = match value {
                Value::Null => None,
                Value::Ref(list_id) if matches!(vm.heap.get(list_id), HeapData::List(_)) => Some(list_id),
                other => {
                    let func = clone_record(vm, id);
                    return Err(RunError::type_error(format!(
                        "Tried to assign '{}' object to stack of func: {}",
                        vm.type_name(other),
                        display_name(vm, &func)
                    )));
                }
            };
            let HeapData::Func(func) = vm.heap.get_mut(id) else {
                unreachable!();
            };
            func.stack = stack;
        }
        b"locals" => {
            let value = vm.pop()?;
            let locals = match value {
                Value::Null => None,
                Value::Ref(dict_id) if matches!(vm.heap.get(dict_id), HeapData::Dict(_)) => Some(dict_id),
                other => {
                    let func = clone_record(vm, id);
                    return Err(RunError::type_error(format!(
                        "Tried to assign '{}' object to locals of func: {}",
                        vm.type_name(other),
                        display_name(vm, &func)
                    )));
                }
            };
            let HeapData::Func(func) = vm.heap.get_mut(id) else {
                unreachable!();
            };
            func.locals = locals;
        }
        _ => return Ok(false),
    }
    Ok(true)
}
