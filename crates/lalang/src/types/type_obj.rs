//! Dispatch on type values themselves.
//!
//! When the value under a `GETTER`/`SETTER` is itself a type (a builtin
//! descriptor like `list`, or a user class), dispatch goes through the
//! type-level hooks, so `list .new`, `dict .build`, and `Box @` all work.
//!
//! Types that carry their own type-getter (list, dict, the vm type, user
//! classes) answer only what that hook knows; the generic `.name` fallback
//! exists only for the hookless builtin types.

use crate::{
    error::{RunError, RunResult},
    heap::HeapId,
    intern::StrId,
    types::{class, dict, iter, list},
    value::{Type, Value},
    vm::Vm,
};

pub(crate) fn getter(vm: &mut Vm, ty: Type, name: &[u8]) -> RunResult<bool> {
    match ty {
        Type::List => list::type_getter(vm, name),
        Type::Dict => dict::type_getter(vm, name),
        Type::Vm => {
            if name == b"@" {
                vm.push(Value::Vm)?;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        Type::Iterator => {
            if iter::type_getter(vm, name)? {
                Ok(true)
            } else {
                fallback_getter(vm, ty, name)
            }
        }
        _ => fallback_getter(vm, ty, name),
    }
}

/// The hookless path: `.name`, or a type-level NameError.
fn fallback_getter(vm: &mut Vm, ty: Type, name: &[u8]) -> RunResult<bool> {
    if name == b"name" {
        let value = vm.make_str(ty.to_string().as_bytes());
        vm.push(value)?;
        Ok(true)
    } else {
        Err(RunError::name(format!(
            "Type '{ty}' has no getter '{}'",
            String::from_utf8_lossy(name)
        )))
    }
}

/// Getter dispatch for a user-class value.
pub(crate) fn class_value_getter(
    vm: &mut Vm,
    self_value: Value,
    id: HeapId,
    name_id: StrId,
    name: &[u8],
) -> RunResult<bool> {
    class::class_getter(vm, self_value, id, name_id, name)
}

pub(crate) fn setter(_vm: &mut Vm, ty: Type, name: &[u8]) -> RunResult<bool> {
    Err(RunError::name(format!(
        "Type '{ty}' has no setter '{}'",
        String::from_utf8_lossy(name)
    )))
}

/// Setter dispatch for a user-class value.
pub(crate) fn class_value_setter(vm: &mut Vm, self_value: Value, id: HeapId, name_id: StrId) -> RunResult<bool> {
    class::class_setter(vm, self_value, id, name_id)
}
