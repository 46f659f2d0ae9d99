//! User classes and their instances.
//!
//! A class is a type descriptor carrying five dicts: plain class
//! attributes, class-level getters/setters (dispatched with the class on
//! the stack), and instance-level getters/setters (dispatched with the
//! instance on the stack). Attribute lookup chains attrs, then getters,
//! then (for instances) class attrs.
//!
//! The dicts are heap cells, so the `__getters__`-style views share
//! storage with the class: installing into a view is installing into the
//! class.

use crate::{
    error::RunResult,
    heap::{HeapData, HeapId},
    intern::StrId,
    types::Dict,
    value::{CmpResult, Value},
    vm::Vm,
};

/// The class descriptor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Class {
    pub name: StrId,
    pub class_attrs: HeapId,
    pub class_getters: HeapId,
    pub class_setters: HeapId,
    pub getters: HeapId,
    pub setters: HeapId,
}

/// One object of a user class: its class and its own attribute dict.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Instance {
    pub class: HeapId,
    pub attrs: HeapId,
}

/// Allocates a fresh class with empty dicts.
pub(crate) fn new_class(vm: &mut Vm, name: StrId) -> HeapId {
    let class = Class {
        name,
        class_attrs: vm.heap.alloc(HeapData::Dict(Dict::new())),
        class_getters: vm.heap.alloc(HeapData::Dict(Dict::new())),
        class_setters: vm.heap.alloc(HeapData::Dict(Dict::new())),
        getters: vm.heap.alloc(HeapData::Dict(Dict::new())),
        setters: vm.heap.alloc(HeapData::Dict(Dict::new())),
    };
    vm.heap.alloc(HeapData::Class(class))
}

/// Clones a class under a new name; the five dicts are copied, so the two
/// classes evolve independently from here.
pub(crate) fn copy_class(vm: &mut Vm, source: Class, name: StrId) -> HeapId {
    let copy_dict = |vm: &mut Vm, id: HeapId| {
        let copy = vm.heap.dict(id).clone();
        vm.heap.alloc(HeapData::Dict(copy))
    };
    let class = Class {
        name,
        class_attrs: copy_dict(vm, source.class_attrs),
        class_getters: copy_dict(vm, source.class_getters),
        class_setters: copy_dict(vm, source.class_setters),
        getters: copy_dict(vm, source.getters),
        setters: copy_dict(vm, source.setters),
    };
    vm.heap.alloc(HeapData::Class(class))
}

pub(crate) fn class_record(vm: &Vm, id: HeapId) -> Class {
    let HeapData::Class(class) = vm.heap.get(id) else {
        unreachable!("class dispatch on non-class cell");
    };
    *class
}

pub(crate) fn instance_record(vm: &Vm, id: HeapId) -> Instance {
    let HeapData::Instance(instance) = vm.heap.get(id) else {
        unreachable!("instance dispatch on non-instance cell");
    };
    *instance
}

/// Class-level attribute lookup: the `GETTER` dispatch when the target is
/// the class value itself.
pub(crate) fn class_getter(
    vm: &mut Vm,
    self_value: Value,
    id: HeapId,
    name_id: StrId,
    name: &[u8],
) -> RunResult<bool> {
    let class = class_record(vm, id);
    match name {
        b"@" => {
            // Instantiate: fresh attribute dict, then __init__ if defined,
            // which sees the new instance on top of the stack.
            let attrs = vm.heap.alloc(HeapData::Dict(Dict::new()));
            let instance = vm.heap.alloc(HeapData::Instance(Instance { class: id, attrs }));
            vm.push(Value::Ref(instance))?;
            if let Some(init) = vm.heap.dict(class.getters).get(vm.names.init) {
                vm.call_value(init)?;
            }
        }
        b"copy" => {
            let name_value = vm.pop()?;
            let new_name = vm.to_str_id(name_value)?;
            let copy = copy_class(vm, class, new_name);
            vm.push(Value::Ref(copy))?;
        }
        b"__dict__" => vm.push(Value::Ref(class.class_attrs))?,
        b"__getters__" => vm.push(Value::Ref(class.getters))?,
        b"__setters__" => vm.push(Value::Ref(class.setters))?,
        b"__class_getters__" => vm.push(Value::Ref(class.class_getters))?,
        b"__class_setters__" => vm.push(Value::Ref(class.class_setters))?,
        b"set_getter" | b"set_setter" | b"set_class_getter" | b"set_class_setter" => {
            let dict_id = match name {
                b"set_getter" => class.getters,
                b"set_setter" => class.setters,
                b"set_class_getter" => class.class_getters,
                _ => class.class_setters,
            };
            // The installed function is keyed by its own `.name`.
            let func = vm.pop()?;
            vm.get_attr(func, vm.names.name)?;
            let key_value = vm.pop()?;
            let key = vm.to_str_id(key_value)?;
            vm.heap.dict_mut(dict_id).set(key, func);
        }
        _ => {
            if let Some(value) = vm.heap.dict(class.class_attrs).get(name_id) {
                vm.push(value)?;
            } else if let Some(getter) = vm.heap.dict(class.class_getters).get(name_id) {
                vm.push(self_value)?;
                vm.call_value(getter)?;
            } else {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Class-level setter: a defined class setter runs with the class pushed;
/// otherwise the popped value is stored as a class attribute.
pub(crate) fn class_setter(vm: &mut Vm, self_value: Value, id: HeapId, name_id: StrId) -> RunResult<bool> {
    let class = class_record(vm, id);
    if let Some(setter) = vm.heap.dict(class.class_setters).get(name_id) {
        vm.push(self_value)?;
        vm.call_value(setter)?;
    } else {
        let value = vm.pop()?;
        vm.heap.dict_mut(class.class_attrs).set(name_id, value);
    }
    Ok(true)
}

/// Instance-level attribute lookup: own attrs, then instance getters, then
/// class attrs.
pub(crate) fn instance_getter(
    vm: &mut Vm,
    self_value: Value,
    id: HeapId,
    name_id: StrId,
    name: &[u8],
) -> RunResult<bool> {
    let instance = instance_record(vm, id);
    if name == b"__dict__" {
        vm.push(Value::Ref(instance.attrs))?;
        return Ok(true);
    }
    let class = class_record(vm, instance.class);
    if let Some(value) = vm.heap.dict(instance.attrs).get(name_id) {
        vm.push(value)?;
    } else if let Some(getter) = vm.heap.dict(class.getters).get(name_id) {
        vm.push(self_value)?;
        vm.call_value(getter)?;
    } else if let Some(value) = vm.heap.dict(class.class_attrs).get(name_id) {
        vm.push(value)?;
    } else {
        return Ok(false);
    }
    Ok(true)
}

/// Instance-level setter: a defined setter runs with the instance pushed;
/// otherwise the popped value is stored as an instance attribute.
pub(crate) fn instance_setter(vm: &mut Vm, self_value: Value, id: HeapId, name_id: StrId) -> RunResult<bool> {
    let instance = instance_record(vm, id);
    let class = class_record(vm, instance.class);
    if let Some(setter) = vm.heap.dict(class.setters).get(name_id) {
        vm.push(self_value)?;
        vm.call_value(setter)?;
    } else {
        let value = vm.pop()?;
        vm.heap.dict_mut(instance.attrs).set(name_id, value);
    }
    Ok(true)
}

/// Comparison for instances: `__cmp__` returns an int whose sign decides,
/// null means "not equal"; without `__cmp__`, identity.
pub(crate) fn instance_cmp(vm: &mut Vm, self_value: Value, id: HeapId, other: Value) -> RunResult<CmpResult> {
    let instance = instance_record(vm, id);
    let class = class_record(vm, instance.class);
    let Some(cmp_func) = vm.heap.dict(class.getters).get(vm.names.cmp) else {
        return Ok(if self_value == other { CmpResult::Eq } else { CmpResult::Ne });
    };
    vm.push(self_value)?;
    vm.push(other)?;
    vm.call_value(cmp_func)?;
    let result = vm.pop()?;
    if result == Value::Null {
        return Ok(CmpResult::Ne);
    }
    let i = vm.to_int(result)?;
    Ok(CmpResult::from_ordering(i.cmp(&0)))
}
