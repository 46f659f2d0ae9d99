//! The dict type: an insertion-ordered mapping from interned names to
//! values.
//!
//! Storage is a linear array of (name, value) entries; lookup is O(n).
//! Dicts stay small in practice (globals, locals, class and instance
//! attribute tables), and the linear form keeps insertion order for free.

use crate::{
    error::{RunError, RunResult},
    heap::{HeapData, HeapId},
    intern::StrId,
    types::{IterKind, List},
    value::Value,
    vm::Vm,
};

/// Backing storage of a dict cell.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dict {
    entries: Vec<(StrId, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, name: StrId) -> Option<Value> {
        self.entries.iter().find(|(key, _)| *key == name).map(|(_, value)| *value)
    }

    /// Inserts or replaces, keeping first-insertion order.
    pub fn set(&mut self, name: StrId, value: Value) {
        for (key, slot) in &mut self.entries {
            if *key == name {
                *slot = value;
                return;
            }
        }
        self.entries.push((name, value));
    }

    pub fn update(&mut self, other: &Self) {
        for &(name, value) in &other.entries {
            self.set(name, value);
        }
    }

    #[must_use]
    pub fn entry(&self, i: usize) -> Option<(StrId, Value)> {
        self.entries.get(i).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (StrId, Value)> + '_ {
        self.entries.iter().copied()
    }
}

pub(crate) fn getter(vm: &mut Vm, self_value: Value, id: HeapId, name: &[u8]) -> RunResult<bool> {
    match name {
        b"len" => {
            let len = vm.heap.dict(id).len();
            vm.push(Value::Int(len as i64))?;
        }
        b"," => {
            let pair_value = vm.pop()?;
            let (key_value, value) = vm.to_pair(pair_value)?;
            let key = vm.to_str_id(key_value)?;
            vm.heap.dict_mut(id).set(key, value);
            vm.push(self_value)?;
        }
        b"__iter__" | b"keys" | b"values" | b"items" => {
            let len = vm.heap.dict(id).len();
            let kind = match name {
                b"values" => IterKind::DictValues(id),
                b"items" => IterKind::DictItems(id),
                _ => IterKind::DictKeys(id),
            };
            let iter = crate::types::Iter::new(kind, len);
            let iter_id = vm.heap.alloc(HeapData::Iter(iter));
            vm.push(Value::Ref(iter_id))?;
        }
        b"copy" => {
            let copy = vm.heap.dict(id).clone();
            let copy_id = vm.heap.alloc(HeapData::Dict(copy));
            vm.push(Value::Ref(copy_id))?;
        }
        b"update" => {
            let other_value = vm.pop()?;
            let Value::Ref(other_id) = other_value else {
                return Err(update_type_error(vm, other_value));
            };
            let HeapData::Dict(other) = vm.heap.get(other_id) else {
                return Err(update_type_error(vm, other_value));
            };
            let other = other.clone();
            vm.heap.dict_mut(id).update(&other);
        }
        b"get_key" | b"get_value" | b"get_item" => {
            // Index-based access, useful for manual iteration.
            let index_value = vm.pop()?;
            let i = vm.to_int(index_value)?;
            let dict = vm.heap.dict(id);
            if i < 0 || i >= dict.len() as i64 {
                return Err(RunError::index(format!(
                    "Index {i} out of bounds for dict of size {}",
                    dict.len()
                )));
            }
            let (key, value) = dict.entry(i as usize).expect("bounds checked");
            match name {
                b"get_key" => vm.push(Value::Str(key))?,
                b"get_value" => vm.push(value)?,
                _ => {
                    vm.push(value)?;
                    vm.push(Value::Str(key))?;
                }
            }
        }
        b"has" => {
            let key_value = vm.pop()?;
            let key = vm.to_str_id(key_value)?;
            let found = vm.heap.dict(id).get(key).is_some();
            vm.push(Value::Bool(found))?;
        }
        b"get" => {
            let key_value = vm.pop()?;
            let key = vm.to_str_id(key_value)?;
            let Some(value) = vm.heap.dict(id).get(key) else {
                return Err(RunError::name(format!(
                    "Tried to get missing dict key '{}'",
                    vm.interns.display(key)
                )));
            };
            vm.push(value)?;
        }
        b"get_default" => {
            let key_value = vm.pop()?;
            let key = vm.to_str_id(key_value)?;
            let default = vm.pop()?;
            let value = vm.heap.dict(id).get(key).unwrap_or(default);
            vm.push(value)?;
        }
        b"set" => {
            let key_value = vm.pop()?;
            let key = vm.to_str_id(key_value)?;
            let value = vm.pop()?;
            vm.heap.dict_mut(id).set(key, value);
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn update_type_error(vm: &Vm, value: Value) -> RunError {
    RunError::type_error(format!("Can't update dict with '{}' object", vm.type_name(value)))
}

/// Getters on the `dict` type value itself: constructors.
pub(crate) fn type_getter(vm: &mut Vm, name: &[u8]) -> RunResult<bool> {
    match name {
        b"new" => {
            let id = vm.heap.alloc(HeapData::Dict(Dict::new()));
            vm.push(Value::Ref(id))?;
        }
        b"@" => {
            // Copy a dict argument, or collect an iterable of pairs.
            let arg = vm.top()?;
            let dict = if let Value::Ref(arg_id) = arg
                && let HeapData::Dict(dict) = vm.heap.get(arg_id)
            {
                let copy = dict.clone();
                vm.pop()?;
                copy
            } else {
                let iter = vm.pop_iter()?;
                let mut dict = Dict::new();
                while let Some(pair_value) = vm.next_value(iter)? {
                    let (key_value, value) = vm.to_pair(pair_value)?;
                    let key = vm.to_str_id(key_value)?;
                    dict.set(key, value);
                }
                dict
            };
            let id = vm.heap.alloc(HeapData::Dict(dict));
            vm.push(Value::Ref(id))?;
        }
        b"build" => {
            let n_value = vm.pop()?;
            let n = vm.to_int(n_value)?;
            if n < 0 {
                return Err(RunError::stack(format!("Tried to build a dict of negative size {n}")));
            }
            let n = n as usize;
            let needed = n.checked_mul(2).ok_or_else(|| {
                RunError::stack(format!("Tried to build a dict of absurd size {n}"))
            })?;
            if needed > vm.stack_len() {
                return Err(RunError::stack(format!(
                    "Tried to build a dict of size {n} (requiring {needed} inputs) from a stack of size {}",
                    vm.stack_len()
                )));
            }
            let flat = vm.split_off_top(needed);
            let mut dict = Dict::new();
            for pair in flat.chunks_exact(2) {
                let key = vm.to_str_id(pair[0])?;
                dict.set(key, pair[1]);
            }
            let id = vm.heap.alloc(HeapData::Dict(dict));
            vm.push(Value::Ref(id))?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Builds a two-element list cell, the pair convention used by `@pair`,
/// `.items`, and the dict constructors.
pub(crate) fn make_pair(vm: &mut Vm, first: Value, second: Value) -> Value {
    let id = vm.heap.alloc(HeapData::List(List::from_elems(vec![first, second])));
    Value::Ref(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interns;

    #[test]
    fn set_preserves_first_insertion_order() {
        let mut interns = Interns::new();
        let a = interns.intern(b"a");
        let b = interns.intern(b"b");
        let mut dict = Dict::new();
        dict.set(a, Value::Int(1));
        dict.set(b, Value::Int(2));
        dict.set(a, Value::Int(3));
        let entries: Vec<_> = dict.entries().collect();
        assert_eq!(entries, vec![(a, Value::Int(3)), (b, Value::Int(2))]);
    }

    #[test]
    fn update_merges_in_other_order() {
        let mut interns = Interns::new();
        let a = interns.intern(b"a");
        let b = interns.intern(b"b");
        let mut dict = Dict::new();
        dict.set(a, Value::Int(1));
        let mut other = Dict::new();
        other.set(b, Value::Int(2));
        other.set(a, Value::Int(9));
        dict.update(&other);
        assert_eq!(dict.get(a), Some(Value::Int(9)));
        assert_eq!(dict.get(b), Some(Value::Int(2)));
        assert_eq!(dict.len(), 2);
    }
}
