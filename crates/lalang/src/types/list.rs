//! The list type: an ordered, growable sequence of values.
//!
//! Lists are shared by heap id; `.copy` is the only way to get a disjoint
//! one. `.sort` is an insertion sort over the type-dispatched comparison,
//! so user classes with `__cmp__` sort too, and sorting is a fixed point
//! under repeated application.

use crate::{
    error::{RunError, RunResult},
    heap::{HeapData, HeapId},
    value::{CmpResult, Value},
    vm::Vm,
};

/// Backing storage of a list cell.
#[derive(Debug, Clone, Default)]
pub(crate) struct List {
    pub elems: Vec<Value>,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elems(elems: Vec<Value>) -> Self {
        Self { elems }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Errors unless the list has exactly two elements.
    pub fn assert_pair(&self) -> RunResult<(Value, Value)> {
        if let [first, second] = self.elems[..] {
            Ok((first, second))
        } else {
            Err(RunError::type_error(format!(
                "List of size {} isn't a pair",
                self.elems.len()
            )))
        }
    }
}

pub(crate) fn getter(vm: &mut Vm, self_value: Value, id: HeapId, name: &[u8]) -> RunResult<bool> {
    match name {
        b"len" => {
            let len = vm.heap.list(id).len();
            vm.push(Value::Int(len as i64))?;
        }
        b"," => {
            let value = vm.pop()?;
            vm.heap.list_mut(id).elems.push(value);
            vm.push(self_value)?;
        }
        b"__iter__" => {
            let len = vm.heap.list(id).len();
            let iter = crate::types::Iter::new_list(id, len);
            let iter_id = vm.heap.alloc(HeapData::Iter(iter));
            vm.push(Value::Ref(iter_id))?;
        }
        b"slice" => {
            let len = vm.heap.list(id).len();
            let end_value = vm.pop()?;
            let end = match end_value {
                Value::Null => len as i64,
                other => vm.to_int(other)?,
            };
            let start_value = vm.pop()?;
            let start = vm.to_int(start_value)?;
            let iter = crate::types::Iter::new_list(id, len).sliced(start, end, len);
            let iter_id = vm.heap.alloc(HeapData::Iter(iter));
            vm.push(Value::Ref(iter_id))?;
        }
        b"copy" => {
            let copy = vm.heap.list(id).clone();
            let copy_id = vm.heap.alloc(HeapData::List(copy));
            vm.push(Value::Ref(copy_id))?;
        }
        b"extend" => {
            let other_value = vm.pop()?;
            let Value::Ref(other_id) = other_value else {
                return Err(extend_type_error(vm, other_value));
            };
            let HeapData::List(other) = vm.heap.get(other_id) else {
                return Err(extend_type_error(vm, other_value));
            };
            let other_elems = other.elems.clone();
            vm.heap.list_mut(id).elems.extend_from_slice(&other_elems);
        }
        b"get" => {
            let index_value = vm.pop()?;
            let index = vm.to_int(index_value)?;
            let list = vm.heap.list(id);
            let i = super::wrap_index(index, list.len(), "list")?;
            let value = list.elems[i];
            vm.push(value)?;
        }
        b"set" => {
            let index_value = vm.pop()?;
            let index = vm.to_int(index_value)?;
            let value = vm.pop()?;
            let list = vm.heap.list_mut(id);
            let i = super::wrap_index(index, list.elems.len(), "list")?;
            list.elems[i] = value;
        }
        b"pop" => {
            let list = vm.heap.list(id);
            let Some(&last) = list.elems.last() else {
                return Err(RunError::index("Tried to pop from an empty list"));
            };
            vm.push(last)?;
        }
        b"push" => {
            let value = vm.pop()?;
            vm.heap.list_mut(id).elems.push(value);
        }
        b"sort" => {
            sort(vm, id)?;
        }
        b"reverse" => {
            vm.heap.list_mut(id).elems.reverse();
        }
        b"unbuild" => {
            // The inverse of `list .build`.
            let elems = vm.heap.list(id).elems.clone();
            for value in &elems {
                vm.push(*value)?;
            }
            vm.push(Value::Int(elems.len() as i64))?;
        }
        b"unpair" => {
            // The inverse of `@pair`.
            let (first, second) = vm.heap.list(id).assert_pair()?;
            vm.push(first)?;
            vm.push(second)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn extend_type_error(vm: &Vm, value: Value) -> RunError {
    RunError::type_error(format!(
        "Attempted to extend a list with '{}' object",
        vm.type_name(value)
    ))
}

/// Stable insertion sort through the dispatched comparison.
///
/// The elements are snapshotted first: a user `__cmp__` may touch the heap
/// (or even this very list) while we sort.
fn sort(vm: &mut Vm, id: HeapId) -> RunResult<()> {
    let mut elems = vm.heap.list(id).elems.clone();
    for i in 1..elems.len() {
        let mut j = i;
        while j > 0 {
            if vm.cmp(elems[j - 1], elems[j])? != CmpResult::Gt {
                break;
            }
            elems.swap(j - 1, j);
            j -= 1;
        }
    }
    vm.heap.list_mut(id).elems = elems;
    Ok(())
}

/// Getters on the `list` type value itself: constructors.
pub(crate) fn type_getter(vm: &mut Vm, name: &[u8]) -> RunResult<bool> {
    match name {
        b"new" => {
            let id = vm.heap.alloc(HeapData::List(List::new()));
            vm.push(Value::Ref(id))?;
        }
        b"@" => {
            // Copy a list argument, or collect any other iterable.
            let arg = vm.top()?;
            let list = if let Value::Ref(arg_id) = arg
                && let HeapData::List(list) = vm.heap.get(arg_id)
            {
                let copy = list.clone();
                vm.pop()?;
                copy
            } else {
                let iter = vm.pop_iter()?;
                let mut list = List::new();
                while let Some(value) = vm.next_value(iter)? {
                    list.elems.push(value);
                }
                list
            };
            let id = vm.heap.alloc(HeapData::List(list));
            vm.push(Value::Ref(id))?;
        }
        b"build" => {
            let n_value = vm.pop()?;
            let n = vm.to_int(n_value)?;
            if n < 0 {
                return Err(RunError::stack(format!("Tried to build a list of negative size {n}")));
            }
            let n = n as usize;
            if n > vm.stack_len() {
                return Err(RunError::stack(format!(
                    "Tried to build a list of size {n} from a stack of size {}",
                    vm.stack_len()
                )));
            }
            let elems = vm.split_off_top(n);
            let id = vm.heap.alloc(HeapData::List(List::from_elems(elems)));
            vm.push(Value::Ref(id))?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}
