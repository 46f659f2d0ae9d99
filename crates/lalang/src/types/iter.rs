//! Iterator state and the `__iter__`/`__next__` protocol.
//!
//! An iterator carries the next index `i` and the exclusive `end`, plus a
//! kind-specific view of its source. Container iterators reference the
//! source by heap id; mutating the source during iteration is undefined
//! (this implementation stops early rather than reading out of bounds).
//!
//! `__next__` pushes either (value, true) or (false), and `for`/`next`
//! build on that.

use crate::{
    error::{RunError, RunResult},
    heap::{HeapData, HeapId},
    value::Value,
    vm::Vm,
};

/// Kind-specific iteration data.
#[derive(Debug, Clone, Copy)]
pub(crate) enum IterKind {
    /// Counts from `start`; yields `start + i`.
    Range { start: i64 },
    /// Walks the bytes of a string value, yielding single-byte strings.
    Str { value: Value },
    List(HeapId),
    DictKeys(HeapId),
    DictValues(HeapId),
    DictItems(HeapId),
    /// User-extensible form: `next` is a func called with `data` and the
    /// current index on the stack; whatever it pushes is the item.
    Custom { next: Value, data: Value },
}

impl IterKind {
    /// The name used in printed forms like `<range iterator at 0x2a>`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Range { .. } => "range",
            Self::Str { .. } => "str",
            Self::List(_) => "list",
            Self::DictKeys(_) => "dict keys",
            Self::DictValues(_) => "dict values",
            Self::DictItems(_) => "dict items",
            Self::Custom { .. } => "custom",
        }
    }
}

/// Iteration state: next index and exclusive end.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Iter {
    pub kind: IterKind,
    pub i: i64,
    pub end: i64,
}

impl Iter {
    pub fn new(kind: IterKind, len: usize) -> Self {
        Self {
            kind,
            i: 0,
            end: len as i64,
        }
    }

    pub fn new_range(start: i64, end: i64) -> Self {
        Self {
            kind: IterKind::Range { start },
            i: 0,
            end: end.saturating_sub(start),
        }
    }

    pub fn new_str(value: Value, len: usize) -> Self {
        Self::new(IterKind::Str { value }, len)
    }

    pub fn new_list(id: HeapId, len: usize) -> Self {
        Self::new(IterKind::List(id), len)
    }

    /// Restricts the iterator to `[start, end)` with the shared slicing
    /// convention: negative endpoints wrap, both clamp to `[0, len]`, and
    /// `end < start` gives an empty slice.
    #[must_use]
    pub fn sliced(mut self, start: i64, end: i64, len: usize) -> Self {
        let len = len as i64;
        let clamp = |raw: i64| {
            let wrapped = if raw < 0 { raw + len } else { raw };
            wrapped.clamp(0, len)
        };
        self.i = clamp(start);
        self.end = clamp(end);
        self
    }
}

pub(crate) fn getter(vm: &mut Vm, self_value: Value, id: HeapId, name: &[u8]) -> RunResult<bool> {
    match name {
        b"__iter__" => {
            vm.push(self_value)?;
        }
        b"__next__" => {
            let HeapData::Iter(iter) = vm.heap.get(id) else {
                unreachable!("iterator getter dispatched on non-iterator");
            };
            let iter = *iter;
            if iter.i >= iter.end {
                vm.push(Value::Bool(false))?;
                return Ok(true);
            }
            let i = iter.i;
            match iter.kind {
                IterKind::Range { start } => {
                    vm.push(Value::Int(start.wrapping_add(i)))?;
                }
                IterKind::Str { value } => {
                    let bytes = vm.str_bytes(value)?;
                    let Some(&b) = bytes.get(i as usize) else {
                        vm.push(Value::Bool(false))?;
                        return Ok(true);
                    };
                    vm.push(vm.char_str(b))?;
                }
                IterKind::List(list_id) => {
                    let Some(&value) = vm.heap.list(list_id).elems.get(i as usize) else {
                        vm.push(Value::Bool(false))?;
                        return Ok(true);
                    };
                    vm.push(value)?;
                }
                IterKind::DictKeys(dict_id) | IterKind::DictValues(dict_id) | IterKind::DictItems(dict_id) => {
                    let Some((key, value)) = vm.heap.dict(dict_id).entry(i as usize) else {
                        vm.push(Value::Bool(false))?;
                        return Ok(true);
                    };
                    match iter.kind {
                        IterKind::DictKeys(_) => vm.push(Value::Str(key))?,
                        IterKind::DictValues(_) => vm.push(value)?,
                        _ => {
                            let pair = super::dict::make_pair(vm, Value::Str(key), value);
                            vm.push(pair)?;
                        }
                    }
                }
                IterKind::Custom { next, data } => {
                    vm.push(data)?;
                    vm.push(Value::Int(i))?;
                    vm.call_value(next)?;
                }
            }
            vm.push(Value::Bool(true))?;
            if let HeapData::Iter(iter) = vm.heap.get_mut(id) {
                iter.i += 1;
            }
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Getters on the `iterator` type value: the custom-form constructor.
///
/// `data next end iterator .custom` builds an iterator that calls `next`
/// with (data, index) for each of the `end` steps.
pub(crate) fn type_getter(vm: &mut Vm, name: &[u8]) -> RunResult<bool> {
    match name {
        b"custom" => {
            let end_value = vm.pop()?;
            let end = vm.to_int(end_value)?;
            let next = vm.pop()?;
            let data = vm.pop()?;
            if !vm.is_func(next) {
                return Err(RunError::type_error(format!(
                    "Custom iterator step must be a func, got '{}' object",
                    vm.type_name(next)
                )));
            }
            let iter = Iter {
                kind: IterKind::Custom { next, data },
                i: 0,
                end,
            };
            let id = vm.heap.alloc(HeapData::Iter(iter));
            vm.push(Value::Ref(id))?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_length_is_never_negative() {
        let it = Iter::new_range(10, 3);
        assert!(it.i >= it.end);
        let it = Iter::new_range(3, 10);
        assert_eq!(it.end, 7);
    }

    #[test]
    fn slicing_wraps_and_clamps() {
        let it = Iter::new_range(0, 10).sliced(-3, -1, 10);
        assert_eq!((it.i, it.end), (7, 9));
        let it = Iter::new_range(0, 10).sliced(2, 99, 10);
        assert_eq!((it.i, it.end), (2, 10));
        let it = Iter::new_range(0, 10).sliced(-99, 4, 10);
        assert_eq!((it.i, it.end), (0, 4));
        // end < start is just an empty slice
        let it = Iter::new_range(0, 10).sliced(5, 2, 10);
        assert!(it.i >= it.end);
    }
}
