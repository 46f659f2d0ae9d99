//! Host-facing value snapshots.
//!
//! [`Object`] owns its data and needs no heap to inspect, so embedders and
//! tests can read results off the stack without touching VM internals.
//! Values with no natural owned form (funcs, iterators, classes) come back
//! as their printed representation.

use crate::{error::RunResult, heap::HeapData, value::Value, vm::Vm};

/// An owned snapshot of a runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Null,
    Bool(bool),
    Int(i64),
    /// Byte-string contents.
    Str(Vec<u8>),
    List(Vec<Object>),
    /// Insertion-ordered (name, value) pairs.
    Dict(Vec<(Vec<u8>, Object)>),
    /// The printed form of a value with no owned equivalent.
    Repr(String),
}

impl Object {
    #[must_use]
    pub fn str(s: &str) -> Self {
        Self::Str(s.as_bytes().to_vec())
    }
}

impl Vm {
    /// Snapshots the value on top of the stack.
    pub fn top_object(&self) -> RunResult<Object> {
        let top = self.top()?;
        Ok(self.value_to_object(top))
    }

    /// Snapshots the whole stack, bottom to top.
    #[must_use]
    pub fn stack_objects(&self) -> Vec<Object> {
        self.stack_values().iter().map(|&v| self.value_to_object(v)).collect()
    }

    /// Converts one value into an owned snapshot.
    #[must_use]
    pub fn value_to_object(&self, value: Value) -> Object {
        match value {
            Value::Null => Object::Null,
            Value::Bool(b) => Object::Bool(b),
            Value::Int(i) => Object::Int(i),
            Value::Str(id) => Object::Str(self.interns.get(id).to_vec()),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Str(bytes) => Object::Str(bytes.to_vec()),
                HeapData::List(list) => Object::List(list.elems.iter().map(|&e| self.value_to_object(e)).collect()),
                HeapData::Dict(dict) => Object::Dict(
                    dict.entries()
                        .map(|(k, v)| (self.interns.get(k).to_vec(), self.value_to_object(v)))
                        .collect(),
                ),
                _ => Object::Repr(self.debug_repr(value)),
            },
            Value::Type(_) | Value::Vm => Object::Repr(self.debug_repr(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_own_their_data() {
        let mut vm = Vm::new();
        vm.push(Value::Int(5)).unwrap();
        assert_eq!(vm.top_object().unwrap(), Object::Int(5));
        let s = vm.make_str(b"hi");
        vm.push(s).unwrap();
        assert_eq!(vm.top_object().unwrap(), Object::str("hi"));
    }
}
