//! The value arena.
//!
//! Heap-allocated payloads live in an append-only arena and are referenced
//! by [`HeapId`]. Nothing is ever freed: the language has no deallocation,
//! so cells are simply retained for the lifetime of the VM. Shared mutable
//! objects (lists, dicts, functions, classes) are shared by id, which gives
//! the same aliasing behavior as the original's shared pointers.

use crate::types::{Class, Dict, Func, Instance, Iter, List};

/// Index of a cell in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u32);

impl HeapId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of a heap cell.
#[derive(Debug)]
pub(crate) enum HeapData {
    /// A runtime-built string too long for the pool.
    Str(Box<[u8]>),
    List(List),
    Dict(Dict),
    Iter(Iter),
    Func(Func),
    Class(Class),
    Instance(Instance),
}

/// Append-only arena of heap cells.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    cells: Vec<HeapData>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(u32::try_from(self.cells.len()).expect("heap cell index out of u32 range"));
        self.cells.push(data);
        id
    }

    #[inline]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.cells[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.cells[id.index()]
    }

    /// Returns the dict in `id`.
    ///
    /// Only for ids the caller created as dicts (globals, locals, class and
    /// instance attribute dicts), where the kind is an internal invariant.
    pub fn dict(&self, id: HeapId) -> &Dict {
        match self.get(id) {
            HeapData::Dict(dict) => dict,
            other => panic!("heap cell {} is not a dict: {other:?}", id.index()),
        }
    }

    pub fn dict_mut(&mut self, id: HeapId) -> &mut Dict {
        match self.get_mut(id) {
            HeapData::Dict(dict) => dict,
            other => panic!("heap cell {} is not a dict: {other:?}", id.index()),
        }
    }

    /// Returns the list in `id`; same invariant caveat as [`Heap::dict`].
    pub fn list(&self, id: HeapId) -> &List {
        match self.get(id) {
            HeapData::List(list) => list,
            other => panic!("heap cell {} is not a list: {other:?}", id.index()),
        }
    }

    pub fn list_mut(&mut self, id: HeapId) -> &mut List {
        match self.get_mut(id) {
            HeapData::List(list) => list,
            other => panic!("heap cell {} is not a list: {other:?}", id.index()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }
}
