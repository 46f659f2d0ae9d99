//! Per-type behavior: getters, setters, printing, and the data structures
//! behind heap cells.
//!
//! Each module implements the attribute dispatch for one builtin type as a
//! function of the form `getter(vm, self_value, name_id, name) -> handled`,
//! mirroring the vtable hooks of the type descriptor: returning `false`
//! means the name is unknown and the VM raises the NameError.

pub mod boolean;
pub mod class;
pub mod dict;
pub mod func;
pub mod int;
pub mod iter;
pub mod list;
pub mod str;
pub mod type_obj;
pub mod vm_obj;

pub(crate) use class::{Class, Instance};
pub(crate) use dict::Dict;
pub(crate) use func::{Func, FuncKind, NativeFn};
pub(crate) use iter::{Iter, IterKind};
pub(crate) use list::List;

use crate::error::{RunError, RunResult};

/// Applies the negative-wrapping index convention shared by strings, lists
/// and dicts: negative indices count from the end; anything still out of
/// `[0, len)` is an IndexError.
pub(crate) fn wrap_index(i: i64, len: usize, type_name: &str) -> RunResult<usize> {
    let len_i = len as i64;
    if i < 0 {
        let wrapped = i + len_i;
        if wrapped < 0 {
            return Err(RunError::index(format!(
                "Negative index {wrapped} into {type_name} of size {len}"
            )));
        }
        Ok(wrapped as usize)
    } else if i >= len_i {
        Err(RunError::index(format!(
            "Out-of-bounds index {i} into {type_name} of size {len}"
        )))
    } else {
        Ok(i as usize)
    }
}
