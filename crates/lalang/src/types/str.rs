//! String methods.
//!
//! Strings are immutable byte strings. `.slice` returns an iterator rather
//! than a new string; `.get` yields single-byte strings from the char
//! cache, so character values are singletons.

use crate::{
    error::RunResult,
    heap::HeapData,
    intern::StrId,
    types::{Iter, wrap_index},
    value::Value,
    vm::Vm,
};

pub(crate) fn getter(vm: &mut Vm, self_value: Value, _name_id: StrId, name: &[u8]) -> RunResult<bool> {
    match name {
        b"write" => {
            let bytes = vm.to_str_bytes(self_value)?;
            vm.write_out(&bytes);
        }
        b"writeline" => {
            let mut bytes = vm.to_str_bytes(self_value)?;
            bytes.push(b'\n');
            vm.write_out(&bytes);
        }
        b"len" => {
            let len = vm.str_bytes(self_value)?.len();
            vm.push(Value::Int(len as i64))?;
        }
        b"__iter__" => {
            let len = vm.str_bytes(self_value)?.len();
            let iter = Iter::new_str(self_value, len);
            let id = vm.heap.alloc(HeapData::Iter(iter));
            vm.push(Value::Ref(id))?;
        }
        b"slice" => {
            let len = vm.str_bytes(self_value)?.len();
            let end_value = vm.pop()?;
            let end = match end_value {
                Value::Null => len as i64,
                other => vm.to_int(other)?,
            };
            let start_value = vm.pop()?;
            let start = vm.to_int(start_value)?;
            let iter = Iter::new_str(self_value, len).sliced(start, end, len);
            let id = vm.heap.alloc(HeapData::Iter(iter));
            vm.push(Value::Ref(id))?;
        }
        b"get" => {
            let index_value = vm.pop()?;
            let index = vm.to_int(index_value)?;
            let bytes = vm.str_bytes(self_value)?;
            let i = wrap_index(index, bytes.len(), "str")?;
            let c = bytes[i];
            vm.push(vm.char_str(c))?;
        }
        b"has" => {
            let needle_value = vm.pop()?;
            let needle = vm.to_char(needle_value)?;
            let found = vm.str_bytes(self_value)?.contains(&needle);
            vm.push(Value::Bool(found))?;
        }
        b"replace" => {
            // Argument order: `s c1 c2 .replace` rewrites c1 to c2.
            let to_value = vm.pop()?;
            let to = vm.to_char(to_value)?;
            let from_value = vm.pop()?;
            let from = vm.to_char(from_value)?;
            let mut bytes = vm.to_str_bytes(self_value)?;
            for b in &mut bytes {
                if *b == from {
                    *b = to;
                }
            }
            let result = vm.make_str(&bytes);
            vm.push(result)?;
        }
        b"+" => {
            let other_value = vm.pop()?;
            let other = vm.to_str_bytes(other_value)?;
            let mut bytes = vm.to_str_bytes(self_value)?;
            bytes.extend_from_slice(&other);
            let result = vm.make_str(&bytes);
            vm.push(result)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Appends the quoted form of a string to `out`, escaping `"`, `\` and
/// newlines the way the lexer would read them back.
pub(crate) fn push_quoted(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'"');
    for &b in bytes {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out.push(b'"');
}
