//! The `vm` value: reflection over the VM's debug-print flags.
//!
//! These are observable settings, not semantics: reading one pushes a
//! bool, writing one coerces the stored value through `to_bool`.

use crate::{error::RunResult, value::Value, vm::Vm};

pub(crate) fn getter(vm: &mut Vm, name: &[u8]) -> RunResult<bool> {
    let flag = match name {
        b"print_tokens" => vm.flags.print_tokens,
        b"print_code" => vm.flags.print_code,
        b"print_stack" => vm.flags.print_stack,
        b"print_eval" => vm.flags.print_eval,
        _ => return Ok(false),
    };
    vm.push(Value::Bool(flag != 0))?;
    Ok(true)
}

pub(crate) fn setter(vm: &mut Vm, name: &[u8]) -> RunResult<bool> {
    let value = match name {
        b"print_tokens" | b"print_code" | b"print_stack" | b"print_eval" => {
            let value = vm.pop()?;
            u8::from(vm.to_bool(value))
        }
        _ => return Ok(false),
    };
    match name {
        b"print_tokens" => vm.flags.print_tokens = value,
        b"print_code" => vm.flags.print_code = value,
        b"print_stack" => vm.flags.print_stack = value,
        _ => vm.flags.print_eval = value,
    }
    Ok(true)
}
