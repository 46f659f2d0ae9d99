//! Logical operators on booleans.
//!
//! `! & | ^` coerce their argument through `to_bool`, so `1 true &` is
//! legal and true.

use crate::{
    code::Op,
    error::RunResult,
    intern::StrId,
    value::Value,
    vm::Vm,
};

pub(crate) fn getter(vm: &mut Vm, self_value: Value, _name_id: StrId, name: &[u8]) -> RunResult<bool> {
    let Some(op) = Op::parse(name) else {
        return Ok(false);
    };
    if !op.is_bool_op() {
        return Ok(false);
    }

    let Value::Bool(i) = self_value else {
        unreachable!("bool getter dispatched on non-bool");
    };

    let result = if op.arity() == 1 {
        match op {
            Op::Not => !i,
            _ => unreachable!(),
        }
    } else {
        let other = vm.pop()?;
        let j = vm.to_bool(other);
        match op {
            Op::And => i & j,
            Op::Or => i | j,
            Op::Xor => i ^ j,
            _ => unreachable!(),
        }
    };

    vm.push(Value::Bool(result))?;
    Ok(true)
}
