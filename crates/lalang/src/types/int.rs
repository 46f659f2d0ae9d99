//! Arithmetic and bitwise operators on machine integers, plus `.times`.
//!
//! Arithmetic wraps like the C it replaces; division truncates toward
//! zero. Division or remainder by zero is a fatal TypeError rather than a
//! hardware trap.

use crate::{
    code::Op,
    error::{RunError, RunResult},
    heap::HeapData,
    intern::StrId,
    types::Iter,
    value::Value,
    vm::Vm,
};

/// Applies one integer operator. `j` is ignored for unary operators.
pub(crate) fn int_op(op: Op, i: i64, j: i64) -> RunResult<i64> {
    Ok(match op {
        Op::Neg => i.wrapping_neg(),
        Op::Add => i.wrapping_add(j),
        Op::Sub => i.wrapping_sub(j),
        Op::Mul => i.wrapping_mul(j),
        Op::Div => {
            if j == 0 {
                return Err(RunError::type_error("Division by zero"));
            }
            i.wrapping_div(j)
        }
        Op::Mod => {
            if j == 0 {
                return Err(RunError::type_error("Division by zero"));
            }
            i.wrapping_rem(j)
        }
        Op::Not => !i,
        Op::And => i & j,
        Op::Or => i | j,
        Op::Xor => i ^ j,
        _ => {
            return Err(RunError::type_error(format!(
                "Operator not implemented for int: {}",
                op.token()
            )));
        }
    })
}

pub(crate) fn getter(vm: &mut Vm, self_value: Value, _name_id: StrId, name: &[u8]) -> RunResult<bool> {
    let Value::Int(i) = self_value else {
        unreachable!("int getter dispatched on non-int");
    };

    if let Some(op) = Op::parse(name)
        && op.is_int_op()
    {
        let j = if op.arity() == 1 {
            0
        } else {
            let other = vm.pop()?;
            vm.to_int(other)?
        };
        let result = int_op(op, i, j)?;
        vm.push(Value::Int(result))?;
        return Ok(true);
    }

    if name == b"times" {
        let iter = Iter::new_range(0, i);
        let id = vm.heap.alloc(HeapData::Iter(iter));
        vm.push(Value::Ref(id))?;
        return Ok(true);
    }

    Ok(false)
}
