//! The step function (spec §4.2 "Evaluator"): consumes exactly one
//! instruction and either advances, branches, suspends, spawns, or
//! terminates. Performs no I/O, no locking, and no scheduling decisions —
//! all shared-state mutation is delegated to the [`Controller`].

use stepwise_core::{Instruction, Value};

use crate::controller::Controller;
use crate::error::{RuntimeError, RuntimeResult};
use crate::machine::{MachineState, StepResult};
use crate::storage::Storage;

fn pop(state: &mut MachineState) -> RuntimeResult<Value> {
    state.stack.pop().ok_or(RuntimeError::StackUnderflow {
        vmid: state.vmid,
        ip: state.ip,
    })
}

fn is_falsy(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Int(0))
}

fn numeric_op(
    state: &MachineState,
    a: Value,
    b: Value,
    int_op: impl Fn(i64, i64) -> RuntimeResult<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> RuntimeResult<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(a, b)?)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(a, b))),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_op(a as f64, b))),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_op(a, b as f64))),
        (a, b) => Err(RuntimeError::TypeError {
            vmid: state.vmid,
            message: format!("cannot apply arithmetic to {} and {}", a.type_name(), b.type_name()),
        }),
    }
}

/// Executes exactly one instruction at `state.ip` against `state`,
/// delegating every shared-state mutation to `controller` (spec §4.2).
pub fn step<S: Storage>(
    state: &mut MachineState,
    controller: &Controller<S>,
) -> RuntimeResult<StepResult> {
    let instruction = controller
        .executable()
        .code
        .get(state.ip)
        .cloned()
        .ok_or(RuntimeError::TypeError {
            vmid: state.vmid,
            message: format!("instruction pointer {} out of bounds", state.ip),
        })?;

    match instruction {
        Instruction::PushValue(value) => {
            if state.stack.len() >= controller.limits().max_stack_depth {
                return Err(RuntimeError::StackOverflow { vmid: state.vmid });
            }
            state.stack.push(value);
            state.ip += 1;
            Ok(StepResult::Continue)
        }

        Instruction::Call { arity } => {
            if state.call_depth >= controller.limits().max_call_depth {
                return Err(RuntimeError::CallDepthExceeded { vmid: state.vmid });
            }
            let callee = pop(state)?;
            let name = match callee {
                Value::FunctionPointer(name) => name,
                other => {
                    return Err(RuntimeError::TypeError {
                        vmid: state.vmid,
                        message: format!("cannot call a {}", other.type_name()),
                    })
                }
            };
            if state.stack.len() < arity {
                return Err(RuntimeError::StackUnderflow {
                    vmid: state.vmid,
                    ip: state.ip,
                });
            }
            // Arguments stay resident on the shared operand stack; the
            // callee's own `bind` prologue consumes them. Only the
            // function-pointer operand is actually removed here.
            let location = *controller
                .executable()
                .locations
                .get(&*name)
                .ok_or_else(|| RuntimeError::UnknownFunction {
                    vmid: state.vmid,
                    name: name.to_string(),
                })?;

            let rec = crate::arec::ActivationRecord::new(
                name,
                Some(state.current_arec),
                state.vmid,
                Some(state.ip),
            );
            let new_arec = controller.push_arec(rec)?;
            state.current_arec = new_arec;
            state.call_depth += 1;
            state.ip = location;
            Ok(StepResult::Continue)
        }

        Instruction::Return => {
            let retval = pop(state)?;
            let returning_from = state.current_arec;
            let freed = controller.pop_arec(returning_from)?;
            if returning_from == state.root_arec {
                // Unwound past this machine's own root: nothing left to
                // resume within this vmid, regardless of whether the root
                // arec's dynamic_chain points at another machine's frame
                // for lexical lookup.
                Ok(StepResult::Finish { value: retval })
            } else {
                let parent = freed.dynamic_chain.ok_or(RuntimeError::TypeError {
                    vmid: state.vmid,
                    message: "non-root activation record had no caller".into(),
                })?;
                state.current_arec = parent;
                state.call_depth -= 1;
                state.ip = freed.call_site.unwrap_or(0) + 1;
                state.stack.push(retval);
                Ok(StepResult::Continue)
            }
        }

        Instruction::Wait { slot } => {
            let idx = state
                .stack
                .len()
                .checked_sub(1 + slot)
                .ok_or(RuntimeError::StackUnderflow {
                    vmid: state.vmid,
                    ip: state.ip,
                })?;
            match state.stack[idx].as_future() {
                None => {
                    state.ip += 1;
                    Ok(StepResult::Continue)
                }
                Some(target) => {
                    let (resolved, value) = controller.get_or_wait(state.vmid, target, slot)?;
                    if resolved {
                        state.stack[idx] = value.unwrap_or(Value::Null);
                        state.ip += 1;
                        Ok(StepResult::Continue)
                    } else {
                        Ok(StepResult::Wait)
                    }
                }
            }
        }

        Instruction::Jump { target } => {
            state.ip = target;
            Ok(StepResult::Continue)
        }

        Instruction::JumpIfFalse { target } => {
            let value = pop(state)?;
            state.ip = if is_falsy(&value) { target } else { state.ip + 1 };
            Ok(StepResult::Continue)
        }

        Instruction::Add => {
            let b = pop(state)?;
            let a = pop(state)?;
            let result = numeric_op(
                state,
                a,
                b,
                |a, b| {
                    a.checked_add(b).ok_or(RuntimeError::TypeError {
                        vmid: state.vmid,
                        message: "integer overflow in add".into(),
                    })
                },
                |a, b| a + b,
            )?;
            state.stack.push(result);
            state.ip += 1;
            Ok(StepResult::Continue)
        }

        Instruction::Sub => {
            let b = pop(state)?;
            let a = pop(state)?;
            let result = numeric_op(
                state,
                a,
                b,
                |a, b| {
                    a.checked_sub(b).ok_or(RuntimeError::TypeError {
                        vmid: state.vmid,
                        message: "integer overflow in sub".into(),
                    })
                },
                |a, b| a - b,
            )?;
            state.stack.push(result);
            state.ip += 1;
            Ok(StepResult::Continue)
        }

        Instruction::Mul => {
            let b = pop(state)?;
            let a = pop(state)?;
            let result = numeric_op(
                state,
                a,
                b,
                |a, b| {
                    a.checked_mul(b).ok_or(RuntimeError::TypeError {
                        vmid: state.vmid,
                        message: "integer overflow in mul".into(),
                    })
                },
                |a, b| a * b,
            )?;
            state.stack.push(result);
            state.ip += 1;
            Ok(StepResult::Continue)
        }

        Instruction::Div => {
            let b = pop(state)?;
            let a = pop(state)?;
            if matches!(b, Value::Int(0)) {
                return Err(RuntimeError::DivisionByZero { vmid: state.vmid });
            }
            let result = numeric_op(
                state,
                a,
                b,
                |a, b| Ok(a / b),
                |a, b| a / b,
            )?;
            state.stack.push(result);
            state.ip += 1;
            Ok(StepResult::Continue)
        }

        Instruction::SpawnAsync { arity } => {
            let callee = pop(state)?;
            let name = match callee {
                Value::FunctionPointer(name) => name,
                other => {
                    return Err(RuntimeError::TypeError {
                        vmid: state.vmid,
                        message: format!("cannot spawn a {}", other.type_name()),
                    })
                }
            };
            if state.stack.len() < arity {
                return Err(RuntimeError::StackUnderflow {
                    vmid: state.vmid,
                    ip: state.ip,
                });
            }
            // Unlike `call`, a spawned machine owns a disjoint operand
            // stack, so its arguments must actually leave the parent's.
            let split_at = state.stack.len() - arity;
            let args: Vec<Value> = state.stack.split_off(split_at);

            let child = controller.thread_machine(state.current_arec, state.ip, &name, args)?;
            state.stack.push(Value::Future(child));
            state.ip += 1;
            Ok(StepResult::Spawn { child })
        }

        Instruction::Bind { name } => {
            let value = pop(state)?;
            controller.bind(state.current_arec, name, value)?;
            state.ip += 1;
            Ok(StepResult::Continue)
        }

        Instruction::Lookup { name } => {
            let value = controller
                .lookup(state.current_arec, &name)?
                .ok_or_else(|| RuntimeError::UnboundIdentifier {
                    vmid: state.vmid,
                    name: name.clone(),
                })?;
            state.stack.push(value);
            state.ip += 1;
            Ok(StepResult::Continue)
        }

        Instruction::Pop => {
            pop(state)?;
            state.ip += 1;
            Ok(StepResult::Continue)
        }
    }
}
