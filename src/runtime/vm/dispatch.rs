use std::{cmp::Ordering, rc::Rc};

use crate::{
    bytecode::{image::Instr, op_code::OpCode},
    runtime::{
        error::Fault,
        script::{Script, ThreadHandle},
        value::Value,
    },
};

use super::{SchedulerMode, Vm};

/// How the instruction pointer moves after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Next,
    Jump(usize),
    /// The instruction already settled the thread's state (e.g. it stopped).
    Stay,
    /// A `RET` unwound a stack-base marker: a synchronous host call finished.
    SyncReturn(usize),
}

impl Vm {
    /// Executes the instruction at `thread`'s instruction pointer.
    pub(super) fn execute_instruction(
        &mut self,
        thread: ThreadHandle,
        now: u64,
    ) -> Result<Flow, Fault> {
        let Some(script) = self.threads.get(thread.0).and_then(Option::as_ref) else {
            return Ok(Flow::Stay);
        };
        let ip = script.code.current;
        let code = Rc::clone(&script.code.instrs);
        let instr = code.get(ip).ok_or(Fault::InstructionPointer {
            ip,
            len: code.len(),
        })?;
        if self.trace {
            self.trace_instruction(thread, ip, instr);
        }

        let flow = self.dispatch_instruction(thread, ip, instr, now)?;

        if let Some(script) = self.threads.get_mut(thread.0).and_then(Option::as_mut) {
            script.stats.instructions += 1;
            match flow {
                Flow::Next => script.code.current = ip + 1,
                Flow::Jump(target) | Flow::SyncReturn(target) => script.code.current = target,
                Flow::Stay => {}
            }
        }
        Ok(flow)
    }

    pub(super) fn dispatch_instruction(
        &mut self,
        thread: ThreadHandle,
        ip: usize,
        instr: &Instr,
        now: u64,
    ) -> Result<Flow, Fault> {
        let pinned = matches!(self.scheduler.mode, SchedulerMode::Pinned(_));
        let Some(script) = self.threads.get_mut(thread.0).and_then(Option::as_mut) else {
            return Ok(Flow::Stay);
        };

        match instr.op {
            OpCode::Mov => {
                let dest = script.location(instr, 0)?;
                if script.source_location(instr, 1)? != Some(dest) {
                    let value = script.operand_value(instr, 1)?.clone();
                    *script.slot_mut(dest) = value;
                }
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Exp => {
                script.arithmetic(instr)?;
            }
            OpCode::Mod
            | OpCode::And
            | OpCode::Or
            | OpCode::Xor
            | OpCode::Shl
            | OpCode::Shr => {
                script.integer_only(instr)?;
            }
            OpCode::Neg | OpCode::Inc | OpCode::Dec | OpCode::Not => {
                script.unary(instr)?;
            }
            OpCode::Concat => {
                let dest = script.location(instr, 0)?;
                if matches!(script.slot(dest), Value::String(_)) {
                    let tail = script.operand_string(instr, 1)?;
                    if let Value::String(s) = script.slot_mut(dest) {
                        s.push_str(&tail);
                    }
                }
            }
            OpCode::GetChar => {
                let dest = script.location(instr, 0)?;
                if matches!(script.slot(dest), Value::String(_)) {
                    let source = script.operand_string(instr, 1)?;
                    let index = script.operand_int(instr, 2)?;
                    let ch = char_at(&source, index)?;
                    *script.slot_mut(dest) = Value::String(ch.to_string());
                }
            }
            OpCode::SetChar => {
                let dest = script.location(instr, 0)?;
                if matches!(script.slot(dest), Value::String(_)) {
                    let index = script.operand_int(instr, 1)?;
                    let source = script.operand_string(instr, 2)?;
                    if let Some(ch) = source.chars().next()
                        && let Value::String(s) = script.slot_mut(dest)
                    {
                        set_char(s, index, ch)?;
                    }
                }
            }
            OpCode::Jmp => return Ok(Flow::Jump(script.instr_target(instr, 0)?)),
            OpCode::Je | OpCode::Jne | OpCode::Jg | OpCode::Jl | OpCode::Jge | OpCode::Jle => {
                let ordering = compare(
                    script.operand_value(instr, 0)?,
                    script.operand_value(instr, 1)?,
                );
                let taken = match instr.op {
                    OpCode::Je => ordering == Some(Ordering::Equal),
                    OpCode::Jne => ordering != Some(Ordering::Equal),
                    OpCode::Jg => ordering == Some(Ordering::Greater),
                    OpCode::Jl => ordering == Some(Ordering::Less),
                    OpCode::Jge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    _ => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                };
                if taken {
                    return Ok(Flow::Jump(script.instr_target(instr, 2)?));
                }
            }
            OpCode::Push => {
                let value = script.operand_value(instr, 0)?.clone();
                script.stack.push(value)?;
            }
            OpCode::Pop => {
                let value = script.stack.pop()?;
                let dest = script.location(instr, 0)?;
                *script.slot_mut(dest) = value;
            }
            OpCode::Call => {
                let func = script.func_target(instr, 0)?;
                let entry = script.call_func(func, ip + 1)?;
                return Ok(Flow::Jump(entry));
            }
            OpCode::Ret => return script.ret(thread),
            OpCode::CallHost => {
                let call = script.host_call_target(instr, 0)?;
                return self.call_host(thread, ip, call);
            }
            OpCode::Pause => {
                let duration = script.operand_int(instr, 0)?;
                if !pinned {
                    script.paused = true;
                    script.pause_end = now + u64::try_from(duration).unwrap_or(0);
                }
            }
            OpCode::Exit => {
                script.exit_code = Some(script.operand_int(instr, 0)?);
                script.running = false;
                log::debug!(
                    "thread {} exited with code {}",
                    thread,
                    script.exit_code.unwrap_or(0)
                );
            }
        }
        Ok(Flow::Next)
    }
}

impl Script {
    /// Float arithmetic when the destination holds a float, wrapping integer
    /// arithmetic on the coerced destination otherwise.
    fn arithmetic(&mut self, instr: &Instr) -> Result<(), Fault> {
        let dest = self.location(instr, 0)?;
        let source = self.operand_value(instr, 1)?;
        let result = match self.slot(dest) {
            Value::Float(d) => {
                let (d, s) = (*d, source.coerce_float());
                Value::Float(match instr.op {
                    OpCode::Add => d + s,
                    OpCode::Sub => d - s,
                    OpCode::Mul => d * s,
                    OpCode::Div => d / s,
                    _ => d.powf(s),
                })
            }
            other => {
                let (d, s) = (other.coerce_int(), source.coerce_int());
                Value::Int(match instr.op {
                    OpCode::Add => d.wrapping_add(s),
                    OpCode::Sub => d.wrapping_sub(s),
                    OpCode::Mul => d.wrapping_mul(s),
                    OpCode::Div if s == 0 => return Err(Fault::DivisionByZero),
                    OpCode::Div => d.wrapping_div(s),
                    _ => (d as f64).powf(s as f64) as i32,
                })
            }
        };
        *self.slot_mut(dest) = result;
        Ok(())
    }

    /// `MOD` and the bitwise instructions leave non-integer destinations alone.
    fn integer_only(&mut self, instr: &Instr) -> Result<(), Fault> {
        let dest = self.location(instr, 0)?;
        let Value::Int(d) = *self.slot(dest) else {
            return Ok(());
        };
        let s = self.operand_int(instr, 1)?;
        let result = match instr.op {
            OpCode::Mod if s == 0 => return Err(Fault::DivisionByZero),
            OpCode::Mod => d.wrapping_rem(s),
            OpCode::And => d & s,
            OpCode::Or => d | s,
            OpCode::Xor => d ^ s,
            OpCode::Shl => d.wrapping_shl(s as u32),
            _ => d.wrapping_shr(s as u32),
        };
        *self.slot_mut(dest) = Value::Int(result);
        Ok(())
    }

    fn unary(&mut self, instr: &Instr) -> Result<(), Fault> {
        let dest = self.location(instr, 0)?;
        let result = match (instr.op, self.slot(dest)) {
            (OpCode::Not, Value::Int(d)) => Value::Int(!d),
            (OpCode::Not, _) => return Ok(()),
            (OpCode::Neg, Value::Float(d)) => Value::Float(-d),
            (OpCode::Inc, Value::Float(d)) => Value::Float(d + 1.0),
            (OpCode::Dec, Value::Float(d)) => Value::Float(d - 1.0),
            (OpCode::Neg, other) => Value::Int(other.coerce_int().wrapping_neg()),
            (OpCode::Inc, other) => Value::Int(other.coerce_int().wrapping_add(1)),
            (_, other) => Value::Int(other.coerce_int().wrapping_sub(1)),
        };
        *self.slot_mut(dest) = result;
        Ok(())
    }
}

/// Ordering by the first operand's type; the second is coerced to match.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match a {
        Value::Float(x) => x.partial_cmp(&b.coerce_float()),
        Value::String(x) => Some(x.as_str().cmp(b.coerce_string().as_str())),
        other => Some(other.coerce_int().cmp(&b.coerce_int())),
    }
}

fn char_at(s: &str, index: i32) -> Result<char, Fault> {
    usize::try_from(index)
        .ok()
        .and_then(|i| s.chars().nth(i))
        .ok_or(Fault::StringIndexOutOfRange {
            index,
            len: s.chars().count(),
        })
}

fn set_char(s: &mut String, index: i32, ch: char) -> Result<(), Fault> {
    let mut chars: Vec<char> = s.chars().collect();
    match usize::try_from(index).ok().and_then(|i| chars.get_mut(i)) {
        Some(slot) => *slot = ch,
        None => {
            return Err(Fault::StringIndexOutOfRange {
                index,
                len: chars.len(),
            });
        }
    }
    *s = chars.into_iter().collect();
    Ok(())
}
