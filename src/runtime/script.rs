use std::{fmt, rc::Rc};

use serde::Serialize;

use crate::{
    bytecode::image::{Func, Image, Instr, Priority},
    runtime::{error::Fault, stack::RuntimeStack, value::Value},
};

/// Stable index of a loaded script thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadHandle(pub(crate) usize);

impl ThreadHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Decoded instructions plus the thread's current instruction.
#[derive(Debug, Clone)]
pub struct InstructionStream {
    pub(crate) instrs: Rc<[Instr]>,
    pub(crate) current: usize,
}

impl InstructionStream {
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn current(&self) -> usize {
        self.current
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThreadStats {
    /// Scheduling turns granted by the round-robin scheduler.
    pub turns: u64,
    pub instructions: u64,
}

/// One loaded script: its code, tables, stack and run state.
#[derive(Debug)]
pub struct Script {
    pub(crate) code: InstructionStream,
    pub(crate) funcs: Rc<[Func]>,
    pub(crate) host_calls: Rc<[String]>,
    pub(crate) main_func: Option<usize>,
    pub(crate) global_data_size: usize,
    pub(crate) stack: RuntimeStack,
    pub(crate) ret_val: Value,
    pub(crate) priority: Priority,
    pub(crate) timeslice_ms: u64,
    pub(crate) running: bool,
    pub(crate) paused: bool,
    pub(crate) pause_end: u64,
    pub(crate) exit_code: Option<i32>,
    pub(crate) last_fault: Option<Fault>,
    pub(crate) stats: ThreadStats,
    pub(crate) digest: Option<[u8; 32]>,
}

impl Script {
    pub(crate) fn new(
        image: Image,
        stack: RuntimeStack,
        priority: Priority,
        timeslice_ms: u64,
    ) -> Self {
        Self {
            code: InstructionStream {
                instrs: image.instrs.into(),
                current: 0,
            },
            funcs: image.funcs.into(),
            host_calls: image.host_calls.into(),
            main_func: image.main_func,
            global_data_size: image.global_data_size as usize,
            stack,
            ret_val: Value::Null,
            priority,
            timeslice_ms,
            running: false,
            paused: false,
            pause_end: 0,
            exit_code: None,
            last_fault: None,
            stats: ThreadStats::default(),
            digest: None,
        }
    }

    /// Returns the thread to its just-loaded state: instruction pointer at
    /// `_Main`, stack cleared, global frame and `_Main`'s frame pushed.
    pub(crate) fn reset(&mut self) -> Result<(), Fault> {
        self.code.current = self
            .main_func
            .map(|main| self.funcs[main].entry_point)
            .unwrap_or(0);
        self.stack.clear();
        self.paused = false;
        self.pause_end = 0;
        self.ret_val = Value::Null;
        self.exit_code = None;
        self.last_fault = None;

        self.stack.push_frame(self.global_data_size)?;
        if let Some(main) = self.main_func {
            self.stack
                .push_frame(self.funcs[main].local_data_size as usize + 1)?;
        }
        Ok(())
    }

    pub fn find_func(&self, name: &str) -> Option<usize> {
        self.funcs
            .iter()
            .position(|func| func.name.eq_ignore_ascii_case(name))
    }

    pub fn instruction_pointer(&self) -> usize {
        self.code.current
    }

    pub fn stack(&self) -> &RuntimeStack {
        &self.stack
    }

    pub fn funcs(&self) -> &[Func] {
        &self.funcs
    }

    pub fn host_calls(&self) -> &[String] {
        &self.host_calls
    }

    pub fn ret_val(&self) -> &Value {
        &self.ret_val
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn timeslice_ms(&self) -> u64 {
        self.timeslice_ms
    }

    pub fn stats(&self) -> ThreadStats {
        self.stats
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }
}
