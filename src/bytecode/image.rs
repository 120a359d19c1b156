use std::fmt::{self, Write};

use serde::Serialize;

use crate::{bytecode::op_code::OpCode, runtime::value::Value};

/// One decoded instruction. String operands own their text.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub op: OpCode,
    pub operands: Vec<Value>,
}

impl Instr {
    pub fn new(op: OpCode, operands: Vec<Value>) -> Self {
        Self { op, operands }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Func {
    pub name: String,
    pub entry_point: usize,
    pub param_count: u8,
    pub local_data_size: u32,
}

impl Func {
    /// Slots released by `RET`: parameters, return address and locals. The
    /// marker slot on top of the locals is popped separately.
    pub fn stack_frame_size(&self) -> usize {
        self.param_count as usize + 1 + self.local_data_size as usize
    }
}

/// Scheduling priority. Named tiers map to configured timeslices; `User`
/// carries its own millisecond value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    User(u32),
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn code(self) -> u8 {
        match self {
            Priority::User(_) => 0,
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn from_code(code: u8, user_timeslice: u32) -> Option<Self> {
        match code {
            0 => Some(Priority::User(user_timeslice)),
            1 => Some(Priority::Low),
            2 => Some(Priority::Medium),
            3 => Some(Priority::High),
            _ => None,
        }
    }

    pub fn user_timeslice(self) -> u32 {
        match self {
            Priority::User(ms) => ms,
            _ => 0,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::User(ms) => write!(f, "user {}ms", ms),
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// A decoded XSE executable, independent of any VM.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Requested stack slots; `0` selects the VM default.
    pub stack_size: u32,
    pub global_data_size: u32,
    pub main_func: Option<usize>,
    pub priority: Priority,
    pub instrs: Vec<Instr>,
    pub funcs: Vec<Func>,
    pub host_calls: Vec<String>,
}

impl Image {
    /// Case-insensitive lookup by function name.
    pub fn find_func(&self, name: &str) -> Option<usize> {
        self.funcs
            .iter()
            .position(|func| func.name.eq_ignore_ascii_case(name))
    }

    /// Renders one instruction the way the disassembler and tracer print it.
    pub fn render_instr(&self, instr: &Instr) -> String {
        render_instr(instr, &self.funcs, &self.host_calls)
    }
}

fn render_operand(operand: &Value, funcs: &[Func], host_calls: &[String]) -> String {
    match operand {
        Value::FuncIndex(i) => match funcs.get(*i) {
            Some(func) => func.name.clone(),
            None => operand.to_string(),
        },
        Value::HostCallIndex(i) => match host_calls.get(*i) {
            Some(name) => name.clone(),
            None => operand.to_string(),
        },
        _ => operand.to_string(),
    }
}

/// Renders `instr` with function and host-call operands shown by name.
pub fn render_instr(instr: &Instr, funcs: &[Func], host_calls: &[String]) -> String {
    let operands = instr
        .operands
        .iter()
        .map(|operand| render_operand(operand, funcs, host_calls))
        .collect::<Vec<_>>()
        .join(", ");
    if operands.is_empty() {
        instr.op.to_string()
    } else {
        format!("{} {}", instr.op, operands)
    }
}

pub fn disassemble(image: &Image) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "stack_size: {}", image.stack_size);
    let _ = writeln!(out, "globals: {}", image.global_data_size);
    match image.main_func.and_then(|i| image.funcs.get(i)) {
        Some(main) => {
            let _ = writeln!(out, "main: {}", main.name);
        }
        None => {
            let _ = writeln!(out, "main: none");
        }
    }
    let _ = writeln!(out, "priority: {}", image.priority);

    for (ip, instr) in image.instrs.iter().enumerate() {
        for (index, func) in image.funcs.iter().enumerate() {
            if func.entry_point == ip {
                let _ = writeln!(
                    out,
                    "\n{}: ; func#{} params={} locals={}",
                    func.name, index, func.param_count, func.local_data_size
                );
            }
        }
        let _ = writeln!(out, "{:04} {}", ip, image.render_instr(instr));
    }
    out
}

/// Assembles an [`Image`] in memory, one function at a time.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    image: Image,
    explicit_main: bool,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            image: Image {
                stack_size: 0,
                global_data_size: 0,
                main_func: None,
                priority: Priority::Medium,
                instrs: Vec::new(),
                funcs: Vec::new(),
                host_calls: Vec::new(),
            },
            explicit_main: false,
        }
    }

    pub fn stack_size(mut self, slots: u32) -> Self {
        self.image.stack_size = slots;
        self
    }

    pub fn globals(mut self, slots: u32) -> Self {
        self.image.global_data_size = slots;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.image.priority = priority;
        self
    }

    /// Overrides `_Main` detection; `None` builds an image without a main.
    pub fn main(mut self, func: Option<usize>) -> Self {
        self.image.main_func = func;
        self.explicit_main = true;
        self
    }

    /// Starts a function at the next instruction and returns its index.
    pub fn func(&mut self, name: &str, param_count: u8, local_data_size: u32) -> usize {
        self.image.funcs.push(Func {
            name: name.to_string(),
            entry_point: self.image.instrs.len(),
            param_count,
            local_data_size,
        });
        self.image.funcs.len() - 1
    }

    /// Index of `name` in the host-call table, adding it on first use.
    pub fn host_call(&mut self, name: &str) -> usize {
        if let Some(index) = self
            .image
            .host_calls
            .iter()
            .position(|existing| existing.eq_ignore_ascii_case(name))
        {
            return index;
        }
        self.image.host_calls.push(name.to_string());
        self.image.host_calls.len() - 1
    }

    /// Appends an instruction and returns its index.
    pub fn emit(&mut self, op: OpCode, operands: &[Value]) -> usize {
        self.image.instrs.push(Instr::new(op, operands.to_vec()));
        self.image.instrs.len() - 1
    }

    /// Next instruction index, for forward jump targets.
    pub fn here(&self) -> usize {
        self.image.instrs.len()
    }

    /// Rewrites operand `operand` of an already emitted instruction.
    pub fn patch(&mut self, instr: usize, operand: usize, value: Value) {
        if let Some(slot) = self
            .image
            .instrs
            .get_mut(instr)
            .and_then(|instr| instr.operands.get_mut(operand))
        {
            *slot = value;
        }
    }

    pub fn build(mut self) -> Image {
        if !self.explicit_main {
            self.image.main_func = self.image.find_func("_Main");
        }
        self.image
    }
}
