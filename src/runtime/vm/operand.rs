use crate::{
    bytecode::image::Instr,
    runtime::{
        error::Fault,
        script::Script,
        value::{Register, Value},
    },
};

/// Resolved storage behind a destination operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Location {
    Stack(usize),
    RetVal,
}

impl Script {
    fn operand<'a>(&'a self, instr: &'a Instr, operand: usize) -> Result<&'a Value, Fault> {
        instr
            .operands
            .get(operand)
            .ok_or(Fault::MissingOperand { operand })
    }

    /// Absolute slot of a stack operand. A relative index adds the integer
    /// held at `offset_index` to `base`.
    fn stack_slot(&self, operand: &Value) -> Result<Option<usize>, Fault> {
        match *operand {
            Value::StackIndex(index) => self.stack.resolve_index(index).map(Some),
            Value::RelStackIndex { base, offset_index } => {
                let offset = self.stack.get(offset_index)?.coerce_int();
                self.stack.resolve_index(base.wrapping_add(offset)).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Storage an operand refers to, or `None` for immediates.
    pub(super) fn source_location(
        &self,
        instr: &Instr,
        operand: usize,
    ) -> Result<Option<Location>, Fault> {
        let value = self.operand(instr, operand)?;
        if let Value::Register(Register::RetVal) = value {
            return Ok(Some(Location::RetVal));
        }
        Ok(self.stack_slot(value)?.map(Location::Stack))
    }

    pub(super) fn location(&self, instr: &Instr, operand: usize) -> Result<Location, Fault> {
        match self.source_location(instr, operand)? {
            Some(location) => Ok(location),
            None => Err(Fault::NotAssignable {
                operand,
                kind: self.operand(instr, operand)?.type_name(),
            }),
        }
    }

    /// The value an operand reads: the literal itself, or the contents of the
    /// slot or register it names.
    pub(super) fn operand_value<'a>(
        &'a self,
        instr: &'a Instr,
        operand: usize,
    ) -> Result<&'a Value, Fault> {
        match self.source_location(instr, operand)? {
            Some(location) => Ok(self.slot(location)),
            None => self.operand(instr, operand),
        }
    }

    pub(super) fn operand_int(&self, instr: &Instr, operand: usize) -> Result<i32, Fault> {
        self.operand_value(instr, operand).map(Value::coerce_int)
    }

    pub(super) fn operand_string(&self, instr: &Instr, operand: usize) -> Result<String, Fault> {
        self.operand_value(instr, operand).map(Value::coerce_string)
    }

    pub(super) fn instr_target(&self, instr: &Instr, operand: usize) -> Result<usize, Fault> {
        match self.operand(instr, operand)? {
            Value::InstrIndex(target) => Ok(*target),
            other => Err(Fault::OperandKind {
                operand,
                expected: "instruction index",
                found: other.type_name(),
            }),
        }
    }

    pub(super) fn func_target(&self, instr: &Instr, operand: usize) -> Result<usize, Fault> {
        match self.operand(instr, operand)? {
            Value::FuncIndex(func) => Ok(*func),
            other => Err(Fault::OperandKind {
                operand,
                expected: "function index",
                found: other.type_name(),
            }),
        }
    }

    pub(super) fn host_call_target(&self, instr: &Instr, operand: usize) -> Result<usize, Fault> {
        match self.operand(instr, operand)? {
            Value::HostCallIndex(call) => Ok(*call),
            other => Err(Fault::OperandKind {
                operand,
                expected: "host call index",
                found: other.type_name(),
            }),
        }
    }

    pub(super) fn slot(&self, location: Location) -> &Value {
        match location {
            Location::Stack(slot) => self.stack.slot(slot),
            Location::RetVal => &self.ret_val,
        }
    }

    pub(super) fn slot_mut(&mut self, location: Location) -> &mut Value {
        match location {
            Location::Stack(slot) => self.stack.slot_mut(slot),
            Location::RetVal => &mut self.ret_val,
        }
    }
}
