use crate::runtime::value::{Register, Value};

/// Operand tag bytes as they appear in an XSE instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperandTag {
    Int = 0,
    Float = 1,
    StringIndex = 2,
    AbsStackIndex = 3,
    RelStackIndex = 4,
    InstrIndex = 5,
    FuncIndex = 6,
    HostCallIndex = 7,
    Register = 8,
}

impl TryFrom<u8> for OperandTag {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0 => OperandTag::Int,
            1 => OperandTag::Float,
            2 => OperandTag::StringIndex,
            3 => OperandTag::AbsStackIndex,
            4 => OperandTag::RelStackIndex,
            5 => OperandTag::InstrIndex,
            6 => OperandTag::FuncIndex,
            7 => OperandTag::HostCallIndex,
            8 => OperandTag::Register,
            other => return Err(other),
        })
    }
}

impl OperandTag {
    /// Tag used to encode `value`, or `None` for runtime-only values
    /// (null slots and call-frame markers) that never appear as operands.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Int(_) => Some(OperandTag::Int),
            Value::Float(_) => Some(OperandTag::Float),
            Value::String(_) => Some(OperandTag::StringIndex),
            Value::StackIndex(_) => Some(OperandTag::AbsStackIndex),
            Value::RelStackIndex { .. } => Some(OperandTag::RelStackIndex),
            Value::InstrIndex(_) => Some(OperandTag::InstrIndex),
            Value::FuncIndex(_) => Some(OperandTag::FuncIndex),
            Value::HostCallIndex(_) => Some(OperandTag::HostCallIndex),
            Value::Register(_) => Some(OperandTag::Register),
            Value::Null | Value::CallMarker(_) | Value::StackBaseMarker(_) => None,
        }
    }
}

impl Register {
    pub fn code(self) -> u32 {
        match self {
            Register::RetVal => 0,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Register::RetVal),
            _ => None,
        }
    }
}
