use std::io::Read;

use sha2::{Digest, Sha256};

use crate::{
    bytecode::{image::Image, op_code::OpCode},
    runtime::{error::LoadError, value::Value},
};

use super::serialization::read_u8;

pub(super) fn validate_magic<R: Read>(reader: &mut R, magic: &[u8; 4]) -> Result<(), LoadError> {
    let mut buf = [0u8; 4];
    // A stream too short to hold the magic is not an XSE file at all.
    reader
        .read_exact(&mut buf)
        .map_err(|_| LoadError::InvalidFormat)?;
    if &buf == magic {
        Ok(())
    } else {
        Err(LoadError::InvalidFormat)
    }
}

pub(super) fn validate_version<R: Read>(
    reader: &mut R,
    expected: (u8, u8),
) -> Result<(u8, u8), LoadError> {
    let major = read_u8(reader)?;
    let minor = read_u8(reader)?;
    if (major, minor) == expected {
        Ok((major, minor))
    } else {
        Err(LoadError::UnsupportedVersion { major, minor })
    }
}

/// Checks every table reference in `image` so the interpreter can index its
/// function, instruction and host-call tables without bounds faults.
pub fn validate_image(image: &Image) -> Result<(), LoadError> {
    let instr_count = image.instrs.len();
    let func_count = image.funcs.len();

    if let Some(main) = image.main_func.filter(|main| *main >= func_count) {
        return Err(LoadError::malformed(format!(
            "_Main index {} out of range ({} functions)",
            main, func_count
        )));
    }

    for (index, func) in image.funcs.iter().enumerate() {
        if func.entry_point >= instr_count {
            return Err(LoadError::malformed(format!(
                "function #{} `{}` entry point {} out of range ({} instructions)",
                index, func.name, func.entry_point, instr_count
            )));
        }
    }

    for (ip, instr) in image.instrs.iter().enumerate() {
        let expected = instr.op.operand_count();
        if instr.operands.len() != expected {
            return Err(LoadError::malformed(format!(
                "instruction {} {}: expected {} operands, found {}",
                ip,
                instr.op,
                expected,
                instr.operands.len()
            )));
        }

        for operand in &instr.operands {
            let in_range = match operand {
                Value::InstrIndex(target) => *target < instr_count,
                Value::FuncIndex(func) => *func < func_count,
                Value::HostCallIndex(call) => *call < image.host_calls.len(),
                _ => true,
            };
            if !in_range {
                return Err(LoadError::malformed(format!(
                    "instruction {} {}: operand {} out of range",
                    ip, instr.op, operand
                )));
            }
        }

        let target_kind_ok = match instr.op {
            OpCode::Jmp => matches!(instr.operands[0], Value::InstrIndex(_)),
            OpCode::Je | OpCode::Jne | OpCode::Jg | OpCode::Jl | OpCode::Jge | OpCode::Jle => {
                matches!(instr.operands[2], Value::InstrIndex(_))
            }
            OpCode::Call => matches!(instr.operands[0], Value::FuncIndex(_)),
            OpCode::CallHost => matches!(instr.operands[0], Value::HostCallIndex(_)),
            _ => true,
        };
        if !target_kind_ok {
            return Err(LoadError::malformed(format!(
                "instruction {} {}: wrong target operand kind",
                ip, instr.op
            )));
        }
    }
    Ok(())
}

pub fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

pub fn to_hex(bytes: &[u8; 32]) -> String {
    let mut out = String::with_capacity(64);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
