//! XSE executable format.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! "XSE0" | major u8 | minor u8
//! stack_size u32 | global_data_size u32
//! main_present u8 | main_index u32
//! priority_type u8 | user_timeslice u32
//! instr_count u32 { opcode u16 | operand_count u8 | operands }
//! string_count u32 { len u32 | bytes }
//! func_count u32 { entry u32 | params u8 | locals u32 | name_len u8 | name }
//! host_call_count u32 { name_len u8 | name }
//! ```
//!
//! Each operand is a tag byte followed by its payload; a relative stack
//! index carries two `i32`s, every other payload is four bytes. String
//! operands reference the string table and are replaced by owned copies of
//! the referenced text while decoding.
use std::io::{Cursor, Read, Write};

use crate::{
    bytecode::{
        image::{Func, Image, Instr, Priority},
        op_code::OpCode,
        operand::OperandTag,
    },
    runtime::{
        error::LoadError,
        value::{Register, Value},
    },
};

mod serialization;
mod validation;

use serialization::{
    read_f32, read_i32, read_long_string, read_short_string, read_u8, read_u16, read_u32,
    write_f32, write_i32, write_long_string, write_short_string, write_u8, write_u16, write_u32,
};
use validation::{validate_magic, validate_version};

pub use validation::{hash_bytes, to_hex, validate_image};

pub const MAGIC: &[u8; 4] = b"XSE0";
pub const VERSION: (u8, u8) = (0, 8);

/// Upper bound for `Vec::with_capacity` on counts read from the image, so a
/// corrupt count cannot request an enormous allocation up front.
const MAX_PREALLOC: usize = 4096;

/// A string operand waiting for the string table: (instr, operand, string).
type StringPatch = (usize, usize, u32);

pub fn decode(bytes: &[u8]) -> Result<Image, LoadError> {
    let mut reader = Cursor::new(bytes);

    validate_magic(&mut reader, MAGIC)?;
    validate_version(&mut reader, VERSION)?;

    let stack_size = read_u32(&mut reader)?;
    let global_data_size = read_u32(&mut reader)?;
    let main_present = read_u8(&mut reader)? != 0;
    let main_index = read_u32(&mut reader)? as usize;
    let priority_code = read_u8(&mut reader)?;
    let user_timeslice = read_u32(&mut reader)?;
    let priority = Priority::from_code(priority_code, user_timeslice).ok_or_else(|| {
        LoadError::malformed(format!("unknown priority type {}", priority_code))
    })?;

    let instr_count = read_u32(&mut reader)? as usize;
    let mut instrs = Vec::with_capacity(instr_count.min(MAX_PREALLOC));
    let mut patches: Vec<StringPatch> = Vec::new();
    for ip in 0..instr_count {
        let code = read_u16(&mut reader)?;
        let op = OpCode::try_from(code)
            .map_err(|code| LoadError::malformed(format!("instruction {}: opcode {}", ip, code)))?;
        let operand_count = read_u8(&mut reader)? as usize;
        let mut operands = Vec::with_capacity(operand_count);
        for slot in 0..operand_count {
            match read_operand(&mut reader, ip)? {
                RawOperand::Value(value) => operands.push(value),
                RawOperand::StringIndex(string_index) => {
                    patches.push((ip, slot, string_index));
                    operands.push(Value::Null);
                }
            }
        }
        instrs.push(Instr::new(op, operands));
    }

    let string_count = read_u32(&mut reader)? as usize;
    let mut strings = Vec::with_capacity(string_count.min(MAX_PREALLOC));
    for _ in 0..string_count {
        strings.push(read_long_string(&mut reader)?);
    }
    for (ip, slot, string_index) in patches {
        let text = strings.get(string_index as usize).ok_or_else(|| {
            LoadError::malformed(format!(
                "instruction {}: string index {} out of range ({} strings)",
                ip, string_index, string_count
            ))
        })?;
        instrs[ip].operands[slot] = Value::String(text.clone());
    }

    let func_count = read_u32(&mut reader)? as usize;
    let mut funcs = Vec::with_capacity(func_count.min(MAX_PREALLOC));
    for _ in 0..func_count {
        let entry_point = read_u32(&mut reader)? as usize;
        let param_count = read_u8(&mut reader)?;
        let local_data_size = read_u32(&mut reader)?;
        let name = read_short_string(&mut reader)?;
        funcs.push(Func {
            name,
            entry_point,
            param_count,
            local_data_size,
        });
    }

    let host_call_count = read_u32(&mut reader)? as usize;
    let mut host_calls = Vec::with_capacity(host_call_count.min(MAX_PREALLOC));
    for _ in 0..host_call_count {
        host_calls.push(read_short_string(&mut reader)?);
    }

    let image = Image {
        stack_size,
        global_data_size,
        main_func: main_present.then_some(main_index),
        priority,
        instrs,
        funcs,
        host_calls,
    };
    validate_image(&image)?;
    Ok(image)
}

enum RawOperand {
    Value(Value),
    StringIndex(u32),
}

fn read_operand<R: Read>(reader: &mut R, ip: usize) -> Result<RawOperand, LoadError> {
    let tag_byte = read_u8(reader)?;
    let tag = OperandTag::try_from(tag_byte).map_err(|tag| {
        LoadError::malformed(format!("instruction {}: operand tag {}", ip, tag))
    })?;
    let value = match tag {
        OperandTag::Int => Value::Int(read_i32(reader)?),
        OperandTag::Float => Value::Float(read_f32(reader)?),
        OperandTag::StringIndex => return Ok(RawOperand::StringIndex(read_u32(reader)?)),
        OperandTag::AbsStackIndex => Value::StackIndex(read_i32(reader)?),
        OperandTag::RelStackIndex => {
            let base = read_i32(reader)?;
            let offset_index = read_i32(reader)?;
            Value::RelStackIndex { base, offset_index }
        }
        OperandTag::InstrIndex => Value::InstrIndex(read_u32(reader)? as usize),
        OperandTag::FuncIndex => Value::FuncIndex(read_u32(reader)? as usize),
        OperandTag::HostCallIndex => Value::HostCallIndex(read_u32(reader)? as usize),
        OperandTag::Register => {
            let code = read_u32(reader)?;
            let register = Register::from_code(code).ok_or_else(|| {
                LoadError::malformed(format!("instruction {}: register {}", ip, code))
            })?;
            Value::Register(register)
        }
    };
    Ok(RawOperand::Value(value))
}

pub fn encode(image: &Image) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_image(&mut out, image);
    out
}

fn write_image<W: Write>(writer: &mut W, image: &Image) -> std::io::Result<()> {
    writer.write_all(MAGIC)?;
    write_u8(writer, VERSION.0)?;
    write_u8(writer, VERSION.1)?;
    write_u32(writer, image.stack_size)?;
    write_u32(writer, image.global_data_size)?;
    write_u8(writer, image.main_func.is_some() as u8)?;
    write_u32(writer, image.main_func.unwrap_or(0) as u32)?;
    write_u8(writer, image.priority.code())?;
    write_u32(writer, image.priority.user_timeslice())?;

    let mut strings: Vec<&str> = Vec::new();
    write_u32(writer, image.instrs.len() as u32)?;
    for instr in &image.instrs {
        write_u16(writer, instr.op as u16)?;
        let encodable: Vec<&Value> = instr
            .operands
            .iter()
            .filter(|operand| OperandTag::of(operand).is_some())
            .collect();
        write_u8(writer, encodable.len() as u8)?;
        for operand in encodable {
            write_operand(writer, operand, &mut strings)?;
        }
    }

    write_u32(writer, strings.len() as u32)?;
    for text in &strings {
        write_long_string(writer, text)?;
    }

    write_u32(writer, image.funcs.len() as u32)?;
    for func in &image.funcs {
        write_u32(writer, func.entry_point as u32)?;
        write_u8(writer, func.param_count)?;
        write_u32(writer, func.local_data_size)?;
        write_short_string(writer, &func.name)?;
    }

    write_u32(writer, image.host_calls.len() as u32)?;
    for name in &image.host_calls {
        write_short_string(writer, name)?;
    }
    Ok(())
}

fn write_operand<'a, W: Write>(
    writer: &mut W,
    operand: &'a Value,
    strings: &mut Vec<&'a str>,
) -> std::io::Result<()> {
    let Some(tag) = OperandTag::of(operand) else {
        return Ok(());
    };
    write_u8(writer, tag as u8)?;
    match operand {
        Value::Int(v) => write_i32(writer, *v),
        Value::Float(v) => write_f32(writer, *v),
        Value::String(text) => {
            let index = match strings.iter().position(|existing| *existing == text.as_str()) {
                Some(index) => index,
                None => {
                    strings.push(text.as_str());
                    strings.len() - 1
                }
            };
            write_u32(writer, index as u32)
        }
        Value::StackIndex(i) => write_i32(writer, *i),
        Value::RelStackIndex { base, offset_index } => {
            write_i32(writer, *base)?;
            write_i32(writer, *offset_index)
        }
        Value::InstrIndex(i) | Value::FuncIndex(i) | Value::HostCallIndex(i) => {
            write_u32(writer, *i as u32)
        }
        Value::Register(register) => write_u32(writer, register.code()),
        Value::Null | Value::CallMarker(_) | Value::StackBaseMarker(_) => Ok(()),
    }
}
