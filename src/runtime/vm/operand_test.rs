use crate::{
    bytecode::{
        image::{Image, ImageBuilder, Instr, Priority},
        op_code::OpCode,
    },
    runtime::{
        error::Fault,
        script::Script,
        stack::RuntimeStack,
        value::{Register, Value},
    },
};

use super::operand::Location;

fn script_with(globals: u32, locals: u32) -> Script {
    let mut b = ImageBuilder::new().globals(globals);
    b.func("_Main", 0, locals);
    b.emit(OpCode::Ret, &[]);
    let image: Image = b.build();
    let mut script = Script::new(image, RuntimeStack::new(32).unwrap(), Priority::Medium, 40);
    script.reset().unwrap();
    script
}

fn instr(operands: &[Value]) -> Instr {
    Instr::new(OpCode::Mov, operands.to_vec())
}

#[test]
fn frame_relative_index_counts_down_from_frame_base() {
    let script = script_with(2, 3);
    let base = script.stack.frame_base();
    assert_eq!(base, 2 + 3 + 1);

    for k in 1..=base as i32 {
        let location = script.location(&instr(&[Value::StackIndex(-k)]), 0).unwrap();
        assert_eq!(location, Location::Stack(base - k as usize));
    }
}

#[test]
fn relative_index_reads_offset_slot() {
    let mut script = script_with(4, 2);
    script.stack.set(1, Value::Int(2)).unwrap();
    script.stack.set(-2, Value::Int(-1)).unwrap();

    let absolute = instr(&[Value::RelStackIndex {
        base: 0,
        offset_index: 1,
    }]);
    assert_eq!(script.location(&absolute, 0), Ok(Location::Stack(2)));

    let frame_relative = instr(&[Value::RelStackIndex {
        base: -2,
        offset_index: -2,
    }]);
    let base = script.stack.frame_base();
    assert_eq!(script.location(&frame_relative, 0), Ok(Location::Stack(base - 3)));
}

#[test]
fn register_operand_is_ret_val() {
    let mut script = script_with(0, 0);
    let op = instr(&[Value::Register(Register::RetVal)]);
    let location = script.location(&op, 0).unwrap();
    *script.slot_mut(location) = Value::Float(1.25);

    assert_eq!(script.ret_val(), &Value::Float(1.25));
    assert_eq!(script.operand_value(&op, 0), Ok(&Value::Float(1.25)));
}

#[test]
fn immediates_read_as_themselves_but_are_not_locations() {
    let script = script_with(1, 0);
    let op = instr(&[Value::String("hi".into()), Value::InstrIndex(4)]);

    assert_eq!(script.source_location(&op, 0), Ok(None));
    assert_eq!(script.operand_string(&op, 0), Ok("hi".to_string()));
    assert_eq!(script.instr_target(&op, 1), Ok(4));
    assert_eq!(
        script.location(&op, 0),
        Err(Fault::NotAssignable {
            operand: 0,
            kind: "string"
        })
    );
}

#[test]
fn missing_and_mistyped_operands_fault() {
    let script = script_with(1, 0);
    let op = instr(&[Value::Int(1)]);

    assert_eq!(
        script.operand_value(&op, 1),
        Err(Fault::MissingOperand { operand: 1 })
    );
    assert_eq!(
        script.func_target(&op, 0),
        Err(Fault::OperandKind {
            operand: 0,
            expected: "function index",
            found: "int"
        })
    );
}

#[test]
fn index_below_stack_bottom_faults() {
    let script = script_with(1, 0);
    let op = instr(&[Value::StackIndex(-10)]);

    assert!(matches!(
        script.location(&op, 0),
        Err(Fault::StackIndexOutOfRange { index: -8, .. })
    ));
}
