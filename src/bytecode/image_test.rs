use crate::{
    bytecode::{
        image::{ImageBuilder, Priority},
        op_code::{self, OpCode},
    },
    runtime::value::Value,
};

#[test]
fn builder_detects_main_case_insensitively() {
    let mut b = ImageBuilder::new();
    b.func("Helper", 0, 0);
    b.emit(OpCode::Ret, &[]);
    b.func("_MAIN", 0, 0);
    b.emit(OpCode::Ret, &[]);
    let image = b.build();

    assert_eq!(image.main_func, Some(1));
    assert_eq!(image.funcs[1].entry_point, 1);
}

#[test]
fn explicit_none_main_wins_over_detection() {
    let mut b = ImageBuilder::new().main(None);
    b.func("_Main", 0, 0);
    b.emit(OpCode::Ret, &[]);

    assert_eq!(b.build().main_func, None);
}

#[test]
fn host_calls_are_interned_ignoring_case() {
    let mut b = ImageBuilder::new();
    let first = b.host_call("PrintString");
    let second = b.host_call("printstring");
    let third = b.host_call("PrintInt");

    assert_eq!(first, second);
    assert_eq!(third, 1);
    assert_eq!(b.build().host_calls, vec!["PrintString", "PrintInt"]);
}

#[test]
fn patch_rewrites_forward_jump() {
    let mut b = ImageBuilder::new();
    let jump = b.emit(OpCode::Jmp, &[Value::InstrIndex(0)]);
    b.emit(OpCode::Push, &[Value::Int(1)]);
    let target = b.here();
    b.emit(OpCode::Exit, &[Value::Int(0)]);
    b.patch(jump, 0, Value::InstrIndex(target));

    assert_eq!(b.build().instrs[0].operands, vec![Value::InstrIndex(2)]);
}

#[test]
fn frame_size_covers_params_return_address_and_locals() {
    let mut b = ImageBuilder::new();
    b.func("f", 2, 3);
    b.emit(OpCode::Ret, &[]);

    assert_eq!(b.build().funcs[0].stack_frame_size(), 6);
}

#[test]
fn priority_codes_and_display() {
    assert_eq!(Priority::from_code(0, 25), Some(Priority::User(25)));
    assert_eq!(Priority::from_code(3, 99), Some(Priority::High));
    assert_eq!(Priority::from_code(4, 0), None);
    assert_eq!(Priority::Low.code(), 1);
    assert_eq!(Priority::User(25).to_string(), "user 25ms");
    assert_eq!(Priority::Medium.to_string(), "medium");
}

#[test]
fn operand_counts_match_instruction_shapes() {
    assert_eq!(OpCode::Ret.operand_count(), 0);
    assert_eq!(OpCode::Push.operand_count(), 1);
    assert_eq!(OpCode::Mov.operand_count(), 2);
    assert_eq!(OpCode::SetChar.operand_count(), 3);
    assert_eq!(OpCode::Jle.operand_count(), 3);
    assert_eq!(op_code::ALL.len(), 33);
    for (code, op) in op_code::ALL.iter().enumerate() {
        assert_eq!(OpCode::try_from(code as u16), Ok(*op));
    }
}

#[test]
fn render_instr_names_functions_and_host_calls() {
    let mut b = ImageBuilder::new();
    let print = b.host_call("PrintInt");
    b.func("_Main", 0, 0);
    b.emit(OpCode::Call, &[Value::FuncIndex(0)]);
    b.emit(OpCode::CallHost, &[Value::HostCallIndex(print)]);
    b.emit(OpCode::Mov, &[Value::StackIndex(-2), Value::Float(1.5)]);
    let image = b.build();

    assert_eq!(image.render_instr(&image.instrs[0]), "CALL _Main");
    assert_eq!(image.render_instr(&image.instrs[1]), "CALLHOST PrintInt");
    assert_eq!(image.render_instr(&image.instrs[2]), "MOV [-2], 1.500000");
}
