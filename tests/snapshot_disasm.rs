use xvm::{
    bytecode::{
        image::{Image, ImageBuilder, Priority, disassemble},
        op_code::OpCode,
        xse,
    },
    runtime::value::{Register, Value},
};

const RET_VAL: Value = Value::Register(Register::RetVal);

fn disassemble_decoded(image: &Image) -> String {
    let decoded = xse::decode(&xse::encode(image)).unwrap();
    disassemble(&decoded)
}

#[test]
fn snapshot_disasm_calls_and_branches() {
    let mut b = ImageBuilder::new()
        .stack_size(256)
        .globals(1)
        .priority(Priority::High);
    let print = b.host_call("PrintString");
    b.func("_Main", 0, 1);
    b.emit(OpCode::Mov, &[Value::StackIndex(-2), Value::String("hi".into())]);
    b.emit(OpCode::Push, &[Value::StackIndex(-2)]);
    let call = b.emit(OpCode::Call, &[Value::FuncIndex(0)]);
    b.emit(OpCode::CallHost, &[Value::HostCallIndex(print)]);
    let branch = b.emit(
        OpCode::Jge,
        &[RET_VAL, Value::Float(0.5), Value::InstrIndex(0)],
    );
    b.emit(OpCode::Exit, &[Value::Int(1)]);
    let done = b.emit(OpCode::Exit, &[Value::Int(0)]);
    b.patch(branch, 2, Value::InstrIndex(done));
    let shout = b.func("Shout", 1, 0);
    b.patch(call, 0, Value::FuncIndex(shout));
    b.emit(OpCode::Mov, &[RET_VAL, Value::StackIndex(-3)]);
    b.emit(OpCode::Concat, &[RET_VAL, Value::String("!\n".into())]);
    b.emit(
        OpCode::Mov,
        &[
            Value::StackIndex(0),
            Value::RelStackIndex {
                base: 2,
                offset_index: -2,
            },
        ],
    );
    b.emit(OpCode::Ret, &[]);

    let out = disassemble_decoded(&b.build());

    insta::assert_snapshot!(out.trim_end(), @r#"
    stack_size: 256
    globals: 1
    main: _Main
    priority: high

    _Main: ; func#0 params=0 locals=1
    0000 MOV [-2], "hi"
    0001 PUSH [-2]
    0002 CALL Shout
    0003 CALLHOST PrintString
    0004 JGE _RetVal, 0.500000, @0006
    0005 EXIT 1
    0006 EXIT 0

    Shout: ; func#1 params=1 locals=0
    0007 MOV _RetVal, [-3]
    0008 CONCAT _RetVal, "!\n"
    0009 MOV [0], [2 + [-2]]
    0010 RET
    "#);
}

#[test]
fn snapshot_disasm_without_main() {
    let mut b = ImageBuilder::new()
        .priority(Priority::User(25))
        .main(None);
    b.func("Tick", 0, 0);
    let top = b.emit(OpCode::Pause, &[Value::Int(10)]);
    b.emit(OpCode::Shl, &[RET_VAL, Value::Int(1)]);
    b.emit(OpCode::Jmp, &[Value::InstrIndex(top)]);

    let out = disassemble_decoded(&b.build());

    insta::assert_snapshot!(out.trim_end(), @r"
    stack_size: 0
    globals: 0
    main: none
    priority: user 25ms

    Tick: ; func#0 params=0 locals=0
    0000 PAUSE 10
    0001 SHL _RetVal, 1
    0002 JMP @0000
    ");
}
