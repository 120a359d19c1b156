#![allow(dead_code)]

use xvm::{
    bytecode::{
        image::{Image, ImageBuilder, Priority},
        op_code::OpCode,
    },
    runtime::{
        clock::ManualClock,
        config::VmConfig,
        value::{Register, Value},
        vm::Vm,
    },
};

pub const RET_VAL: Value = Value::Register(Register::RetVal);

/// VM on a clock that advances one millisecond per read.
pub fn manual_vm() -> (Vm, ManualClock) {
    let clock = ManualClock::ticking(1);
    let vm = Vm::with_clock(VmConfig::default(), Box::new(clock.clone()));
    (vm, clock)
}

/// `_Main(){ return 2 + 3 * 4; }` as the compiler lowers it.
pub fn arithmetic_main() -> Image {
    let mut b = ImageBuilder::new();
    b.func("_Main", 0, 1);
    let t0 = Value::StackIndex(-2);
    b.emit(OpCode::Push, &[Value::Int(3)]);
    b.emit(OpCode::Push, &[Value::Int(4)]);
    b.emit(OpCode::Pop, &[RET_VAL]);
    b.emit(OpCode::Pop, &[t0.clone()]);
    b.emit(OpCode::Mul, &[t0.clone(), RET_VAL]);
    b.emit(OpCode::Push, &[t0.clone()]);
    b.emit(OpCode::Push, &[Value::Int(2)]);
    b.emit(OpCode::Pop, &[t0.clone()]);
    b.emit(OpCode::Pop, &[RET_VAL]);
    b.emit(OpCode::Add, &[t0.clone(), RET_VAL]);
    b.emit(OpCode::Push, &[t0]);
    b.emit(OpCode::Pop, &[RET_VAL]);
    b.emit(OpCode::Ret, &[]);
    b.build()
}

/// `_Main` increments global 0 forever.
pub fn counter(priority: Priority) -> Image {
    let mut b = ImageBuilder::new().globals(1).priority(priority);
    b.func("_Main", 0, 0);
    b.emit(OpCode::Mov, &[Value::StackIndex(0), Value::Int(0)]);
    let top = b.emit(OpCode::Inc, &[Value::StackIndex(0)]);
    b.emit(OpCode::Jmp, &[Value::InstrIndex(top)]);
    b.build()
}

pub fn global_int(vm: &Vm, thread: xvm::ThreadHandle) -> i32 {
    vm.stack_value(thread, 0)
        .map(|value| value.coerce_int())
        .unwrap_or(0)
}
