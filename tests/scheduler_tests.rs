mod common;

use std::{cell::RefCell, rc::Rc};

use common::{RET_VAL, counter, global_int, manual_vm};
use xvm::{
    bytecode::{
        image::{ImageBuilder, Priority},
        op_code::OpCode,
    },
    runtime::{
        host_api::HostScope,
        script::ThreadHandle,
        value::Value,
        vm::{RunOutcome, Timeslice, Vm},
    },
};

#[test]
fn test_round_robin_turns_follow_total_timeslice() {
    let (mut vm, _) = manual_vm();
    let slices = [5u32, 10, 20];
    let threads: Vec<ThreadHandle> = slices
        .iter()
        .map(|&ms| vm.load_image(counter(Priority::User(ms)), None).unwrap())
        .collect();
    for &thread in &threads {
        vm.start_script(thread).unwrap();
    }

    // A turn lasts until the clock passes start + timeslice, i.e. t + 1 ticks.
    let window = 3800;
    assert_eq!(vm.run_scripts(Timeslice::Millis(window)), RunOutcome::Budget);

    let per_round: u64 = slices.iter().map(|&ms| u64::from(ms) + 1).sum();
    let expected = window / per_round;
    let stats: Vec<_> = threads
        .iter()
        .map(|&thread| vm.thread_stats(thread).unwrap())
        .collect();
    for s in &stats {
        assert!(
            s.turns.abs_diff(expected) <= 2,
            "expected about {} turns, got {:?}",
            expected,
            stats
        );
    }
    assert!(stats[2].instructions > 3 * stats[0].instructions);
    assert!(stats[1].instructions > stats[0].instructions);
}

#[test]
fn test_higher_priority_gets_longer_turns_not_more_turns() {
    let (mut vm, _) = manual_vm();
    let low = vm.load_image(counter(Priority::Low), None).unwrap();
    let high = vm.load_image(counter(Priority::High), None).unwrap();
    vm.start_script(low).unwrap();
    vm.start_script(high).unwrap();

    vm.run_scripts(Timeslice::Millis(2000));

    let (l, h) = (vm.thread_stats(low).unwrap(), vm.thread_stats(high).unwrap());
    assert!(l.turns.abs_diff(h.turns) <= 1);
    assert!(global_int(&vm, high) > global_int(&vm, low));
}

#[test]
fn test_synchronous_call_freezes_other_threads() {
    let (mut vm, _) = manual_vm();
    let background = vm.load_image(counter(Priority::Low), None).unwrap();

    let mut b = ImageBuilder::new();
    let probe = b.host_call("Probe");
    b.func("Slow", 0, 1);
    b.emit(OpCode::Mov, &[Value::StackIndex(-2), Value::Int(0)]);
    let top = b.emit(OpCode::CallHost, &[Value::HostCallIndex(probe)]);
    b.emit(OpCode::Inc, &[Value::StackIndex(-2)]);
    b.emit(
        OpCode::Jl,
        &[Value::StackIndex(-2), Value::Int(50), Value::InstrIndex(top)],
    );
    b.emit(OpCode::Mov, &[RET_VAL, Value::StackIndex(-2)]);
    b.emit(OpCode::Ret, &[]);
    let caller = vm.load_image(b.build(), None).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    vm.register_host_api(
        HostScope::Thread(caller),
        "Probe",
        Rc::new(move |vm: &mut Vm, _: ThreadHandle| {
            sink.borrow_mut()
                .push((vm.instruction_pointer(background), global_int(vm, background)));
        }),
    );

    vm.start_script(background).unwrap();
    vm.run_scripts(Timeslice::Millis(25));
    let before = (vm.instruction_pointer(background), global_int(&vm, background));
    assert!(before.1 > 0);

    vm.call_script_func(caller, "Slow").unwrap();

    assert_eq!(vm.return_value_as_int(caller), 50);
    let seen = seen.borrow();
    assert_eq!(seen.len(), 50);
    assert!(seen.iter().all(|probe| *probe == before));
    assert!(vm.is_running(background));

    vm.run_scripts(Timeslice::Millis(25));
    assert!(global_int(&vm, background) > before.1);
}

#[test]
fn test_host_callback_can_call_into_another_thread() {
    let (mut vm, _) = manual_vm();

    let mut b = ImageBuilder::new();
    b.func("Answer", 0, 0);
    b.emit(OpCode::Mov, &[RET_VAL, Value::Int(41)]);
    b.emit(OpCode::Ret, &[]);
    let helper = vm.load_image(b.build(), None).unwrap();

    let mut b = ImageBuilder::new().globals(1);
    let ask = b.host_call("Ask");
    b.func("_Main", 0, 0);
    b.emit(OpCode::CallHost, &[Value::HostCallIndex(ask)]);
    b.emit(OpCode::Mov, &[Value::StackIndex(0), RET_VAL]);
    b.emit(OpCode::Exit, &[Value::Int(0)]);
    let main = vm.load_image(b.build(), None).unwrap();

    vm.register_host_api(
        HostScope::Global,
        "Ask",
        Rc::new(move |vm: &mut Vm, thread: ThreadHandle| {
            let answer = match vm.call_script_func(helper, "Answer") {
                Ok(()) => vm.return_value_as_int(helper) + 1,
                Err(_) => -1,
            };
            vm.return_int(thread, 0, answer);
        }),
    );
    vm.start_script(main).unwrap();

    assert_eq!(vm.run_scripts(Timeslice::Infinite), RunOutcome::Idle);
    assert_eq!(global_int(&vm, main), 42);
    assert!(!vm.is_running(helper));
}
