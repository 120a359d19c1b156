use crate::runtime::{error::Fault, stack::RuntimeStack, value::Value};

fn stack(capacity: usize) -> RuntimeStack {
    RuntimeStack::new(capacity).unwrap()
}

#[test]
fn push_then_pop_round_trips_every_literal() {
    let mut s = stack(8);
    for value in [
        Value::Int(-4),
        Value::Float(0.5),
        Value::String("hello".into()),
        Value::InstrIndex(9),
    ] {
        s.push(value.clone()).unwrap();
        assert_eq!(s.pop().unwrap(), value);
        assert_eq!(s.top(), 0);
    }
}

#[test]
fn popped_string_is_an_independent_copy() {
    let mut s = stack(4);
    s.push(Value::String("abc".into())).unwrap();
    let mut popped = s.pop().unwrap();
    if let Value::String(text) = &mut popped {
        text.clear();
    }
    // The stale slot above top still holds the original text.
    assert_eq!(s.get(0).unwrap(), &Value::String("abc".into()));
}

#[test]
fn pop_reads_the_decremented_top() {
    let mut s = stack(4);
    s.push(Value::Int(1)).unwrap();
    s.push(Value::Int(2)).unwrap();
    assert_eq!(s.pop().unwrap(), Value::Int(2));
    assert_eq!(s.top(), 1);
    assert_eq!(s.pop().unwrap(), Value::Int(1));
    assert_eq!(s.pop().unwrap_err(), Fault::StackUnderflow);
}

#[test]
fn frames_nest_and_restore_top() {
    let mut s = stack(64);
    s.push_frame(4).unwrap();
    let outer_base = s.frame_base();
    let sizes = [3usize, 5, 1, 7];
    let mut saved = Vec::new();
    for size in sizes {
        saved.push((s.top(), s.frame_base()));
        s.push_frame(size).unwrap();
        assert!(s.frame_base() <= s.top());
    }
    for size in sizes.iter().rev() {
        let (top, base) = saved.pop().unwrap();
        s.pop_frame(*size).unwrap();
        s.set_frame_base(base);
        assert_eq!(s.top(), top);
        assert!(s.frame_base() <= s.top());
    }
    assert_eq!(s.frame_base(), outer_base);
}

#[test]
fn negative_indices_are_frame_relative() {
    let mut s = stack(32);
    s.push_frame(10).unwrap();
    let base = s.frame_base();
    for k in 1..=10 {
        assert_eq!(s.resolve_index(-k).unwrap(), base - k as usize);
    }
    s.set(-1, Value::Int(77)).unwrap();
    assert_eq!(s.get(9).unwrap(), &Value::Int(77));
}

#[test]
fn out_of_range_indices_fault() {
    let mut s = stack(4);
    s.push_frame(2).unwrap();
    assert!(matches!(
        s.resolve_index(-3),
        Err(Fault::StackIndexOutOfRange { index: -1, .. })
    ));
    assert!(matches!(
        s.resolve_index(4),
        Err(Fault::StackIndexOutOfRange { index: 4, .. })
    ));
}

#[test]
fn overflow_faults_instead_of_growing() {
    let mut s = stack(2);
    s.push(Value::Int(1)).unwrap();
    s.push(Value::Int(2)).unwrap();
    assert_eq!(
        s.push(Value::Int(3)).unwrap_err(),
        Fault::StackOverflow { capacity: 2 }
    );
    assert!(s.push_frame(1).is_err());
}

#[test]
fn peek_counts_down_from_top() {
    let mut s = stack(4);
    s.push(Value::Int(10)).unwrap();
    s.push(Value::String("s".into())).unwrap();
    assert_eq!(s.peek(0).unwrap(), &Value::String("s".into()));
    assert_eq!(s.peek(1).unwrap(), &Value::Int(10));
    assert!(s.peek(2).is_err());
}

#[test]
fn clear_nulls_every_slot() {
    let mut s = stack(3);
    s.push(Value::Int(1)).unwrap();
    s.push_frame(1).unwrap();
    s.clear();
    assert_eq!(s.top(), 0);
    assert_eq!(s.frame_base(), 0);
    assert_eq!(s.get(0).unwrap(), &Value::Null);
}
