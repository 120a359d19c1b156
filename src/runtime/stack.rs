use crate::runtime::{
    error::{Fault, LoadError},
    value::Value,
};

/// Per-thread value stack.
///
/// `top` is the next free slot and `frame_base` the top of the stack at the
/// moment the current frame was pushed. Negative indices are frame-relative:
/// `-1` is the slot just below `frame_base`. Slots above `top` may hold stale
/// values; they are overwritten on the next push.
#[derive(Debug, Clone)]
pub struct RuntimeStack {
    slots: Vec<Value>,
    top: usize,
    frame_base: usize,
}

impl RuntimeStack {
    pub fn new(capacity: usize) -> Result<Self, LoadError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| LoadError::OutOfMemory {
                requested: capacity,
            })?;
        slots.resize(capacity, Value::Null);
        Ok(Self {
            slots,
            top: 0,
            frame_base: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn frame_base(&self) -> usize {
        self.frame_base
    }

    pub fn set_frame_base(&mut self, frame_base: usize) {
        self.frame_base = frame_base;
    }

    /// Slots `0..top`.
    pub fn live(&self) -> &[Value] {
        &self.slots[..self.top]
    }

    /// Translates a possibly frame-relative index into an absolute slot.
    pub fn resolve_index(&self, index: i32) -> Result<usize, Fault> {
        let absolute = if index < 0 {
            self.frame_base as i64 + i64::from(index)
        } else {
            i64::from(index)
        };
        if absolute < 0 || absolute >= self.slots.len() as i64 {
            return Err(Fault::StackIndexOutOfRange {
                index: absolute,
                top: self.top,
                capacity: self.slots.len(),
            });
        }
        Ok(absolute as usize)
    }

    pub fn get(&self, index: i32) -> Result<&Value, Fault> {
        let slot = self.resolve_index(index)?;
        Ok(&self.slots[slot])
    }

    pub fn get_mut(&mut self, index: i32) -> Result<&mut Value, Fault> {
        let slot = self.resolve_index(index)?;
        Ok(&mut self.slots[slot])
    }

    pub fn set(&mut self, index: i32, value: Value) -> Result<(), Fault> {
        *self.get_mut(index)? = value;
        Ok(())
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> &mut Value {
        &mut self.slots[slot]
    }

    pub(crate) fn slot(&self, slot: usize) -> &Value {
        &self.slots[slot]
    }

    pub fn push(&mut self, value: Value) -> Result<(), Fault> {
        if self.top >= self.slots.len() {
            return Err(Fault::StackOverflow {
                capacity: self.slots.len(),
            });
        }
        self.slots[self.top] = value;
        self.top += 1;
        Ok(())
    }

    /// Decrements `top`, then copies the value out of the new top slot.
    pub fn pop(&mut self) -> Result<Value, Fault> {
        if self.top == 0 {
            return Err(Fault::StackUnderflow);
        }
        self.top -= 1;
        Ok(self.slots[self.top].clone())
    }

    /// Value `depth` slots below the top; `0` is the most recent push.
    pub fn peek(&self, depth: usize) -> Result<&Value, Fault> {
        if depth >= self.top {
            return Err(Fault::StackUnderflow);
        }
        Ok(&self.slots[self.top - 1 - depth])
    }

    pub fn push_frame(&mut self, size: usize) -> Result<(), Fault> {
        let new_top = self.top + size;
        if new_top > self.slots.len() {
            return Err(Fault::StackOverflow {
                capacity: self.slots.len(),
            });
        }
        self.top = new_top;
        self.frame_base = new_top;
        Ok(())
    }

    /// Drops `size` slots. The caller restores `frame_base` itself.
    pub fn pop_frame(&mut self, size: usize) -> Result<(), Fault> {
        if size > self.top {
            return Err(Fault::StackUnderflow);
        }
        self.top -= size;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.top = 0;
        self.frame_base = 0;
        self.slots.fill(Value::Null);
    }
}
