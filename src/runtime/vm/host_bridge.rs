use crate::runtime::{
    error::VmError,
    script::ThreadHandle,
    value::Value,
};

use super::Vm;

/// Host side of the call bridge: arguments for script calls, results of
/// synchronous calls, and the accessors host callbacks use on the caller's
/// stack.
impl Vm {
    /// Pushes an argument for the next `call_script_func`/`invoke_script_func`.
    /// Arguments go in the order the script function pops them.
    pub fn pass_int_param(&mut self, thread: ThreadHandle, value: i32) -> Result<(), VmError> {
        self.pass_param(thread, Value::Int(value))
    }

    pub fn pass_float_param(&mut self, thread: ThreadHandle, value: f32) -> Result<(), VmError> {
        self.pass_param(thread, Value::Float(value))
    }

    pub fn pass_string_param(&mut self, thread: ThreadHandle, value: &str) -> Result<(), VmError> {
        self.pass_param(thread, Value::String(value.to_string()))
    }

    fn pass_param(&mut self, thread: ThreadHandle, value: Value) -> Result<(), VmError> {
        self.script_mut(thread)?.stack.push(value)?;
        Ok(())
    }

    /// `_RetVal` of `thread`, `Null` for an unknown thread.
    pub fn return_value(&self, thread: ThreadHandle) -> Value {
        self.script(thread)
            .map(|script| script.ret_val.clone())
            .unwrap_or_default()
    }

    pub fn return_value_as_int(&self, thread: ThreadHandle) -> i32 {
        self.script(thread)
            .map(|script| script.ret_val.coerce_int())
            .unwrap_or(0)
    }

    pub fn return_value_as_float(&self, thread: ThreadHandle) -> f32 {
        self.script(thread)
            .map(|script| script.ret_val.coerce_float())
            .unwrap_or(0.0)
    }

    pub fn return_value_as_string(&self, thread: ThreadHandle) -> String {
        self.script(thread)
            .map(|script| script.ret_val.coerce_string())
            .unwrap_or_default()
    }

    /// Parameter `index` of a host call, counted from the top of the caller's
    /// stack: `0` is the last value pushed.
    pub fn param(&self, thread: ThreadHandle, index: usize) -> Option<&Value> {
        self.script(thread).ok()?.stack.peek(index).ok()
    }

    pub fn param_as_int(&self, thread: ThreadHandle, index: usize) -> i32 {
        self.param(thread, index).map(Value::coerce_int).unwrap_or(0)
    }

    pub fn param_as_float(&self, thread: ThreadHandle, index: usize) -> f32 {
        self.param(thread, index).map(Value::coerce_float).unwrap_or(0.0)
    }

    pub fn param_as_string(&self, thread: ThreadHandle, index: usize) -> String {
        self.param(thread, index)
            .map(Value::coerce_string)
            .unwrap_or_default()
    }

    /// Pops `params` parameters and leaves `_RetVal` untouched.
    pub fn return_void(&mut self, thread: ThreadHandle, params: usize) {
        self.host_return(thread, params, None);
    }

    pub fn return_int(&mut self, thread: ThreadHandle, params: usize, value: i32) {
        self.host_return(thread, params, Some(Value::Int(value)));
    }

    pub fn return_float(&mut self, thread: ThreadHandle, params: usize, value: f32) {
        self.host_return(thread, params, Some(Value::Float(value)));
    }

    pub fn return_string(&mut self, thread: ThreadHandle, params: usize, value: &str) {
        self.host_return(thread, params, Some(Value::String(value.to_string())));
    }

    /// Popping more slots than the stack holds faults the thread. Popping a
    /// count other than what the script pushed is not detected.
    fn host_return(&mut self, thread: ThreadHandle, params: usize, value: Option<Value>) {
        let Ok(script) = self.script_mut(thread) else {
            return;
        };
        if let Some(value) = value {
            script.ret_val = value;
        }
        if let Err(fault) = script.stack.pop_frame(params) {
            self.fault_thread(thread, fault);
        }
    }
}
