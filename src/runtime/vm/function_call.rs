use crate::runtime::{
    error::{Fault, VmError},
    script::{Script, ThreadHandle},
    value::{FrameLink, Value},
};

use super::{RunOutcome, SchedulerMode, Timeslice, Vm, dispatch::Flow};

impl Script {
    /// Pushes the return address and a frame of `locals + 1` slots whose top
    /// slot links back to the caller. Returns the callee's entry point.
    pub(super) fn call_func(&mut self, func: usize, return_to: usize) -> Result<usize, Fault> {
        let Some(callee) = self.funcs.get(func) else {
            return Err(Fault::OperandKind {
                operand: 0,
                expected: "function index",
                found: "out-of-range index",
            });
        };
        let (entry, locals) = (callee.entry_point, callee.local_data_size as usize);
        let link = FrameLink {
            func,
            caller_frame: self.stack.frame_base(),
        };

        self.stack.push(Value::InstrIndex(return_to))?;
        self.stack.push_frame(locals + 1)?;
        let marker = self.stack.top() - 1;
        *self.stack.slot_mut(marker) = Value::CallMarker(link);
        Ok(entry)
    }

    /// Unwinds the current frame. A null marker is the entry frame pushed by
    /// `reset`: returning from it ends the thread.
    pub(super) fn ret(&mut self, thread: ThreadHandle) -> Result<Flow, Fault> {
        let (link, sync) = match self.stack.pop()? {
            Value::CallMarker(link) => (link, false),
            Value::StackBaseMarker(link) => (link, true),
            Value::Null => {
                self.running = false;
                log::debug!("thread {} returned from its entry frame", thread);
                return Ok(Flow::Stay);
            }
            other => {
                return Err(Fault::BadReturn {
                    found: other.type_name(),
                });
            }
        };
        let Some(func) = self.funcs.get(link.func) else {
            return Err(Fault::BadReturn {
                found: "dangling function index",
            });
        };
        let (locals, frame_size) = (func.local_data_size as usize, func.stack_frame_size());

        let return_to = match self.stack.peek(locals)? {
            Value::InstrIndex(target) => *target,
            other => {
                return Err(Fault::BadReturn {
                    found: other.type_name(),
                });
            }
        };
        self.stack.pop_frame(frame_size)?;
        self.stack.set_frame_base(link.caller_frame);

        Ok(if sync {
            Flow::SyncReturn(return_to)
        } else {
            Flow::Jump(return_to)
        })
    }

    /// Retags the marker `call_func` just wrote so its `RET` ends a
    /// synchronous host call.
    fn mark_stack_base(&mut self) {
        let marker = self.stack.top() - 1;
        if let Value::CallMarker(link) = *self.stack.slot(marker) {
            *self.stack.slot_mut(marker) = Value::StackBaseMarker(link);
        }
    }
}

impl Vm {
    /// Runs the callback behind host call `call`. The instruction pointer
    /// moves past the `CALLHOST` first, so a callback that calls into its own
    /// thread returns to the next instruction and its jump is kept.
    pub(super) fn call_host(
        &mut self,
        thread: ThreadHandle,
        ip: usize,
        call: usize,
    ) -> Result<Flow, Fault> {
        let name = self
            .script(thread)
            .ok()
            .and_then(|script| script.host_calls.get(call).cloned())
            .unwrap_or_default();
        let Some(func) = self.host_api.resolve(&name, thread) else {
            return Err(Fault::UnresolvedHostCall { name });
        };
        if let Ok(script) = self.script_mut(thread) {
            script.code.current = ip + 1;
        }
        func(self, thread);
        Ok(Flow::Stay)
    }

    fn begin_call(&mut self, thread: ThreadHandle, name: &str, sync: bool) -> Result<(), VmError> {
        let script = self.script_mut(thread)?;
        let func = script
            .find_func(name)
            .ok_or_else(|| VmError::UnknownFunction(name.to_string()))?;
        let return_to = script.code.current;
        match script.call_func(func, return_to) {
            Ok(entry) => {
                if sync {
                    script.mark_stack_base();
                }
                script.code.current = entry;
                Ok(())
            }
            Err(fault) => {
                self.fault_thread(thread, fault.clone());
                Err(fault.into())
            }
        }
    }

    /// Calls a script function and blocks until it returns.
    ///
    /// Scheduling is pinned to `thread` for the duration of the call, so no
    /// other thread advances. The result is left in `_RetVal`. If the thread
    /// exits or faults before the call's frame unwinds the call reports
    /// [`VmError::Aborted`] and the thread should be reset before reuse.
    pub fn call_script_func(&mut self, thread: ThreadHandle, name: &str) -> Result<(), VmError> {
        let was_running = self.script(thread)?.running;
        self.begin_call(thread, name, true)?;
        self.script_mut(thread)?.running = true;

        let saved = self.scheduler;
        self.scheduler.mode = SchedulerMode::Pinned(thread);
        let outcome = self.run_scripts(Timeslice::Infinite);
        self.scheduler = saved;

        match outcome {
            RunOutcome::SyncReturned => {
                if let Ok(script) = self.script_mut(thread) {
                    script.running = was_running;
                }
                Ok(())
            }
            _ => Err(VmError::Aborted),
        }
    }

    /// Sets up a call to a script function without running it. The function
    /// executes on the thread's next scheduling turns, then the thread
    /// resumes where it was.
    pub fn invoke_script_func(&mut self, thread: ThreadHandle, name: &str) -> Result<(), VmError> {
        self.begin_call(thread, name, false)
    }
}
