use std::{fs, path::Path};

use serde::Serialize;

use crate::{
    bytecode::{
        image::{Image, Priority},
        xse::{self, hash_bytes, to_hex},
    },
    runtime::{
        clock::{Clock, SystemClock},
        config::VmConfig,
        error::{Fault, LoadError, VmError},
        host_api::{HostApi, HostFn, HostScope, LinearHostApi},
        script::{Script, ThreadHandle, ThreadStats},
        stack::RuntimeStack,
        value::Value,
    },
};

mod dispatch;
mod function_call;
mod host_bridge;
mod operand;
mod scheduler;
mod trace;

pub use scheduler::{RunOutcome, SchedulerMode, Timeslice};
use scheduler::Scheduler;

/// The XtremeScript virtual machine: a set of loaded script threads, the
/// cooperative scheduler that interleaves them, and the host API registry.
pub struct Vm {
    threads: Vec<Option<Script>>,
    host_api: Box<dyn HostApi>,
    scheduler: Scheduler,
    clock: Box<dyn Clock>,
    config: VmConfig,
    trace: bool,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable summary of a loaded thread.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptInfo {
    pub thread: usize,
    pub priority: Priority,
    pub timeslice_ms: u64,
    pub stack_size: usize,
    pub global_data_size: usize,
    pub main: Option<String>,
    pub functions: Vec<String>,
    pub host_calls: Vec<String>,
    pub instructions: usize,
    pub running: bool,
    pub paused: bool,
    pub stats: ThreadStats,
    pub sha256: Option<String>,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_clock(VmConfig::default(), Box::new(SystemClock::new()))
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock::new()))
    }

    pub fn with_clock(config: VmConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            threads: Vec::new(),
            host_api: Box::new(LinearHostApi::new()),
            scheduler: Scheduler::new(),
            clock,
            trace: config.trace,
            config,
        }
    }

    /// Replaces the host API registry, e.g. with a hashed implementation.
    /// Existing registrations are dropped.
    pub fn set_host_api(&mut self, host_api: Box<dyn HostApi>) {
        self.host_api = host_api;
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Unloads every thread and clears the host API.
    pub fn shutdown(&mut self) {
        let loaded: Vec<usize> = self.loaded_threads().map(ThreadHandle::index).collect();
        for index in loaded {
            self.unload_script(ThreadHandle(index));
        }
        self.threads.clear();
        self.host_api.clear();
        self.scheduler = Scheduler::new();
        log::debug!("vm shut down");
    }

    pub fn load_script_file(
        &mut self,
        path: &Path,
        priority: Option<Priority>,
    ) -> Result<ThreadHandle, LoadError> {
        let bytes = fs::read(path)?;
        self.load_script(&bytes, priority)
    }

    /// Decodes an XSE image into a free thread slot. `priority` overrides the
    /// priority embedded in the image.
    pub fn load_script(
        &mut self,
        bytes: &[u8],
        priority: Option<Priority>,
    ) -> Result<ThreadHandle, LoadError> {
        self.free_slot()?;
        let image = xse::decode(bytes)?;
        let handle = self.install(image, priority)?;
        if let Some(script) = self.threads[handle.0].as_mut() {
            script.digest = Some(hash_bytes(bytes));
        }
        Ok(handle)
    }

    /// Loads an already decoded image. The image is validated first.
    pub fn load_image(
        &mut self,
        image: Image,
        priority: Option<Priority>,
    ) -> Result<ThreadHandle, LoadError> {
        self.free_slot()?;
        xse::validate_image(&image)?;
        self.install(image, priority)
    }

    fn free_slot(&self) -> Result<usize, LoadError> {
        if let Some(index) = self.threads.iter().position(Option::is_none) {
            return Ok(index);
        }
        if self.threads.len() < self.config.max_threads {
            return Ok(self.threads.len());
        }
        Err(LoadError::OutOfThreads {
            max: self.config.max_threads,
        })
    }

    fn install(
        &mut self,
        image: Image,
        priority: Option<Priority>,
    ) -> Result<ThreadHandle, LoadError> {
        let slot = self.free_slot()?;

        let stack_size = match image.stack_size as usize {
            0 => self.config.default_stack_size,
            requested => requested,
        };
        if stack_size > self.config.max_stack_size {
            return Err(LoadError::OutOfMemory {
                requested: stack_size,
            });
        }
        let stack = RuntimeStack::new(stack_size)?;

        let priority = priority.unwrap_or(image.priority);
        let timeslice_ms = self.config.timeslice_for(priority);
        let mut script = Script::new(image, stack, priority, timeslice_ms);
        script
            .reset()
            .map_err(|fault| LoadError::malformed(format!("initial frames: {}", fault)))?;

        log::debug!(
            "loaded thread #{}: {} instructions, {} functions, stack {}, priority {} ({}ms)",
            slot,
            script.code.len(),
            script.funcs.len(),
            stack_size,
            priority,
            timeslice_ms
        );

        if slot == self.threads.len() {
            self.threads.push(Some(script));
        } else {
            self.threads[slot] = Some(script);
        }
        Ok(ThreadHandle(slot))
    }

    /// Releases a thread and every host function scoped to it. Unloading the
    /// thread that is currently executing is the caller's responsibility.
    pub fn unload_script(&mut self, thread: ThreadHandle) {
        if let Some(slot) = self.threads.get_mut(thread.0)
            && slot.take().is_some()
        {
            self.host_api.remove_thread(thread);
            log::debug!("unloaded thread {}", thread);
        }
    }

    pub fn reset_script(&mut self, thread: ThreadHandle) -> Result<(), VmError> {
        self.script_mut(thread)?.reset()?;
        log::debug!("reset thread {}", thread);
        Ok(())
    }

    pub fn start_script(&mut self, thread: ThreadHandle) -> Result<(), VmError> {
        self.script_mut(thread)?.running = true;
        if self.scheduler.mode == SchedulerMode::RoundRobin {
            self.scheduler.select(thread.0);
        }
        log::debug!("started thread {}", thread);
        Ok(())
    }

    pub fn stop_script(&mut self, thread: ThreadHandle) -> Result<(), VmError> {
        self.script_mut(thread)?.running = false;
        log::debug!("stopped thread {}", thread);
        Ok(())
    }

    pub fn pause_script(&mut self, thread: ThreadHandle, duration_ms: u64) -> Result<(), VmError> {
        let now = self.clock.now_ms();
        let script = self.script_mut(thread)?;
        script.paused = true;
        script.pause_end = now + duration_ms;
        Ok(())
    }

    pub fn unpause_script(&mut self, thread: ThreadHandle) -> Result<(), VmError> {
        self.script_mut(thread)?.paused = false;
        Ok(())
    }

    pub fn register_host_api(&mut self, scope: HostScope, name: &str, func: HostFn) {
        self.host_api.register(scope, name, func);
    }

    pub fn is_thread_active(&self, thread: ThreadHandle) -> bool {
        self.script(thread).is_ok()
    }

    pub fn loaded_threads(&self) -> impl Iterator<Item = ThreadHandle> + '_ {
        self.threads
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| ThreadHandle(index))
    }

    pub fn script(&self, thread: ThreadHandle) -> Result<&Script, VmError> {
        self.threads
            .get(thread.0)
            .and_then(Option::as_ref)
            .ok_or(VmError::InvalidThread(thread.0))
    }

    pub(crate) fn script_mut(&mut self, thread: ThreadHandle) -> Result<&mut Script, VmError> {
        self.threads
            .get_mut(thread.0)
            .and_then(Option::as_mut)
            .ok_or(VmError::InvalidThread(thread.0))
    }

    pub fn instruction_pointer(&self, thread: ThreadHandle) -> Option<usize> {
        self.script(thread).ok().map(Script::instruction_pointer)
    }

    pub fn stack_top(&self, thread: ThreadHandle) -> Option<usize> {
        self.script(thread).ok().map(|s| s.stack.top())
    }

    pub fn frame_base(&self, thread: ThreadHandle) -> Option<usize> {
        self.script(thread).ok().map(|s| s.stack.frame_base())
    }

    /// Reads a stack slot; negative indices are relative to the frame base.
    pub fn stack_value(&self, thread: ThreadHandle, index: i32) -> Option<Value> {
        self.script(thread)
            .ok()
            .and_then(|s| s.stack.get(index).ok().cloned())
    }

    pub fn is_running(&self, thread: ThreadHandle) -> bool {
        self.script(thread).map(Script::is_running).unwrap_or(false)
    }

    pub fn is_paused(&self, thread: ThreadHandle) -> bool {
        self.script(thread).map(Script::is_paused).unwrap_or(false)
    }

    pub fn exit_code(&self, thread: ThreadHandle) -> Option<i32> {
        self.script(thread).ok().and_then(Script::exit_code)
    }

    pub fn last_fault(&self, thread: ThreadHandle) -> Option<Fault> {
        self.script(thread)
            .ok()
            .and_then(|s| s.last_fault.clone())
    }

    pub fn thread_stats(&self, thread: ThreadHandle) -> Option<ThreadStats> {
        self.script(thread).ok().map(Script::stats)
    }

    pub fn scheduler_mode(&self) -> SchedulerMode {
        self.scheduler.mode
    }

    pub fn current_thread(&self) -> ThreadHandle {
        ThreadHandle(self.scheduler.current)
    }

    pub fn script_info(&self, thread: ThreadHandle) -> Option<ScriptInfo> {
        let script = self.script(thread).ok()?;
        Some(ScriptInfo {
            thread: thread.0,
            priority: script.priority,
            timeslice_ms: script.timeslice_ms,
            stack_size: script.stack.capacity(),
            global_data_size: script.global_data_size,
            main: script.main_func.map(|main| script.funcs[main].name.clone()),
            functions: script.funcs.iter().map(|f| f.name.clone()).collect(),
            host_calls: script.host_calls.to_vec(),
            instructions: script.code.len(),
            running: script.running,
            paused: script.paused,
            stats: script.stats,
            sha256: script.digest.as_ref().map(to_hex),
        })
    }
}

#[cfg(test)]
mod operand_test;
