//! Runtime core: values, per-thread stacks, the thread record and the VM that
//! schedules and executes loaded scripts.
//!
//! # Ownership
//! Every script thread owns its stack and run state. Instruction, function and
//! host-call tables are immutable after load and shared behind `Rc` so the VM
//! can hand `&mut Vm` to host callbacks while an instruction is in flight.
pub mod clock;
pub mod config;
pub mod error;
pub mod host_api;
pub mod script;
pub mod stack;
pub mod value;
pub mod vm;

#[cfg(test)]
mod host_api_test;
#[cfg(test)]
mod stack_test;
