//! XtremeScript virtual machine: loads XSE executables and runs them as
//! cooperatively scheduled script threads inside a host application.
pub mod bytecode;
pub mod runtime;

pub use bytecode::image::{Image, ImageBuilder, Priority};
pub use runtime::{
    error::{Fault, LoadError, LoadErrorCode, VmError},
    host_api::{HostFn, HostScope},
    script::ThreadHandle,
    value::Value,
    vm::{RunOutcome, Timeslice, Vm},
};
