use std::io;

use thiserror::Error;

/// Failure to turn an XSE image into a loaded thread. The VM stays usable.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid format: missing XSE0 magic")]
    InvalidFormat,
    #[error("unsupported version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("malformed image: {0}")]
    Malformed(String),
    #[error("out of memory: {requested} stack slots requested")]
    OutOfMemory { requested: usize },
    #[error("out of threads: all {max} thread slots are in use")]
    OutOfThreads { max: usize },
}

/// Load result as reported to a host that only matches on a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorCode {
    Ok,
    FileIo,
    InvalidFormat,
    UnsupportedVersion,
    OutOfMemory,
    OutOfThreads,
}

impl LoadError {
    pub fn code(&self) -> LoadErrorCode {
        match self {
            LoadError::Io(_) => LoadErrorCode::FileIo,
            LoadError::InvalidFormat | LoadError::Malformed(_) => LoadErrorCode::InvalidFormat,
            LoadError::UnsupportedVersion { .. } => LoadErrorCode::UnsupportedVersion,
            LoadError::OutOfMemory { .. } => LoadErrorCode::OutOfMemory,
            LoadError::OutOfThreads { .. } => LoadErrorCode::OutOfThreads,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        LoadError::Malformed(reason.into())
    }
}

impl<T> From<&Result<T, LoadError>> for LoadErrorCode {
    fn from(result: &Result<T, LoadError>) -> Self {
        match result {
            Ok(_) => LoadErrorCode::Ok,
            Err(err) => err.code(),
        }
    }
}

/// Runtime data error. Stops the offending thread only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("stack index {index} out of range (top {top}, capacity {capacity})")]
    StackIndexOutOfRange {
        index: i64,
        top: usize,
        capacity: usize,
    },
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("operand {operand} ({kind}) is not an assignable location")]
    NotAssignable { operand: usize, kind: &'static str },
    #[error("operand {operand} is missing")]
    MissingOperand { operand: usize },
    #[error("operand {operand}: expected {expected}, found {found}")]
    OperandKind {
        operand: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("no host function `{name}` visible to this thread")]
    UnresolvedHostCall { name: String },
    #[error("integer division by zero")]
    DivisionByZero,
    #[error("string index {index} out of range for length {len}")]
    StringIndexOutOfRange { index: i32, len: usize },
    #[error("return without a call frame marker (found {found})")]
    BadReturn { found: &'static str },
    #[error("instruction pointer {ip} past end of stream ({len} instructions)")]
    InstructionPointer { ip: usize, len: usize },
}

/// Failure of a host-initiated operation on a thread.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("thread {0} is not loaded")]
    InvalidThread(usize),
    #[error("function `{0}` not found")]
    UnknownFunction(String),
    #[error("thread stopped before the call returned")]
    Aborted,
    #[error(transparent)]
    Fault(#[from] Fault),
}
