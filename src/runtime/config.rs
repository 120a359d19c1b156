use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::bytecode::image::Priority;

pub const DEFAULT_MAX_THREADS: usize = 1024;
pub const DEFAULT_STACK_SIZE: usize = 1024;
pub const DEFAULT_MAX_STACK_SIZE: usize = 1 << 20;

/// VM limits and scheduling constants. Missing JSON fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub max_threads: usize,
    /// Stack slots for images that request `0`.
    pub default_stack_size: usize,
    /// Larger stack requests fail to load with `OutOfMemory`.
    pub max_stack_size: usize,
    pub timeslice_low_ms: u32,
    pub timeslice_medium_ms: u32,
    pub timeslice_high_ms: u32,
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            default_stack_size: DEFAULT_STACK_SIZE,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            timeslice_low_ms: 20,
            timeslice_medium_ms: 40,
            timeslice_high_ms: 80,
            trace: false,
        }
    }
}

impl VmConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_file(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    pub fn timeslice_for(&self, priority: Priority) -> u64 {
        u64::from(match priority {
            Priority::User(ms) => ms,
            Priority::Low => self.timeslice_low_ms,
            Priority::Medium => self.timeslice_medium_ms,
            Priority::High => self.timeslice_high_ms,
        })
    }
}
