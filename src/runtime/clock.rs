use std::{cell::Cell, rc::Rc, time::Instant};

/// Millisecond time source driving timeslices and `PAUSE`.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from VM creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Deterministic clock for tests and replay hosts.
///
/// Clones share the same time. With a non-zero `tick`, every read advances
/// the time by `tick` after returning it, so busy-wait loops make progress.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    tick: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticking(tick: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            tick,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    /// Current time without ticking.
    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.tick);
        now
    }
}
