use crate::runtime::{error::Fault, script::ThreadHandle};

use super::{Vm, dispatch::Flow};

/// Wall-clock budget for one [`Vm::run_scripts`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeslice {
    /// Run until no thread is left running.
    Infinite,
    Millis(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    /// Threads take turns, each for its own timeslice.
    RoundRobin,
    /// Only this thread runs; used while a synchronous host call drains.
    Pinned(ThreadHandle),
}

/// Why [`Vm::run_scripts`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No loaded thread is running.
    Idle,
    /// The requested timeslice elapsed.
    Budget,
    /// The pinned thread unwound its stack-base marker.
    SyncReturned,
    /// The pinned thread stopped before its synchronous call returned.
    PinnedStopped,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Scheduler {
    pub(super) mode: SchedulerMode,
    pub(super) current: usize,
    /// Start of the current thread's turn; `None` forces a rotation that may
    /// pick `current` itself.
    pub(super) turn_started: Option<u64>,
}

impl Scheduler {
    pub(super) fn new() -> Self {
        Self {
            mode: SchedulerMode::RoundRobin,
            current: 0,
            turn_started: None,
        }
    }

    pub(super) fn select(&mut self, index: usize) {
        self.current = index;
        self.turn_started = None;
    }
}

impl Vm {
    /// Runs loaded threads until the budget elapses or nothing is left to run.
    pub fn run_scripts(&mut self, timeslice: Timeslice) -> RunOutcome {
        let start = self.clock.now_ms();
        loop {
            let Some(thread) = self.runnable_thread() else {
                return match self.scheduler.mode {
                    SchedulerMode::RoundRobin => RunOutcome::Idle,
                    SchedulerMode::Pinned(_) => RunOutcome::PinnedStopped,
                };
            };
            let now = self.clock.now_ms();

            let thread = match self.scheduler.mode {
                SchedulerMode::RoundRobin => {
                    self.rotate(thread, now);
                    ThreadHandle(self.scheduler.current)
                }
                SchedulerMode::Pinned(pinned) => pinned,
            };

            let flow = if self.ready(thread, now) {
                match self.execute_instruction(thread, now) {
                    Ok(flow) => Some(flow),
                    Err(fault) => {
                        self.fault_thread(thread, fault);
                        None
                    }
                }
            } else {
                None
            };

            if let Timeslice::Millis(budget) = timeslice
                && now > start + budget
            {
                return RunOutcome::Budget;
            }
            if let Some(Flow::SyncReturn(_)) = flow
                && self.scheduler.mode == SchedulerMode::Pinned(thread)
            {
                return RunOutcome::SyncReturned;
            }
        }
    }

    /// A running thread eligible under the current mode; in round-robin
    /// mode, the first one found.
    fn runnable_thread(&self) -> Option<ThreadHandle> {
        match self.scheduler.mode {
            SchedulerMode::Pinned(pinned) => self.is_running(pinned).then_some(pinned),
            SchedulerMode::RoundRobin => self
                .threads
                .iter()
                .position(|slot| slot.as_ref().is_some_and(|script| script.running))
                .map(ThreadHandle),
        }
    }

    /// Moves to the next running thread, circularly, once the current turn
    /// has used up its timeslice or the current thread stopped.
    fn rotate(&mut self, fallback: ThreadHandle, now: u64) {
        let current = self.scheduler.current;
        let first = match self.scheduler.turn_started {
            None => current,
            Some(started) => {
                let expired = match self.script(ThreadHandle(current)) {
                    Ok(script) => !script.running || now > started + script.timeslice_ms,
                    Err(_) => true,
                };
                if !expired {
                    return;
                }
                current + 1
            }
        };

        let count = self.threads.len();
        let next = (0..count)
            .map(|step| (first + step) % count)
            .find(|&index| self.is_running(ThreadHandle(index)))
            .unwrap_or(fallback.0);

        self.scheduler.current = next;
        self.scheduler.turn_started = Some(now);
        if let Ok(script) = self.script_mut(ThreadHandle(next)) {
            script.stats.turns += 1;
        }
        log::trace!("scheduler: thread #{} takes a turn at {}ms", next, now);
    }

    /// Wakes a paused thread whose pause has elapsed. Pinned threads ignore
    /// pauses.
    fn ready(&mut self, thread: ThreadHandle, now: u64) -> bool {
        let pinned = self.scheduler.mode != SchedulerMode::RoundRobin;
        let Ok(script) = self.script_mut(thread) else {
            return false;
        };
        if !script.paused || pinned {
            return true;
        }
        if now >= script.pause_end {
            script.paused = false;
            return true;
        }
        false
    }

    /// Stops `thread` after a runtime data error. Other threads keep running.
    pub(super) fn fault_thread(&mut self, thread: ThreadHandle, fault: Fault) {
        if let Ok(script) = self.script_mut(thread) {
            log::warn!(
                "thread {} faulted at IP={:04}: {}",
                thread,
                script.code.current,
                fault
            );
            script.running = false;
            script.last_fault = Some(fault);
        }
    }
}
