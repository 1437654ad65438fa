//! One-shot outcome cell shared by a task's worker and its waiters.

use crate::error::{Error, Result, TaskFailure};
use crate::util::interrupt::{self, InterruptHandle};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

// waiters re-check their interrupt flag at this interval
const INTERRUPT_POLL: Duration = Duration::from_millis(10);

pub(crate) enum Outcome<T> {
    Value(T),
    Failed(Arc<TaskFailure>),
    Cancelled,
    /// The executor gave up on the work before it started.
    Rejected(String),
}

impl<T: Clone> Outcome<T> {
    fn to_result(&self) -> Result<T> {
        match self {
            Outcome::Value(value) => Ok(value.clone()),
            Outcome::Failed(failure) => Err(Error::Execution(failure.clone())),
            Outcome::Cancelled => Err(Error::Cancelled),
            Outcome::Rejected(reason) => Err(Error::rejected(reason.clone())),
        }
    }
}

enum Slot<T> {
    New,
    /// Carries the runner's interrupt handle for `cancel(true)`.
    Running(InterruptHandle),
    Done(Outcome<T>),
}

pub(crate) struct TaskFuture<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
}

impl<T: Clone> TaskFuture<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::New),
            done: Condvar::new(),
        }
    }

    /// Claim the future for the calling thread. `on_start` runs under the
    /// slot lock, so a concurrent `cancel` sees either nothing or all of it.
    /// Returns false if the future was already cancelled.
    pub fn start(&self, on_start: impl FnOnce()) -> bool {
        let mut slot = self.slot.lock();
        match *slot {
            Slot::New => {
                *slot = Slot::Running(interrupt::current());
                on_start();
                true
            }
            _ => false,
        }
    }

    /// Store the outcome of a started run. Returns false if the future was
    /// cancelled while running, in which case the outcome is discarded.
    pub fn complete(&self, outcome: Outcome<T>) -> bool {
        let mut slot = self.slot.lock();
        match *slot {
            Slot::Running(_) => {
                *slot = Slot::Done(outcome);
                self.done.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Returns false if the outcome was already set.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Done(_) => return false,
            Slot::Running(runner) if may_interrupt => runner.interrupt(),
            _ => {}
        }
        *slot = Slot::Done(Outcome::Cancelled);
        self.done.notify_all();
        true
    }

    /// Settle a future whose run will never start. Returns false if it was
    /// already started or settled.
    pub fn reject(&self, reason: String) -> bool {
        let mut slot = self.slot.lock();
        match *slot {
            Slot::New => {
                *slot = Slot::Done(Outcome::Rejected(reason));
                self.done.notify_all();
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_done(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Done(_))
    }

    /// Block until an outcome is set.
    pub fn get(&self) -> Result<T> {
        let mut slot = self.slot.lock();
        loop {
            if let Slot::Done(outcome) = &*slot {
                return outcome.to_result();
            }
            if interrupt::take_interrupt() {
                return Err(Error::Interrupted);
            }
            self.done.wait_for(&mut slot, INTERRUPT_POLL);
        }
    }

    /// Block until an outcome is set or `timeout` elapses. Timing out does
    /// not affect the work.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if let Slot::Done(outcome) = &*slot {
                return outcome.to_result();
            }
            if interrupt::take_interrupt() {
                return Err(Error::Interrupted);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::TimedOut);
            }
            self.done.wait_for(&mut slot, remaining.min(INTERRUPT_POLL));
        }
    }
}
