//! Task lifecycle: a monotonic status plus independent flags.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Where a task is in its life. Each status is entered at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Not executed yet.
    Pending,
    /// Submitted to an executor.
    Running,
    /// The completion callback has run on the home context.
    Finished,
}

const PENDING: u8 = 0;
// claimed by `execute` but not yet accepted by an executor; reads as Pending
const SUBMITTING: u8 = 1;
const RUNNING: u8 = 2;
const FINISHED: u8 = 3;

/// Status, cancellation and invocation of one task. Each field is updated
/// atomically on its own; no lock covers the whole.
#[derive(Debug)]
pub struct LifecycleState {
    status: AtomicU8,
    cancelled: AtomicBool,
    invoked: AtomicBool,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(PENDING),
            cancelled: AtomicBool::new(false),
            invoked: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> Status {
        match self.status.load(Ordering::Acquire) {
            PENDING | SUBMITTING => Status::Pending,
            RUNNING => Status::Running,
            _ => Status::Finished,
        }
    }

    /// Claim a pending task for execution.
    ///
    /// Fails with [`Error::AlreadyRunning`] or [`Error::AlreadyFinished`]
    /// when the task is not pending. The task reads as `Pending` until
    /// [`confirm_running`](Self::confirm_running).
    pub fn transition_to_running(&self) -> Result<()> {
        match self
            .status
            .compare_exchange(PENDING, SUBMITTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(SUBMITTING) | Err(RUNNING) => Err(Error::AlreadyRunning),
            Err(_) => Err(Error::AlreadyFinished),
        }
    }

    /// The executor accepted the work, or the work started. Idempotent.
    pub fn confirm_running(&self) {
        let _ = self.status.compare_exchange(
            SUBMITTING,
            RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// The executor refused the work; the task can be executed again.
    pub fn revert_to_pending(&self) {
        let _ = self.status.compare_exchange(
            SUBMITTING,
            PENDING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Only called by the home context after the completion callback.
    pub fn transition_to_finished(&self) {
        self.status.store(FINISHED, Ordering::Release);
    }

    /// Set the cancellation flag. Returns whether it was already set.
    pub fn set_cancelled(&self) -> bool {
        self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn mark_invoked(&self) {
        self.invoked.store(true, Ordering::Release);
    }

    pub fn was_invoked(&self) -> bool {
        self.invoked.load(Ordering::Acquire)
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::new()
    }
}
