//! Unit of work handed to an executor.

use crate::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

type RejectHook = Box<dyn FnOnce(Error) + Send + 'static>;

/// A boxed closure run exactly once by an executor.
///
/// An executor that accepted a job but can no longer run it calls
/// [`reject`](Self::reject) instead, so the submitter always hears back.
pub struct Job {
    id: JobId,
    func: Box<dyn FnOnce() + Send + 'static>,
    on_rejected: Option<RejectHook>,
    submitted_at: Instant,
}

impl Job {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Job {
            id: JobId::next(),
            func: Box::new(f),
            on_rejected: None,
            submitted_at: Instant::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Called by [`reject`](Self::reject) in place of the job body.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.on_rejected = Some(Box::new(f));
        self
    }

    pub fn run(self) {
        (self.func)();
    }

    /// Give up on a job that was accepted earlier. Executors refusing a job
    /// at submission return the error instead.
    pub fn reject(self, err: Error) {
        match self.on_rejected {
            Some(hook) => hook(err),
            None => {
                tracing::warn!(job_id = %self.id, error = %err, "accepted job dropped without running")
            }
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("submitted_at", &self.submitted_at)
            .field("on_rejected", &self.on_rejected.is_some())
            .finish()
    }
}
