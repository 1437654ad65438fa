use super::job::{Job, JobId};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a worker does when a job panics.
///
/// Task work never reaches this: [`Task`](crate::Task) catches its own
/// panics and reports them as failures. Only bare jobs and executor
/// wrappers unwind into the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Abort the process.
    Abort,
    /// Count the panic and keep the worker, without logging.
    Silent,
    #[default]
    LogAndContinue,
}

/// Runs jobs on a worker, containing their panics.
#[derive(Debug, Default)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Run `job`, returning what its panic carried if it panicked.
    pub fn run(&self, job: Job) -> Result<(), PanicInfo> {
        let job_id = job.id();
        match catch_unwind(AssertUnwindSafe(|| job.run())) {
            Ok(()) => Ok(()),
            Err(payload) => Err(self.record(job_id, payload)),
        }
    }

    fn record(&self, job_id: JobId, payload: Box<dyn Any + Send>) -> PanicInfo {
        let count = self.panic_count.fetch_add(1, Ordering::Relaxed) + 1;
        let info = PanicInfo::from_payload(payload);

        match self.strategy {
            PanicStrategy::Abort => {
                tracing::error!(%job_id, message = %info.message, "job panicked, aborting");
                std::process::abort();
            }
            PanicStrategy::Silent => {}
            PanicStrategy::LogAndContinue => {
                tracing::error!(%job_id, message = %info.message, panics = count, "job panicked");
            }
        }
        info
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

/// Message recovered from a panic payload.
#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast_ref::<&str>() {
                Some(s) => s.to_string(),
                None => "non-string panic payload".to_string(),
            },
        };
        Self { message }
    }
}
