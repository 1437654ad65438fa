//! FIFO executor that runs one job at a time on top of another executor.

use super::job::Job;
use super::Executor;
use crate::error::{Error, Result};
use crate::util::scope_guard::ScopeGuard;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Runs submitted jobs one at a time in submission order.
///
/// Only one job from this executor is ever handed to the target executor at
/// once; the next one is dispatched when the current one returns or panics.
/// If the target refuses a job that had to wait in the queue, that job is
/// [rejected](Job::reject) and the next one is tried. A job refused straight
/// away is returned to the submitter as an error instead.
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct SerialExecutor {
    inner: Arc<SerialInner>,
}

struct SerialInner {
    target: Arc<dyn Executor>,
    state: Mutex<SerialState>,
}

struct SerialState {
    queue: VecDeque<Job>,
    /// Dispatched to the target but not yet picked up by a thread.
    active: Option<Job>,
    /// True from dispatch until the active job has finished. While false
    /// the queue is empty.
    busy: bool,
}

impl SerialExecutor {
    pub fn new(target: Arc<dyn Executor>) -> Self {
        Self {
            inner: Arc::new(SerialInner {
                target,
                state: Mutex::new(SerialState {
                    queue: VecDeque::new(),
                    active: None,
                    busy: false,
                }),
            }),
        }
    }

    /// Jobs waiting behind the active one.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().busy
    }
}

impl Executor for SerialExecutor {
    fn execute(&self, job: Job) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.queue.push_back(job);
            if state.busy {
                return Ok(());
            }
            // not busy means the queue was empty: the active job is ours
            state.activate_next();
        }

        match self.inner.dispatch() {
            Ok(()) => Ok(()),
            Err((job, err)) => {
                tracing::debug!(job_id = %job.id(), error = %err, "serial dispatch rejected");
                drop(job);
                // jobs queued behind ours while we were dispatching
                self.inner.schedule_next();
                Err(err)
            }
        }
    }
}

impl SerialState {
    fn activate_next(&mut self) -> bool {
        self.active = self.queue.pop_front();
        self.busy = self.active.is_some();
        self.busy
    }
}

impl SerialInner {
    /// Hand the active job to the target. On rejection the job is returned
    /// and the executor stays busy until the caller moves on.
    fn dispatch(self: &Arc<Self>) -> std::result::Result<(), (Job, Error)> {
        let inner = Arc::clone(self);
        let err = match self.target.execute(Job::new(move || inner.run_active())) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        match self.state.lock().active.take() {
            Some(job) => Err((job, err)),
            None => {
                tracing::warn!(error = %err, "target rejected a job it already ran");
                Ok(())
            }
        }
    }

    fn run_active(self: Arc<Self>) {
        let job = self.state.lock().active.take();
        let _next = ScopeGuard::new(|| self.schedule_next());
        if let Some(job) = job {
            job.run();
        }
    }

    /// Dispatch the next queued job. Jobs the target refuses were already
    /// accepted from their submitters, so they are rejected through
    /// [`Job::reject`] and the queue moves on.
    fn schedule_next(self: &Arc<Self>) {
        loop {
            if !self.state.lock().activate_next() {
                return;
            }
            match self.dispatch() {
                Ok(()) => return,
                Err((job, err)) => {
                    tracing::warn!(
                        job_id = %job.id(),
                        pending = self.state.lock().queue.len(),
                        error = %err,
                        "serial executor could not dispatch queued job"
                    );
                    job.reject(err);
                }
            }
        }
    }
}

impl fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SerialExecutor")
            .field("pending", &state.queue.len())
            .field("busy", &state.busy)
            .finish()
    }
}
