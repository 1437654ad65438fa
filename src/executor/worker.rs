// worker thread loop
use super::job::Job;
use super::pool::PoolShared;
use crate::util::interrupt;
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

pub(crate) struct Worker {
    pub id: WorkerId,
    shared: Arc<PoolShared>,
}

impl Worker {
    pub fn new(id: WorkerId, shared: Arc<PoolShared>) -> Self {
        Self { id, shared }
    }

    // main loop
    pub fn run(self, first: Option<Job>) {
        if let Some(job) = first {
            self.execute_job(job);
        }

        let keep_alive = self.shared.config.keep_alive;

        loop {
            match self.shared.queue.recv_timeout(keep_alive) {
                Ok(job) => self.execute_job(job),
                Err(RecvTimeoutError::Timeout) => {
                    // retire under the pool lock so a submitter never queues
                    // behind a worker that is about to leave
                    let mut state = self.shared.state.lock();
                    if !self.shared.queue.is_empty() {
                        continue;
                    }
                    state.workers -= 1;
                    tracing::trace!(worker = self.id, workers = state.workers, "idle worker retired");
                    return;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let mut state = self.shared.state.lock();
                    state.workers -= 1;
                    tracing::trace!(worker = self.id, workers = state.workers, "worker exiting after shutdown");
                    return;
                }
            }
        }
    }

    fn execute_job(&self, job: Job) {
        let job_id = job.id();
        let queued_for = Instant::now().saturating_duration_since(job.submitted_at());
        self.shared.active.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(worker = self.id, %job_id, ?queued_for, "running job");
        if self.shared.panic_handler.run(job).is_err() {
            tracing::debug!(worker = self.id, %job_id, "job ended in panic");
        }

        // an interrupt aimed at this job must not leak into the next one
        interrupt::take_interrupt();

        self.shared.active.fetch_sub(1, Ordering::Relaxed);
        self.shared.completed.fetch_add(1, Ordering::Relaxed);
    }
}
