use super::job::Job;
use super::panic_handler::PanicHandler;
use super::worker::{Worker, WorkerId};
use super::Executor;
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Bounded pool of worker threads fed from a bounded FIFO queue.
///
/// Work goes to a fresh thread while fewer than `core_threads` exist, then
/// to the queue, then to a fresh thread up to `max_threads`. Past that it is
/// rejected. Every worker, core ones included, retires after `keep_alive`
/// without work.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
}

pub(crate) struct PoolShared {
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<PoolState>,
    pub(crate) queue: Receiver<Job>,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) active: AtomicUsize,
    pub(crate) completed: AtomicU64,
    next_worker_id: AtomicUsize,
}

pub(crate) struct PoolState {
    /// `None` once the pool is shut down.
    pub(crate) sender: Option<Sender<Job>>,
    pub(crate) workers: usize,
}

impl ThreadPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    pub(crate) fn from_valid_config(config: PoolConfig) -> Self {
        let (sender, queue) = bounded(config.queue_capacity);
        let panic_handler = PanicHandler::new(config.panic_strategy);

        Self {
            shared: Arc::new(PoolShared {
                config,
                state: Mutex::new(PoolState {
                    sender: Some(sender),
                    workers: 0,
                }),
                queue,
                panic_handler,
                active: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                next_worker_id: AtomicUsize::new(1),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Live worker threads.
    pub fn pool_size(&self) -> usize {
        self.shared.state.lock().workers
    }

    /// Workers currently running a job.
    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn completed_jobs(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    pub fn panic_count(&self) -> usize {
        self.shared.panic_handler.panic_count()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().sender.is_none()
    }

    /// Stop admitting work. Queued jobs still run, then workers exit.
    pub fn shutdown(&self) {
        let sender = self.shared.state.lock().sender.take();
        if sender.is_some() {
            tracing::debug!(prefix = %self.shared.config.thread_name_prefix, "pool shutting down");
        }
    }

    fn spawn_worker(&self, state: &mut PoolState, first: Option<Job>) -> Result<()> {
        let id: WorkerId = self.shared.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{} #{}", self.shared.config.thread_name_prefix, id);

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(stack_size) = self.shared.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let worker = Worker::new(id, self.shared.clone());
        state.workers += 1;

        match builder.spawn(move || worker.run(first)) {
            Ok(_) => {
                tracing::trace!(worker = %name, workers = state.workers, "worker spawned");
                Ok(())
            }
            Err(e) => {
                state.workers -= 1;
                Err(Error::executor(format!("spawn failed: {}", e)))
            }
        }
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) -> Result<()> {
        let mut state = self.shared.state.lock();

        let sender = match state.sender.as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(Error::rejected("pool is shut down")),
        };

        if state.workers < self.shared.config.core_threads {
            return self.spawn_worker(&mut state, Some(job));
        }

        match sender.try_send(job) {
            Ok(()) => {
                if state.workers == 0 {
                    self.spawn_worker(&mut state, None)?;
                }
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                if state.workers < self.shared.config.max_threads {
                    self.spawn_worker(&mut state, Some(job))
                } else {
                    tracing::warn!(
                        job_id = %job.id(),
                        workers = state.workers,
                        queued = self.shared.queue.len(),
                        "job rejected: queue full and thread limit reached"
                    );
                    Err(Error::rejected(format!(
                        "queue full ({} queued) and {} threads busy",
                        self.shared.config.queue_capacity, state.workers
                    )))
                }
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::rejected("pool is shut down")),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.shared.config)
            .field("pool_size", &self.pool_size())
            .field("queued", &self.queued())
            .finish()
    }
}
