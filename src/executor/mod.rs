//! Executors that run background work.
//!
//! [`ThreadPool`] is the bounded parallel pool, [`SerialExecutor`] layers
//! strict one-at-a-time FIFO execution over any other executor. Process-wide
//! instances of both are created lazily on first use.

pub mod job;
pub mod panic_handler;
pub mod pool;
pub mod serial;
mod worker;

pub use job::{Job, JobId};
pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use pool::ThreadPool;
pub use serial::SerialExecutor;
pub use worker::WorkerId;

use crate::config::PoolConfig;
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

/// Something that runs [`Job`]s, now or later, on some thread.
pub trait Executor: Send + Sync {
    /// Accept `job` for execution or refuse it with
    /// [`Error::Rejected`](crate::Error::Rejected). A refused job has not
    /// run and never will. An accepted job is either run or handed to
    /// [`Job::reject`].
    fn execute(&self, job: Job) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) -> Result<()> {
        (**self).execute(job)
    }
}

static THREAD_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
static SERIAL: OnceLock<SerialExecutor> = OnceLock::new();
static DEFAULT_EXECUTOR: RwLock<Option<Arc<dyn Executor>>> = RwLock::new(None);

/// The shared bounded pool, sized from the CPU count on first use.
pub fn thread_pool() -> Arc<ThreadPool> {
    THREAD_POOL
        .get_or_init(|| {
            let config = PoolConfig::default();
            tracing::debug!(
                core = config.core_threads,
                max = config.max_threads,
                queue = config.queue_capacity,
                "initializing shared thread pool"
            );
            Arc::new(ThreadPool::from_valid_config(config))
        })
        .clone()
}

/// The shared serial executor, running on [`thread_pool`].
pub fn serial() -> SerialExecutor {
    SERIAL
        .get_or_init(|| SerialExecutor::new(thread_pool()))
        .clone()
}

/// Executor used by [`Task::execute`](crate::Task::execute). Serial unless
/// replaced.
pub fn default_executor() -> Arc<dyn Executor> {
    match DEFAULT_EXECUTOR.read().as_ref() {
        Some(executor) => executor.clone(),
        None => Arc::new(serial()),
    }
}

pub fn set_default_executor(executor: Arc<dyn Executor>) {
    *DEFAULT_EXECUTOR.write() = Some(executor);
}

/// Go back to the shared serial executor.
pub fn reset_default_executor() {
    *DEFAULT_EXECUTOR.write() = None;
}

/// Run a bare closure on the default executor.
pub fn execute<F>(f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    default_executor().execute(Job::new(f))
}
