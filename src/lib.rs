//! homeward - background work that reports home
//!
//! Run a one-shot computation on a worker thread and get its progress and
//! result back on the thread that started it, in order, exactly once, even
//! when the work fails or is cancelled.
//!
//! # Pieces
//!
//! - [`Task`] / [`AsyncWork`]: the task lifecycle and its hooks
//! - [`ThreadPool`]: bounded, process-wide parallel pool
//! - [`SerialExecutor`]: strict FIFO, one job at a time, on top of the pool
//! - [`HomeLoop`] / [`Dispatcher`]: ordered delivery to the home thread
//!
//! # Quick Start
//!
//! ```no_run
//! use homeward::prelude::*;
//!
//! struct Fetch;
//!
//! impl AsyncWork for Fetch {
//!     type Params = String;
//!     type Progress = ();
//!     type Output = usize;
//!
//!     fn do_in_background(&self, _ctx: &WorkContext<'_, Self>, url: String) -> Result<usize, BoxError> {
//!         Ok(url.len())
//!     }
//!
//!     fn on_post_execute(&self, len: Option<usize>) {
//!         println!("fetched {:?} bytes", len);
//!     }
//! }
//!
//! let home = HomeLoop::prepare_main().unwrap();
//! let task = Task::new(Fetch).unwrap();
//! task.execute("https://example.com".to_string()).unwrap();
//! assert_eq!(task.get().unwrap(), 19);
//! home.run_pending();
//! ```

#![warn(missing_debug_implementations)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod task;
pub mod util;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use dispatch::{Dispatcher, HomeContext, HomeLoop, Message, MessageKind};
pub use error::{BoxError, Error, Result, TaskFailure};
pub use executor::{
    default_executor, execute, serial, set_default_executor, thread_pool, Executor, Job,
    SerialExecutor, ThreadPool,
};
pub use task::{AsyncWork, Status, Task, TaskId, WorkContext};
