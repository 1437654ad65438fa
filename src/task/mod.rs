//! One-shot background tasks that report back to a home context.
//!
//! A [`Task`] wraps an [`AsyncWork`] implementation. `execute` runs
//! [`AsyncWork::on_pre_execute`] on the calling thread, then hands
//! [`AsyncWork::do_in_background`] to an executor. Progress and the final
//! result travel back through the task's [`Dispatcher`] and their callbacks
//! run on the home context's thread, in post order.
//!
//! ```no_run
//! use homeward::prelude::*;
//!
//! struct Count;
//!
//! impl AsyncWork for Count {
//!     type Params = u32;
//!     type Progress = u32;
//!     type Output = u32;
//!
//!     fn do_in_background(&self, ctx: &WorkContext<'_, Self>, upto: u32) -> Result<u32, BoxError> {
//!         for i in 0..upto {
//!             if ctx.is_cancelled() {
//!                 break;
//!             }
//!             ctx.publish_progress([i]);
//!         }
//!         Ok(upto)
//!     }
//!
//!     fn on_post_execute(&self, result: Option<u32>) {
//!         println!("counted to {:?}", result);
//!     }
//! }
//!
//! let home = HomeLoop::prepare_main().unwrap();
//! let task = Task::new(Count).unwrap();
//! task.execute(10).unwrap();
//! home.run_for(std::time::Duration::from_secs(1));
//! ```

pub(crate) mod future;
pub mod state;

pub use state::{LifecycleState, Status};

use crate::dispatch::{Dispatcher, Envelope};
use crate::error::{BoxError, Error, Result, TaskFailure};
use crate::executor::{self, Executor, Job, PanicInfo};
use crate::util::{interrupt, thread::set_background_priority};
use future::{Outcome, TaskFuture};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// The behavior of a task.
///
/// Only [`do_in_background`](Self::do_in_background) runs on a worker
/// thread. Every other hook runs on the home context: `on_pre_execute` on
/// the thread calling `execute`, the rest on the thread dispatching the
/// task's messages.
pub trait AsyncWork: Send + Sync + Sized + 'static {
    type Params: Send + 'static;
    type Progress: Send + 'static;
    type Output: Clone + Send + 'static;

    /// Runs on the thread calling `execute`, after the task has been claimed
    /// but before an executor accepted it. [`Task::status`] still reads
    /// `Pending` here, while a second `execute` already fails with
    /// [`Error::AlreadyRunning`].
    fn on_pre_execute(&self) {}

    fn do_in_background(
        &self,
        ctx: &WorkContext<'_, Self>,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, BoxError>;

    fn on_progress_update(&self, _values: Vec<Self::Progress>) {}

    /// Called instead of the cancellation hooks when the task was not
    /// cancelled. `result` is `None` when the work failed or the executor
    /// gave up on it before it started.
    fn on_post_execute(&self, _result: Option<Self::Output>) {}

    /// Called instead of `on_post_execute` when the task was cancelled.
    /// `result` is whatever the work returned, if it got that far.
    fn on_cancelled_with(&self, _result: Option<Self::Output>) {
        self.on_cancelled();
    }

    fn on_cancelled(&self) {}
}

pub(crate) struct Shared<W: AsyncWork> {
    id: TaskId,
    work: W,
    state: LifecycleState,
    future: TaskFuture<W::Output>,
    dispatcher: Dispatcher,
    /// Set by the first final-result post.
    delivered: AtomicBool,
}

/// Handle to a one-shot task. Clones refer to the same task.
pub struct Task<W: AsyncWork> {
    shared: Arc<Shared<W>>,
}

impl<W: AsyncWork> Clone for Task<W> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<W: AsyncWork> Task<W> {
    /// A task reporting to the main home context.
    ///
    /// Fails with [`Error::NotInitialized`] until
    /// [`HomeLoop::prepare_main`](crate::HomeLoop::prepare_main) ran.
    pub fn new(work: W) -> Result<Self> {
        Ok(Self::with_dispatcher(work, Dispatcher::main()?))
    }

    pub fn with_dispatcher(work: W, dispatcher: Dispatcher) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: TaskId::next(),
                work,
                state: LifecycleState::new(),
                future: TaskFuture::new(),
                dispatcher,
                delivered: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn work(&self) -> &W {
        &self.shared.work
    }

    /// Current lifecycle status.
    ///
    /// Reads `Pending` until an executor has accepted the work, so it stays
    /// `Pending` during [`AsyncWork::on_pre_execute`] and for good if the
    /// executor refuses. Another `execute` in that window still fails with
    /// [`Error::AlreadyRunning`].
    pub fn status(&self) -> Status {
        self.shared.state.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.state.is_cancelled()
    }

    /// Execute on the process default executor (serial unless replaced).
    pub fn execute(&self, params: W::Params) -> Result<&Self> {
        let executor = executor::default_executor();
        self.execute_on(executor.as_ref(), params)
    }

    /// Execute on `executor`.
    ///
    /// Fails with [`Error::AlreadyRunning`] or [`Error::AlreadyFinished`]
    /// unless the task is pending. If the executor rejects the work the
    /// error is returned, no callbacks beyond `on_pre_execute` run and the
    /// task stays pending. If the executor accepts the work but gives up on
    /// it before it starts, `get` fails with [`Error::Rejected`] and the task
    /// completes through `on_post_execute(None)`.
    pub fn execute_on(&self, executor: &dyn Executor, params: W::Params) -> Result<&Self> {
        self.shared.state.transition_to_running()?;

        self.shared.work.on_pre_execute();

        let shared = self.shared.clone();
        let rejected = self.shared.clone();
        let job = Job::new(move || shared.run(params))
            .on_rejected(move |err| rejected.reject(err));
        match executor.execute(job) {
            Ok(()) => {
                self.shared.state.confirm_running();
                tracing::debug!(task_id = %self.shared.id, "task submitted");
                Ok(self)
            }
            Err(err) => {
                self.shared.state.revert_to_pending();
                tracing::warn!(task_id = %self.shared.id, error = %err, "task submission failed");
                Err(err)
            }
        }
    }

    /// Request cancellation.
    ///
    /// The cancellation flag is always set. Returns whether the outcome was
    /// still open, i.e. the request changed anything. With `may_interrupt`
    /// the worker running the task is also interrupted; work observes that
    /// through [`WorkContext::is_interrupted`].
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        self.shared.state.set_cancelled();
        let accepted = self.shared.future.cancel(may_interrupt);
        if accepted {
            tracing::debug!(task_id = %self.shared.id, may_interrupt, "task cancelled");
            // never started: nobody else will post the final result
            if !self.shared.state.was_invoked() {
                self.shared.post_result(None);
            }
        }
        accepted
    }

    /// Block until the background outcome is known. Does not wait for the
    /// home context callbacks.
    pub fn get(&self) -> Result<W::Output> {
        self.shared.future.get()
    }

    /// Like [`get`](Self::get), giving up with [`Error::TimedOut`] after
    /// `timeout`. The work keeps running.
    pub fn get_timeout(&self, timeout: Duration) -> Result<W::Output> {
        self.shared.future.get_timeout(timeout)
    }
}

impl<W: AsyncWork> fmt::Debug for Task<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl<W: AsyncWork> Shared<W> {
    /// Body of the job handed to the executor.
    fn run(self: Arc<Self>, params: W::Params) {
        if !self.future.start(|| self.state.mark_invoked()) {
            tracing::trace!(task_id = %self.id, "skipping cancelled task");
            return;
        }
        self.state.confirm_running();
        set_background_priority();

        let ctx = WorkContext { shared: &self };
        let outcome = match catch_unwind(AssertUnwindSafe(|| {
            self.work.do_in_background(&ctx, params)
        })) {
            Ok(Ok(value)) => Outcome::Value(value),
            Ok(Err(err)) => Outcome::Failed(Arc::new(TaskFailure::Error(err))),
            Err(payload) => Outcome::Failed(Arc::new(TaskFailure::Panic(
                PanicInfo::from_payload(payload),
            ))),
        };

        let result = match &outcome {
            Outcome::Value(value) => Some(value.clone()),
            _ => None,
        };
        let failure = match &outcome {
            Outcome::Failed(failure) => Some(failure.clone()),
            _ => None,
        };

        self.post_result(result);

        if self.future.complete(outcome) {
            if let Some(failure) = failure {
                tracing::error!(task_id = %self.id, error = %failure, "background work failed");
            }
        }
    }

    /// The executor accepted the job but will never run it. Settles the
    /// outcome as rejected and completes the task with no result.
    fn reject(self: &Arc<Self>, err: Error) {
        let reason = match err {
            Error::Rejected { reason } => reason,
            other => other.to_string(),
        };
        tracing::warn!(task_id = %self.id, %reason, "accepted task rejected before it started");
        if self.future.reject(reason) {
            self.post_result(None);
        }
    }

    /// Post the final result unless one was already posted.
    fn post_result(self: &Arc<Self>, result: Option<W::Output>) {
        if self.delivered.swap(true, Ordering::AcqRel) {
            tracing::debug!(task_id = %self.id, "final result already posted");
            return;
        }
        let envelope = ResultEnvelope {
            task: self.clone(),
            data: EnvelopeData::Result(result),
        };
        self.dispatcher.post_result(Box::new(envelope));
    }

    fn post_progress(self: &Arc<Self>, values: Vec<W::Progress>) {
        let envelope = ResultEnvelope {
            task: self.clone(),
            data: EnvelopeData::Progress(values),
        };
        self.dispatcher.post_progress(Box::new(envelope));
    }

    fn finish(&self, result: Option<W::Output>) {
        if self.state.is_cancelled() {
            self.work.on_cancelled_with(result);
        } else {
            self.work.on_post_execute(result);
        }
        self.state.transition_to_finished();
        tracing::trace!(task_id = %self.id, "task finished");
    }
}

/// What background work can see of its own task.
pub struct WorkContext<'a, W: AsyncWork> {
    shared: &'a Arc<Shared<W>>,
}

impl<'a, W: AsyncWork> WorkContext<'a, W> {
    pub fn task_id(&self) -> TaskId {
        self.shared.id
    }

    /// Poll this to stop early once the task is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.is_cancelled()
    }

    /// Whether `cancel(true)` interrupted this worker thread.
    pub fn is_interrupted(&self) -> bool {
        interrupt::is_interrupted()
    }

    /// Send progress values to [`AsyncWork::on_progress_update`]. Dropped
    /// once the task is cancelled.
    pub fn publish_progress<I>(&self, values: I)
    where
        I: IntoIterator<Item = W::Progress>,
    {
        if self.is_cancelled() {
            return;
        }
        self.shared.post_progress(values.into_iter().collect());
    }
}

impl<'a, W: AsyncWork> fmt::Debug for WorkContext<'a, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkContext")
            .field("task_id", &self.shared.id)
            .finish()
    }
}

enum EnvelopeData<W: AsyncWork> {
    Progress(Vec<W::Progress>),
    Result(Option<W::Output>),
}

/// A task plus the values it is sending home.
struct ResultEnvelope<W: AsyncWork> {
    task: Arc<Shared<W>>,
    data: EnvelopeData<W>,
}

impl<W: AsyncWork> Envelope for ResultEnvelope<W> {
    fn task_id(&self) -> TaskId {
        self.task.id
    }

    fn is_cancelled(&self) -> bool {
        self.task.state.is_cancelled()
    }

    fn finish(self: Box<Self>) {
        match self.data {
            EnvelopeData::Result(result) => self.task.finish(result),
            EnvelopeData::Progress(_) => {
                tracing::error!(task_id = %self.task.id, "progress envelope posted as final result")
            }
        }
    }

    fn progress_update(self: Box<Self>) {
        match self.data {
            EnvelopeData::Progress(values) => self.task.work.on_progress_update(values),
            EnvelopeData::Result(_) => {
                tracing::error!(task_id = %self.task.id, "result envelope posted as progress")
            }
        }
    }
}
