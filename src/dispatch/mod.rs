//! Ordered hand-off of task messages to a home context.
//!
//! Workers never run user callbacks. They post a [`Message`] to the task's
//! home context, and the thread that owns that context calls
//! [`Message::dispatch`] in post order.

mod home_loop;

pub use home_loop::{HomeLoop, QuitHandle};

use crate::error::{Error, Result};
use crate::task::TaskId;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// The final result of a task. Exactly one per task.
    PostResult = 0x1,
    /// A batch of progress values.
    PostProgress = 0x2,
}

/// Typed payload behind a [`Message`], implemented by the task module.
pub(crate) trait Envelope: Send {
    fn task_id(&self) -> TaskId;
    fn is_cancelled(&self) -> bool;
    /// Deliver as a final result.
    fn finish(self: Box<Self>);
    /// Deliver as a progress update.
    fn progress_update(self: Box<Self>);
}

/// A tagged message bound for a home context.
pub struct Message {
    what: MessageKind,
    envelope: Box<dyn Envelope>,
}

impl Message {
    pub(crate) fn new(what: MessageKind, envelope: Box<dyn Envelope>) -> Self {
        Self { what, envelope }
    }

    pub fn what(&self) -> MessageKind {
        self.what
    }

    pub fn task_id(&self) -> TaskId {
        self.envelope.task_id()
    }

    /// Run the task callback this message carries on the calling thread.
    ///
    /// Must only be called by the thread that owns the home context.
    pub fn dispatch(self) {
        match self.what {
            MessageKind::PostResult => self.envelope.finish(),
            MessageKind::PostProgress => self.envelope.progress_update(),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("what", &self.what)
            .field("task_id", &self.task_id())
            .finish()
    }
}

/// A single-threaded message queue that delivers in post order.
///
/// Implement this to host tasks on an existing event loop: forward each
/// message to the loop's thread and call [`Message::dispatch`] there.
pub trait HomeContext: Send + Sync {
    fn post(&self, message: Message) -> Result<()>;
}

static MAIN_DISPATCHER: OnceLock<Dispatcher> = OnceLock::new();

/// Posting side of a home context.
#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<dyn HomeContext>,
}

impl Dispatcher {
    pub fn new(context: Arc<dyn HomeContext>) -> Self {
        Self { context }
    }

    /// The process-wide main home context, see [`HomeLoop::prepare_main`].
    pub fn main() -> Result<Dispatcher> {
        MAIN_DISPATCHER.get().cloned().ok_or(Error::NotInitialized)
    }

    pub(crate) fn install_main(dispatcher: Dispatcher) -> Result<()> {
        MAIN_DISPATCHER
            .set(dispatcher)
            .map_err(|_| Error::AlreadyInitialized)
    }

    pub fn post(&self, message: Message) -> Result<()> {
        self.context.post(message)
    }

    /// Post progress unless the task is already cancelled.
    pub(crate) fn post_progress(&self, envelope: Box<dyn Envelope>) {
        if envelope.is_cancelled() {
            tracing::trace!(task_id = %envelope.task_id(), "progress dropped after cancellation");
            return;
        }
        let task_id = envelope.task_id();
        if let Err(err) = self.post(Message::new(MessageKind::PostProgress, envelope)) {
            tracing::warn!(%task_id, error = %err, "progress update undeliverable");
        }
    }

    pub(crate) fn post_result(&self, envelope: Box<dyn Envelope>) {
        let task_id = envelope.task_id();
        if let Err(err) = self.post(Message::new(MessageKind::PostResult, envelope)) {
            tracing::warn!(%task_id, error = %err, "final result undeliverable");
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
