use crate::executor::PanicInfo;
use std::fmt;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by background work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot execute task: the task is already running")]
    AlreadyRunning,

    #[error("cannot execute task: the task has already been executed (a task can be executed only once)")]
    AlreadyFinished,

    #[error("work rejected: {reason}")]
    Rejected { reason: String },

    #[error("task was cancelled")]
    Cancelled,

    #[error("an error occurred while executing background work: {0}")]
    Execution(#[source] Arc<TaskFailure>),

    #[error("interrupted while waiting for task outcome")]
    Interrupted,

    #[error("timed out waiting for task outcome")]
    TimedOut,

    #[error("config error: {0}")]
    Config(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("main home context not initialized")]
    NotInitialized,

    #[error("main home context already initialized")]
    AlreadyInitialized,

    #[error("home context is no longer accepting messages")]
    Disconnected,
}

impl Error {
    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Error::Rejected {
            reason: reason.into(),
        }
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// The background failure behind an [`Error::Execution`], if any.
    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            Error::Execution(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Why background work did not produce a value.
#[derive(Debug)]
pub enum TaskFailure {
    /// The work returned an error.
    Error(BoxError),
    /// The work panicked.
    Panic(PanicInfo),
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Error(err) => write!(f, "{}", err),
            TaskFailure::Panic(info) => write!(f, "panicked: {}", info.message),
        }
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskFailure::Error(err) => Some(err.as_ref()),
            TaskFailure::Panic(_) => None,
        }
    }
}
