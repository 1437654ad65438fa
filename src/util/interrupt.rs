//! Per-thread interrupt flags.
//!
//! Rust threads cannot be preempted, so interruption is a flag the target
//! thread observes: blocking waits in this crate give up with
//! [`Error::Interrupted`](crate::Error::Interrupted) and background work can
//! poll [`is_interrupted`]. Raising the flag also unparks the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};

thread_local! {
    static CURRENT: InterruptHandle = InterruptHandle::new(thread::current());
}

#[derive(Debug)]
struct Flag {
    raised: AtomicBool,
    thread: Thread,
}

/// Handle used to interrupt one particular thread from anywhere.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    flag: Arc<Flag>,
}

impl InterruptHandle {
    fn new(thread: Thread) -> Self {
        Self {
            flag: Arc::new(Flag {
                raised: AtomicBool::new(false),
                thread,
            }),
        }
    }

    /// Raise the flag and wake the thread if it is parked.
    pub fn interrupt(&self) {
        self.flag.raised.store(true, Ordering::Release);
        self.flag.thread.unpark();
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.raised.load(Ordering::Acquire)
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.flag.thread.name()
    }

    fn take(&self) -> bool {
        self.flag.raised.swap(false, Ordering::AcqRel)
    }
}

/// Handle for the calling thread.
pub fn current() -> InterruptHandle {
    CURRENT.with(|handle| handle.clone())
}

/// Whether the calling thread has a pending interrupt. Does not clear it.
pub fn is_interrupted() -> bool {
    CURRENT.with(|handle| handle.is_interrupted())
}

/// Clear the calling thread's interrupt, returning whether one was pending.
pub fn take_interrupt() -> bool {
    CURRENT.with(|handle| handle.take())
}
