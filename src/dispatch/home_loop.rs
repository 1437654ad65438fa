use super::{Dispatcher, HomeContext, Message};
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

enum LoopEvent {
    Message(Message),
    Quit,
}

struct LoopContext {
    tx: Sender<LoopEvent>,
}

impl HomeContext for LoopContext {
    fn post(&self, message: Message) -> Result<()> {
        self.tx
            .send(LoopEvent::Message(message))
            .map_err(|_| Error::Disconnected)
    }
}

/// Message loop owned by one thread.
///
/// `HomeLoop` is `!Send`: it stays on the thread that created it, and every
/// message posted through its [`Dispatcher`] is handled there, one at a time,
/// in post order. Dropping the loop makes further posts fail with
/// [`Error::Disconnected`].
pub struct HomeLoop {
    rx: Receiver<LoopEvent>,
    context: Arc<LoopContext>,
    /// A quit consumed by `run_pending`, owed to the next blocking run.
    quit_requested: Cell<bool>,
    _not_send: PhantomData<*const ()>,
}

impl HomeLoop {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            rx,
            context: Arc::new(LoopContext { tx }),
            quit_requested: Cell::new(false),
            _not_send: PhantomData,
        }
    }

    /// Create a loop on the calling thread and make it the main home
    /// context. Fails if a main context already exists.
    pub fn prepare_main() -> Result<Self> {
        let home = Self::new();
        Dispatcher::install_main(home.dispatcher())?;
        tracing::debug!(
            thread = std::thread::current().name().unwrap_or("unnamed"),
            "main home loop prepared"
        );
        Ok(home)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.context.clone())
    }

    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle {
            tx: self.context.tx.clone(),
        }
    }

    /// Ask [`run`](Self::run) to return once earlier messages are handled.
    pub fn quit(&self) {
        let _ = self.context.tx.send(LoopEvent::Quit);
    }

    /// Messages posted but not yet handled.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Handle everything already queued without blocking. Returns the number
    /// of messages handled.
    ///
    /// Stops at a quit request. The request is kept, so the next
    /// [`run`](Self::run) or [`run_until`](Self::run_until) returns at once.
    pub fn run_pending(&self) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(LoopEvent::Message(message)) => {
                    message.dispatch();
                    handled += 1;
                }
                Ok(LoopEvent::Quit) => {
                    self.quit_requested.set(true);
                    return handled;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return handled,
            }
        }
    }

    /// Handle messages until quit or until `deadline`. Returns the number of
    /// messages handled.
    pub fn run_until(&self, deadline: Instant) -> usize {
        if self.quit_requested.replace(false) {
            return 0;
        }
        let mut handled = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(LoopEvent::Message(message)) => {
                    message.dispatch();
                    handled += 1;
                }
                Ok(LoopEvent::Quit) => return handled,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return handled
                }
            }
        }
    }

    pub fn run_for(&self, timeout: Duration) -> usize {
        self.run_until(Instant::now() + timeout)
    }

    /// Handle messages until [`quit`](Self::quit) is called.
    pub fn run(&self) -> usize {
        if self.quit_requested.replace(false) {
            return 0;
        }
        let mut handled = 0;
        while let Ok(event) = self.rx.recv() {
            match event {
                LoopEvent::Message(message) => {
                    message.dispatch();
                    handled += 1;
                }
                LoopEvent::Quit => break,
            }
        }
        handled
    }
}

impl Default for HomeLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HomeLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeLoop")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Stops a [`HomeLoop`] from any thread.
#[derive(Clone)]
pub struct QuitHandle {
    tx: Sender<LoopEvent>,
}

impl QuitHandle {
    pub fn quit(&self) {
        let _ = self.tx.send(LoopEvent::Quit);
    }
}

impl std::fmt::Debug for QuitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuitHandle").finish_non_exhaustive()
    }
}
