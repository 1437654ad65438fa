use homeward::prelude::*;
use homeward::{executor, TaskFailure};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("homeward=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Calls {
    pre: AtomicUsize,
    progress: Mutex<Vec<Vec<u32>>>,
    completed: Mutex<Vec<Option<u32>>>,
    cancelled: Mutex<Vec<Option<u32>>>,
}

struct Job42 {
    calls: Arc<Calls>,
    fail: bool,
    gate: Option<Arc<AtomicBool>>,
}

impl AsyncWork for Job42 {
    type Params = ();
    type Progress = u32;
    type Output = u32;

    fn on_pre_execute(&self) {
        self.calls.pre.fetch_add(1, Ordering::SeqCst);
    }

    fn do_in_background(&self, ctx: &WorkContext<'_, Self>, _: ()) -> Result<u32, BoxError> {
        if let Some(gate) = &self.gate {
            while !gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        ctx.publish_progress([1, 2]);
        if self.fail {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "backend unavailable").into());
        }
        Ok(42)
    }

    fn on_progress_update(&self, values: Vec<u32>) {
        self.calls.progress.lock().push(values);
    }

    fn on_post_execute(&self, result: Option<u32>) {
        self.calls.completed.lock().push(result);
    }

    fn on_cancelled_with(&self, result: Option<u32>) {
        self.calls.cancelled.lock().push(result);
    }
}

fn new_task(home: &HomeLoop, fail: bool, gate: Option<Arc<AtomicBool>>) -> (Task<Job42>, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let task = Task::with_dispatcher(
        Job42 {
            calls: calls.clone(),
            fail,
            gate,
        },
        home.dispatcher(),
    );
    (task, calls)
}

fn finish<W: AsyncWork>(home: &HomeLoop, task: &Task<W>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while task.status() != Status::Finished {
        assert!(Instant::now() < deadline, "task never finished");
        home.run_for(Duration::from_millis(10));
    }
}

#[test]
fn test_result_42() {
    init_tracing();
    let home = HomeLoop::new();
    let (task, calls) = new_task(&home, false, None);

    task.execute_on(executor::thread_pool().as_ref(), ()).unwrap();
    assert_eq!(task.get().unwrap(), 42);

    finish(&home, &task);
    home.run_pending();

    assert_eq!(calls.pre.load(Ordering::SeqCst), 1);
    assert_eq!(*calls.progress.lock(), vec![vec![1, 2]]);
    assert_eq!(*calls.completed.lock(), vec![Some(42)]);
    assert!(calls.cancelled.lock().is_empty());
}

#[test]
fn test_cancel_before_running() {
    init_tracing();
    let home = HomeLoop::new();
    let (task, calls) = new_task(&home, false, None);

    assert!(task.cancel(true));
    assert!(task.is_cancelled());

    finish(&home, &task);
    assert!(calls.completed.lock().is_empty());
    assert_eq!(*calls.cancelled.lock(), vec![None]);
    assert!(matches!(task.get(), Err(Error::Cancelled)));
}

#[test]
fn test_cancelled_task_completing_normally() {
    init_tracing();
    let home = HomeLoop::new();
    let gate = Arc::new(AtomicBool::new(false));
    let (task, calls) = new_task(&home, false, Some(gate.clone()));

    task.execute_on(executor::thread_pool().as_ref(), ()).unwrap();
    // let the work start before cancelling
    thread::sleep(Duration::from_millis(20));
    task.cancel(false);
    gate.store(true, Ordering::SeqCst);

    finish(&home, &task);
    home.run_pending();

    assert!(calls.completed.lock().is_empty());
    assert_eq!(calls.cancelled.lock().len(), 1);
    // progress published after cancellation never arrives
    assert!(calls.progress.lock().is_empty());
}

#[test]
fn test_failure_wraps_cause() {
    init_tracing();
    let home = HomeLoop::new();
    let (task, calls) = new_task(&home, true, None);

    task.execute_on(executor::thread_pool().as_ref(), ()).unwrap();

    let err = task.get().unwrap_err();
    match err.failure() {
        Some(TaskFailure::Error(cause)) => {
            let io = cause.downcast_ref::<std::io::Error>().unwrap();
            assert_eq!(io.to_string(), "backend unavailable");
        }
        other => panic!("expected wrapped error, got {:?}", other),
    }

    finish(&home, &task);
    assert_eq!(*calls.completed.lock(), vec![None]);
    assert!(calls.cancelled.lock().is_empty());
}

#[test]
fn test_failure_and_cancel() {
    init_tracing();
    let home = HomeLoop::new();
    let gate = Arc::new(AtomicBool::new(false));
    let (task, calls) = new_task(&home, true, Some(gate.clone()));

    task.execute_on(executor::thread_pool().as_ref(), ()).unwrap();
    thread::sleep(Duration::from_millis(20));
    task.cancel(false);
    gate.store(true, Ordering::SeqCst);

    finish(&home, &task);
    assert!(calls.completed.lock().is_empty());
    assert_eq!(*calls.cancelled.lock(), vec![None]);
}

#[test]
fn test_execute_twice_never_reruns() {
    init_tracing();
    let home = HomeLoop::new();
    let (task, calls) = new_task(&home, false, None);
    let pool = executor::thread_pool();

    task.execute_on(pool.as_ref(), ()).unwrap();
    let second = task.execute_on(pool.as_ref(), ());
    assert!(matches!(second, Err(Error::AlreadyRunning)));

    finish(&home, &task);
    let third = task.execute_on(pool.as_ref(), ());
    assert!(matches!(third, Err(Error::AlreadyFinished)));

    home.run_for(Duration::from_millis(20));
    assert_eq!(calls.pre.load(Ordering::SeqCst), 1);
    assert_eq!(calls.completed.lock().len(), 1);
}

#[test]
fn test_status_is_monotonic() {
    init_tracing();
    let home = HomeLoop::new();
    let gate = Arc::new(AtomicBool::new(false));
    let (task, _) = new_task(&home, false, Some(gate.clone()));

    let watcher = {
        let task = task.clone();
        thread::spawn(move || {
            let rank = |s: Status| match s {
                Status::Pending => 0,
                Status::Running => 1,
                Status::Finished => 2,
            };
            let mut last = 0;
            let mut seen = Vec::new();
            loop {
                let now = rank(task.status());
                assert!(now >= last, "status went backwards");
                if now != last || seen.is_empty() {
                    seen.push(now);
                }
                last = now;
                if now == 2 {
                    return seen;
                }
                thread::yield_now();
            }
        })
    };

    thread::sleep(Duration::from_millis(5));
    task.execute_on(executor::thread_pool().as_ref(), ()).unwrap();
    thread::sleep(Duration::from_millis(5));
    gate.store(true, Ordering::SeqCst);
    finish(&home, &task);

    let seen = watcher.join().unwrap();
    assert_eq!(seen, vec![0, 1, 2]);
}

#[test]
fn test_get_timeout_then_result() {
    init_tracing();
    let home = HomeLoop::new();
    let gate = Arc::new(AtomicBool::new(false));
    let (task, _) = new_task(&home, false, Some(gate.clone()));

    task.execute_on(executor::thread_pool().as_ref(), ()).unwrap();
    assert!(matches!(
        task.get_timeout(Duration::from_millis(10)),
        Err(Error::TimedOut)
    ));

    gate.store(true, Ordering::SeqCst);
    assert_eq!(task.get_timeout(Duration::from_secs(5)).unwrap(), 42);
    finish(&home, &task);
}

#[test]
fn test_forced_interrupt_reaches_work() {
    init_tracing();
    struct Sleeper {
        interrupted: Arc<AtomicBool>,
    }

    impl AsyncWork for Sleeper {
        type Params = ();
        type Progress = ();
        type Output = ();

        fn do_in_background(&self, ctx: &WorkContext<'_, Self>, _: ()) -> Result<(), BoxError> {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !ctx.is_interrupted() && Instant::now() < deadline {
                thread::park_timeout(Duration::from_secs(1));
            }
            self.interrupted.store(ctx.is_interrupted(), Ordering::SeqCst);
            Ok(())
        }
    }

    let home = HomeLoop::new();
    let interrupted = Arc::new(AtomicBool::new(false));
    let task = Task::with_dispatcher(
        Sleeper {
            interrupted: interrupted.clone(),
        },
        home.dispatcher(),
    );

    task.execute_on(executor::thread_pool().as_ref(), ()).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(task.cancel(true));

    finish(&home, &task);
    assert!(interrupted.load(Ordering::SeqCst));
}

/// Hands jobs to the shared pool while open, refuses them while closed.
struct Gate {
    open: AtomicBool,
}

impl Executor for Gate {
    fn execute(&self, job: Job) -> homeward::Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::rejected("gate closed"));
        }
        executor::thread_pool().execute(job)
    }
}

#[test]
fn test_queued_task_refused_later_still_completes() {
    init_tracing();
    let home = HomeLoop::new();
    let gate = Arc::new(Gate {
        open: AtomicBool::new(true),
    });
    let serial = SerialExecutor::new(gate.clone());

    let release = Arc::new(AtomicBool::new(false));
    let (head, head_calls) = new_task(&home, false, Some(release.clone()));
    let (queued, queued_calls) = new_task(&home, false, None);

    head.execute_on(&serial, ()).unwrap();
    queued.execute_on(&serial, ()).unwrap();
    assert_eq!(queued.status(), Status::Running);

    // the head finishes while the gate refuses the queued task
    gate.open.store(false, Ordering::SeqCst);
    release.store(true, Ordering::SeqCst);
    assert_eq!(head.get().unwrap(), 42);

    match queued.get_timeout(Duration::from_secs(5)) {
        Err(Error::Rejected { reason }) => assert_eq!(reason, "gate closed"),
        other => panic!("expected rejection, got {:?}", other),
    }
    gate.open.store(true, Ordering::SeqCst);

    finish(&home, &head);
    finish(&home, &queued);
    assert_eq!(*head_calls.completed.lock(), vec![Some(42)]);
    assert_eq!(queued_calls.pre.load(Ordering::SeqCst), 1);
    assert_eq!(*queued_calls.completed.lock(), vec![None]);
    assert!(queued_calls.progress.lock().is_empty());
    assert!(queued_calls.cancelled.lock().is_empty());
    assert!(!serial.is_busy());
    assert_eq!(serial.pending(), 0);
}
