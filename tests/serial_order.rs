use homeward::prelude::*;
use homeward::executor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_abc_start_order() {
    let serial = executor::serial();
    let sequence = Arc::new(AtomicUsize::new(0));
    let starts = Arc::new(Mutex::new(Vec::new()));

    for name in ["A", "B", "C"] {
        let sequence = sequence.clone();
        let starts = starts.clone();
        serial
            .execute(Job::new(move || {
                let n = sequence.fetch_add(1, Ordering::SeqCst);
                starts.lock().push((name, n));
                thread::sleep(Duration::from_millis(10));
            }))
            .unwrap();
    }

    wait_for(|| starts.lock().len() == 3);
    assert_eq!(*starts.lock(), vec![("A", 0), ("B", 1), ("C", 2)]);
}

#[test]
fn test_never_more_than_one_active() {
    let config = PoolConfig::builder()
        .core_threads(4)
        .max_threads(8)
        .queue_capacity(64)
        .build()
        .unwrap();
    let serial = SerialExecutor::new(Arc::new(ThreadPool::new(config).unwrap()));

    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    // submit from several threads at once
    let submitters: Vec<_> = (0..4)
        .map(|t| {
            let serial = serial.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            let order = order.clone();
            thread::spawn(move || {
                let mut submitted = Vec::new();
                for i in 0..25 {
                    let id = t * 100 + i;
                    let active = active.clone();
                    let max_seen = max_seen.clone();
                    let order = order.clone();
                    serial
                        .execute(Job::new(move || {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            order.lock().push(id);
                            thread::yield_now();
                            active.fetch_sub(1, Ordering::SeqCst);
                        }))
                        .unwrap();
                    submitted.push(id);
                }
                submitted
            })
        })
        .collect();

    let per_thread: Vec<Vec<usize>> = submitters.into_iter().map(|h| h.join().unwrap()).collect();

    wait_for(|| order.lock().len() == 100);
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);

    // each submitter's jobs start in the order it submitted them
    let order = order.lock().clone();
    for submitted in per_thread {
        let started: Vec<usize> = order
            .iter()
            .copied()
            .filter(|id| submitted.contains(id))
            .collect();
        assert_eq!(started, submitted);
    }
}

#[test]
fn test_serial_tasks_start_in_submission_order() {
    struct Stamp {
        sequence: Arc<AtomicUsize>,
        started: Arc<Mutex<Vec<(usize, usize)>>>,
    }

    impl AsyncWork for Stamp {
        type Params = usize;
        type Progress = ();
        type Output = usize;

        fn do_in_background(&self, _ctx: &WorkContext<'_, Self>, id: usize) -> Result<usize, BoxError> {
            let n = self.sequence.fetch_add(1, Ordering::SeqCst);
            self.started.lock().push((id, n));
            thread::sleep(Duration::from_millis(2));
            Ok(id)
        }
    }

    let home = HomeLoop::new();
    let serial = SerialExecutor::new(executor::thread_pool());
    let sequence = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<_> = (0..5)
        .map(|id| {
            let task = Task::with_dispatcher(
                Stamp {
                    sequence: sequence.clone(),
                    started: started.clone(),
                },
                home.dispatcher(),
            );
            task.execute_on(&serial, id).unwrap();
            task
        })
        .collect();

    for (id, task) in tasks.iter().enumerate() {
        assert_eq!(task.get().unwrap(), id);
    }
    assert_eq!(
        *started.lock(),
        (0..5).map(|i| (i, i)).collect::<Vec<_>>()
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    while tasks.iter().any(|t| t.status() != Status::Finished) && Instant::now() < deadline {
        home.run_for(Duration::from_millis(10));
    }
    assert!(tasks.iter().all(|t| t.status() == Status::Finished));
}
