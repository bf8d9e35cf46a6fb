use super::*;
use crate::retry::{ErrorKind, RetryPolicy, ServiceError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Work<T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send>>;

/// Records start order and peak concurrency across tasks.
#[derive(Clone, Default)]
struct Tracker {
    started: Arc<Mutex<Vec<&'static str>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Tracker {
    fn job(&self, name: &'static str, busy: Duration) -> impl FnMut() -> Work<&'static str> + Send {
        let tracker = self.clone();
        move || -> Work<&'static str> {
            let tracker = tracker.clone();
            Box::pin(async move {
                tracker.started.lock().unwrap().push(name);
                let now = tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
                tracker.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(busy).await;
                tracker.active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ServiceError>(name)
            })
        }
    }

    fn order(&self) -> Vec<&'static str> {
        self.started.lock().unwrap().clone()
    }
}

/// Work failing with `err` the first `failures` calls, then succeeding.
fn flaky(
    calls: &Arc<AtomicU32>,
    failures: u32,
    err: ServiceError,
) -> impl FnMut() -> Work<u32> + Send {
    let calls = Arc::clone(calls);
    move || -> Work<u32> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let err = err.clone();
        Box::pin(async move {
            if n < failures {
                Err(err)
            } else {
                Ok(n + 1)
            }
        })
    }
}

#[tokio::test(start_paused = true)]
async fn normal_tasks_run_in_submission_order_one_at_a_time() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let tracker = Tracker::default();
    let a = scheduler.submit(Priority::Normal, tracker.job("A", Duration::from_millis(50)));
    let b = scheduler.submit(Priority::Normal, tracker.job("B", Duration::from_millis(50)));
    let c = scheduler.submit(Priority::Normal, tracker.job("C", Duration::from_millis(50)));

    assert_eq!(a.await.unwrap(), "A");
    assert_eq!(b.await.unwrap(), "B");
    assert_eq!(c.await.unwrap(), "C");
    assert_eq!(tracker.order(), vec!["A", "B", "C"]);
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn priority_task_jumps_waiting_normal_task() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let tracker = Tracker::default();
    let a = scheduler.submit(Priority::Normal, tracker.job("A", Duration::from_millis(100)));
    let b = scheduler.submit(Priority::Normal, tracker.job("B", Duration::from_millis(10)));
    let p = scheduler.submit(Priority::High, tracker.job("P", Duration::from_millis(10)));

    let stats = scheduler.stats();
    assert_eq!(stats.running, 1);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.pending_high, 1);

    a.await.unwrap();
    p.await.unwrap();
    b.await.unwrap();
    assert_eq!(tracker.order(), vec!["A", "P", "B"]);
}

#[tokio::test(start_paused = true)]
async fn high_tasks_keep_fifo_among_themselves() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let tracker = Tracker::default();
    let mut handles = vec![
        scheduler.submit(Priority::Normal, tracker.job("running", Duration::from_millis(100))),
        scheduler.submit(Priority::Normal, tracker.job("n1", Duration::from_millis(1))),
        scheduler.submit(Priority::Normal, tracker.job("n2", Duration::from_millis(1))),
        scheduler.submit(Priority::High, tracker.job("h1", Duration::from_millis(1))),
        scheduler.submit(Priority::High, tracker.job("h2", Duration::from_millis(1))),
    ];
    for h in handles.drain(..) {
        h.await.unwrap();
    }
    assert_eq!(tracker.order(), vec!["running", "h1", "h2", "n1", "n2"]);
}

#[tokio::test(start_paused = true)]
async fn running_never_exceeds_limit() {
    let scheduler = Scheduler::new(2, RetryPolicy::default());
    let tracker = Tracker::default();
    let names = ["t1", "t2", "t3", "t4", "t5", "t6"];
    let handles: Vec<_> = names
        .iter()
        .map(|&n| scheduler.submit(Priority::Normal, tracker.job(n, Duration::from_millis(20))))
        .collect();
    let stats = scheduler.stats();
    assert_eq!(stats.running, 2);
    assert!(stats.is_saturated());
    assert_eq!(stats.pending, 4);
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 2);
    let stats = scheduler.stats();
    assert!(stats.is_idle());
    assert_eq!(stats.succeeded, 6);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_settles_after_one_attempt() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();
    let handle = scheduler.submit(
        Priority::Normal,
        flaky(&calls, u32::MAX, ServiceError::status(400, "invalid response schema")),
    );
    let err = handle.await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Fatal));
    match &err {
        TaskError::Service { attempts, source, .. } => {
            assert_eq!(*attempts, 1);
            assert_eq!(source.message, "invalid response schema");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(scheduler.stats().failed, 1);
}

#[tokio::test(start_paused = true)]
async fn server_error_retried_until_budget_exhausted() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();
    let handle = scheduler.submit(
        Priority::Normal,
        flaky(&calls, u32::MAX, ServiceError::status(500, "internal")),
    );
    let err = handle.await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Transient));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(6000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(6100), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_succeeds() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();
    let handle = scheduler.submit(
        Priority::High,
        flaky(&calls, 2, ServiceError::status(429, "Too Many Requests")),
    );
    assert_eq!(handle.await.unwrap(), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(10_000), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(16_000), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn failing_task_frees_slot_for_next() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let calls = Arc::new(AtomicU32::new(0));
    let tracker = Tracker::default();
    let bad = scheduler.submit(
        Priority::Normal,
        flaky(&calls, u32::MAX, ServiceError::message("permission denied")),
    );
    let good = scheduler.submit(Priority::Normal, tracker.job("after", Duration::from_millis(1)));
    assert!(bad.await.is_err());
    assert_eq!(good.await.unwrap(), "after");
    let stats = scheduler.stats();
    assert_eq!((stats.succeeded, stats.failed), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn handle_reports_retrying_state() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let calls = Arc::new(AtomicU32::new(0));
    let handle = scheduler.submit(
        Priority::Normal,
        flaky(&calls, 1, ServiceError::message("Failed to fetch")),
    );
    assert_eq!(handle.state(), TaskState::Running);
    // Let the first attempt fail and the loop enter its 2s backoff.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.state(), TaskState::Retrying(1));
    assert_eq!(scheduler.stats().running, 1);
    assert_eq!(handle.await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn per_task_policy_overrides_default() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::with_retries(4, Duration::from_millis(10));
    assert_eq!(scheduler.policy(), &RetryPolicy::default());
    assert_eq!(scheduler.limit(), 1);
    let handle = scheduler.submit_with(
        Priority::Normal,
        policy,
        flaky(&calls, u32::MAX, ServiceError::status(503, "unavailable")),
    );
    handle.await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn panicking_work_settles_handle_and_keeps_queue_moving() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let tracker = Tracker::default();
    let boom = scheduler.submit(Priority::Normal, || -> Work<u32> {
        Box::pin(async {
            let explode = true;
            if explode {
                panic!("work exploded");
            }
            Ok::<u32, ServiceError>(0)
        })
    });
    let next = scheduler.submit(Priority::Normal, tracker.job("next", Duration::from_millis(1)));
    assert!(matches!(boom.await, Err(TaskError::QueueInternal(_))));
    assert_eq!(next.await.unwrap(), "next");
    assert_eq!(scheduler.stats().running, 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_callback_still_refills_the_gate() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let first = scheduler.submit(Priority::Normal, || async { Ok::<_, ServiceError>(1u32) });
    first.on_settled(|_| panic!("callback bug"));
    let second = scheduler.submit(Priority::Normal, || async { Ok::<_, ServiceError>(2u32) });

    let settled = tokio::time::timeout(Duration::from_secs(2), second).await;
    assert_eq!(settled.expect("second task left in the queue").unwrap(), 2);
    let stats = scheduler.stats();
    assert!(stats.is_idle(), "{stats:?}");
    assert_eq!(stats.succeeded, 2);
}

#[tokio::test(start_paused = true)]
async fn dispatched_task_reports_running_before_first_poll() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let tracker = Tracker::default();
    let first = scheduler.submit(Priority::Normal, tracker.job("first", Duration::from_millis(10)));
    let second = scheduler.submit(Priority::Normal, tracker.job("second", Duration::from_millis(10)));

    // Nothing has been polled yet, but the first task already holds the slot.
    assert!(tracker.order().is_empty());
    assert_eq!(scheduler.stats().running, 1);
    assert_eq!(first.state(), TaskState::Running);
    assert_eq!(second.state(), TaskState::Pending);
    assert!(!first.state().is_terminal());

    first.await.unwrap();
    second.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn idle_waits_for_all_tasks() {
    let scheduler = Scheduler::new(2, RetryPolicy::default());
    let tracker = Tracker::default();
    for name in ["a", "b", "c"] {
        let handle = scheduler.submit(Priority::Normal, tracker.job(name, Duration::from_millis(30)));
        handle.on_settled(|_| {});
    }
    scheduler.idle().await;
    let stats = scheduler.stats();
    assert!(stats.is_idle());
    assert_eq!(stats.succeeded, 3);
    assert_eq!(tracker.order().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn callback_receives_outcome() {
    let scheduler = Scheduler::new(1, RetryPolicy::default());
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = scheduler.submit(Priority::High, || async { Ok::<_, ServiceError>("ok") });
    let id = handle.id();
    handle.on_settled(move |r| {
        let _ = tx.send(r);
    });
    assert_eq!(rx.await.unwrap().unwrap(), "ok");
    assert!(id >= 1);
}

#[test]
fn blocking_wait_from_sync_code() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let scheduler = Scheduler::with_runtime(1, RetryPolicy::default(), rt.handle().clone());
    let first = scheduler.submit(Priority::Normal, || async { Ok::<_, ServiceError>(1u8) });
    let second = scheduler.submit(Priority::Normal, || async { Ok::<_, ServiceError>(2u8) });
    assert_ne!(first.id(), second.id());
    assert_eq!(first.wait_blocking().unwrap(), 1);
    assert_eq!(second.wait_blocking().unwrap(), 2);
}
