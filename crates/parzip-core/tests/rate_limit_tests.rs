use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parzip_core::{PipelineTelemetry, RateLimit, ZipError};

#[derive(Default)]
struct MaxActiveTelemetry {
    max_active: AtomicUsize,
}

impl PipelineTelemetry for MaxActiveTelemetry {
    fn on_worker_admitted(&self, active: usize) {
        self.max_active.fetch_max(active, Ordering::SeqCst);
    }
    fn on_worker_released(&self, _active: usize) {}
    fn on_bytes_pending(&self, _pending: i64) {}
}

#[test]
fn admission_never_exceeds_worker_cap() {
    let telemetry = Arc::new(MaxActiveTelemetry::default());
    let sink: Arc<dyn PipelineTelemetry> = telemetry.clone() as Arc<dyn PipelineTelemetry>;
    let limiter = Arc::new(RateLimit::with_telemetry(3, 0, sink));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..12 {
        let limiter = Arc::clone(&limiter);
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(thread::spawn(move || {
            let exec = limiter.request_execution().expect("admission");
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            running.fetch_sub(1, Ordering::SeqCst);
            exec.finish(0);
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread");
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(telemetry.max_active.load(Ordering::SeqCst) <= 3);
}

#[test]
fn byte_budget_blocks_until_writer_release() {
    let limiter = Arc::new(RateLimit::new(4, 100));

    let exec = limiter.request_execution().expect("admission");
    exec.finish(150);

    let admitted = Arc::new(AtomicUsize::new(0));
    let waiter = {
        let limiter = Arc::clone(&limiter);
        let admitted = Arc::clone(&admitted);
        thread::spawn(move || {
            let exec = limiter.request_execution().expect("admission after release");
            admitted.store(1, Ordering::SeqCst);
            exec.finish(0);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(
        admitted.load(Ordering::SeqCst),
        0,
        "admission should wait while pending bytes exceed the budget"
    );

    limiter.release(150);
    waiter.join().expect("waiter thread");
    assert_eq!(admitted.load(Ordering::SeqCst), 1);
}

#[test]
fn negative_release_pre_credits_pending_bytes() {
    let limiter = Arc::new(RateLimit::new(1, 100));

    // Pre-credit a small unbuffered payload, as the symlink path does.
    limiter.release(-40);
    let exec = limiter.request_execution().expect("admission");
    exec.finish(0);

    // The writer-side release balances back to zero.
    limiter.release(40);
    let exec = limiter.request_execution().expect("admission after balance");
    exec.finish(0);
}

#[test]
fn dropping_an_unfinished_execution_frees_the_slot() {
    let limiter = Arc::new(RateLimit::new(1, 0));

    let exec = limiter.request_execution().expect("first admission");
    drop(exec);

    let exec = limiter.request_execution().expect("slot should be free again");
    exec.finish(0);
}

#[test]
fn stop_fails_new_admissions() {
    let limiter = Arc::new(RateLimit::new(2, 0));
    limiter.stop();
    assert!(matches!(
        limiter.request_execution(),
        Err(ZipError::ShuttingDown)
    ));
}

#[test]
fn stop_wakes_blocked_waiters() {
    let limiter = Arc::new(RateLimit::new(1, 0));
    let held = limiter.request_execution().expect("admission");

    let waiter = {
        let limiter = Arc::clone(&limiter);
        thread::spawn(move || limiter.request_execution().map(|exec| exec.finish(0)))
    };

    thread::sleep(Duration::from_millis(20));
    limiter.stop();
    let result = waiter.join().expect("waiter thread");
    assert!(matches!(result, Err(ZipError::ShuttingDown)));

    held.finish(0);
}
