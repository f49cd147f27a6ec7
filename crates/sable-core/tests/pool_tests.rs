use sable_core::pool::{PoolOptions, SchedulePolicy, ThreadPool};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn run_all_exactly_once(policy: SchedulePolicy) {
    let workers = 3;
    let tasks = 200;
    let pool = ThreadPool::new(workers, policy).expect("pool should start");
    assert_eq!(pool.size(), workers);

    let seen = Arc::new(Mutex::new(Vec::with_capacity(tasks)));
    let done = Arc::new(AtomicUsize::new(0));
    for i in 0..tasks {
        let seen = seen.clone();
        let done = done.clone();
        pool.submit(move || {
            seen.lock().unwrap().push(i);
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    // Busy-poll workers stop at the flag, so wait for completion first.
    while done.load(Ordering::SeqCst) < tasks {
        thread::sleep(Duration::from_millis(5));
    }
    pool.shutdown();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), tasks, "every task runs exactly once");
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), tasks);
}

#[test]
fn test_blocking_pool_runs_every_task_once() {
    run_all_exactly_once(SchedulePolicy::BlockingWait);
}

#[test]
fn test_busy_poll_pool_runs_every_task_once() {
    run_all_exactly_once(SchedulePolicy::BusyPoll);
}

#[test]
fn test_blocking_shutdown_drains_queue() {
    let pool = ThreadPool::new(2, SchedulePolicy::BlockingWait).unwrap();
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..50 {
        let done = done.clone();
        pool.submit(move || {
            thread::sleep(Duration::from_millis(1));
            done.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 50);
}

#[test]
fn test_drop_joins_workers() {
    let finished = Arc::new(AtomicUsize::new(0));
    {
        let pool = ThreadPool::new(4, SchedulePolicy::BlockingWait).unwrap();
        for _ in 0..4 {
            let finished = finished.clone();
            pool.submit(move || {
                thread::sleep(Duration::from_millis(30));
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }
    }
    // Drop waited for the in-flight tasks.
    assert_eq!(finished.load(Ordering::SeqCst), 4);
}

#[test]
fn test_in_flight_task_is_not_cancelled() {
    let pool = ThreadPool::new(1, SchedulePolicy::BusyPoll).unwrap();
    let finished = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    {
        let finished = finished.clone();
        let started = started.clone();
        pool.submit(move || {
            started.store(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            finished.store(1, Ordering::SeqCst);
        });
    }
    while started.load(Ordering::SeqCst) == 0 {
        thread::yield_now();
    }
    pool.shutdown();
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_twice_is_harmless() {
    let pool = ThreadPool::with_options(PoolOptions {
        size: 2,
        ..PoolOptions::default()
    })
    .unwrap();
    pool.shutdown();
    pool.shutdown();
    assert_eq!(pool.pending(), 0);
}
