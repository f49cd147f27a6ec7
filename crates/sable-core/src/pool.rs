// src/pool.rs
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::error::{SableError, SableResult};
use crate::queue::WorkQueue;

/// A deferred unit of work executed by exactly one worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// How an idle worker waits for the next task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePolicy {
    /// Sleep on the queue's condition variable until a task is pushed.
    #[default]
    BlockingWait,
    /// Spin on `try_pop`, yielding the processor between attempts.
    /// Burns one core per idle worker; only sensible for small pools.
    BusyPoll,
}

impl SchedulePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blocking" | "blocking-wait" => Some(SchedulePolicy::BlockingWait),
            "busy-poll" | "busy_poll" | "poll" => Some(SchedulePolicy::BusyPoll),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Worker count, 0 means host parallelism.
    pub size: usize,
    pub policy: SchedulePolicy,
    pub pin_workers: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: 0,
            policy: SchedulePolicy::BlockingWait,
            pin_workers: false,
        }
    }
}

/// Fixed set of long-lived worker threads sharing one [`WorkQueue`].
///
/// Dropping the pool shuts it down and joins every worker.
pub struct ThreadPool {
    queue: Arc<WorkQueue<Task>>,
    stop: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
    policy: SchedulePolicy,
}

impl ThreadPool {
    /// Create a pool of `size` workers (0 = host parallelism).
    pub fn new(size: usize, policy: SchedulePolicy) -> SableResult<Self> {
        Self::with_options(PoolOptions {
            size,
            policy,
            ..PoolOptions::default()
        })
    }

    /// Create a pool sized to the host's available parallelism.
    pub fn with_default_size(policy: SchedulePolicy) -> SableResult<Self> {
        Self::new(0, policy)
    }

    pub fn with_options(options: PoolOptions) -> SableResult<Self> {
        let size = if options.size == 0 {
            num_cpus::get().max(1)
        } else {
            options.size
        };
        let core_ids = if options.pin_workers {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        let queue: Arc<WorkQueue<Task>> = Arc::new(WorkQueue::new());
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(size);

        for i in 0..size {
            let core_id = (!core_ids.is_empty()).then(|| core_ids[i % core_ids.len()]);
            let worker_queue = queue.clone();
            let stop_flag = stop.clone();
            let policy = options.policy;

            let spawned = thread::Builder::new()
                .name(format!("sable-worker-{}", i))
                .spawn(move || {
                    if let Some(id) = core_id {
                        if core_affinity::set_for_current(id) {
                            debug!(worker = i, cpu = id.id, "worker pinned");
                        } else {
                            warn!(worker = i, cpu = id.id, "failed to pin worker");
                        }
                    }
                    match policy {
                        SchedulePolicy::BlockingWait => blocking_loop(i, &worker_queue),
                        SchedulePolicy::BusyPoll => busy_poll_loop(i, &worker_queue, &stop_flag),
                    }
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Tear down what was started before reporting.
                    stop.store(true, Ordering::Release);
                    queue.close();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(SableError::WorkerSpawn(e.to_string()));
                }
            }
        }

        info!(workers = size, policy = ?options.policy, "thread pool started");

        Ok(Self {
            queue,
            stop,
            workers: Mutex::new(handles),
            size,
            policy: options.policy,
        })
    }

    /// Enqueue a task for eventual execution. Returns immediately.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.stop.load(Ordering::Acquire) || !self.queue.push(Box::new(task)) {
            warn!("task submitted after shutdown, dropping it");
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Number of tasks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Signal every worker to stop and wait for all of them.
    ///
    /// In-flight tasks are never cancelled. Under `BlockingWait` the queue is
    /// drained first; under `BusyPoll` workers exit at their next iteration.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        self.queue.close();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                // A task dropped the last pool reference from inside a worker.
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
        info!("thread pool stopped");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn blocking_loop(id: usize, queue: &WorkQueue<Task>) {
    while let Some(task) = queue.wait_and_pop() {
        run_task(id, task);
    }
    debug!(worker = id, "worker exiting");
}

fn busy_poll_loop(id: usize, queue: &WorkQueue<Task>, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        match queue.try_pop() {
            Some(task) => run_task(id, task),
            None => thread::yield_now(),
        }
    }
    debug!(worker = id, "worker exiting");
}

fn run_task(id: usize, task: Task) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(worker = id, panic = %msg, "task panicked");
    }
}
