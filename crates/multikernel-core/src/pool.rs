//! Bounded worker pool.
//!
//! Executes submitted closures on a set of OS worker threads with a bounded
//! FIFO queue. Tasks are unordered across workers; within a single worker
//! they run in dequeue order. The pool never cancels a running task:
//! `stop` drains the queue, then workers exit.

use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use tracing::{debug, error, warn};

/// A unit of work accepted by the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Minimum worker count.
    pub min_threads: usize,
    /// Maximum worker count; the pool runs this many workers.
    pub max_threads: usize,
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Worker stack size in bytes.
    pub stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            min_threads: 2,
            max_threads: 8,
            queue_capacity: 1024,
            stack_size: 1024 * 1024,
        }
    }
}

impl WorkerPoolConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] unless
    /// `0 < min_threads <= max_threads`, `queue_capacity > 0` and
    /// `stack_size > 0`.
    pub fn validate(&self) -> Result<()> {
        if self.min_threads == 0 {
            return Err(KernelError::config("min_threads must be > 0"));
        }
        if self.min_threads > self.max_threads {
            return Err(KernelError::config("min_threads must be <= max_threads"));
        }
        if self.queue_capacity == 0 {
            return Err(KernelError::config("queue_capacity must be > 0"));
        }
        if self.stack_size == 0 {
            return Err(KernelError::config("stack_size must be > 0"));
        }
        Ok(())
    }
}

/// Point-in-time pool counters, sampled under a single lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Workers currently executing a task.
    pub active_threads: usize,
    /// Tasks waiting in the queue.
    pub queue_size: usize,
    /// Live worker threads.
    pub total_threads: usize,
}

struct PoolState {
    jobs: VecDeque<Job>,
    stopping: bool,
    /// Desired worker count; workers above it retire at their next dequeue.
    target_threads: usize,
    live_threads: usize,
    active: usize,
}

struct PoolInner {
    state: Mutex<PoolState>,
    work_cv: Condvar,
    idle_cv: Condvar,
    queue_capacity: usize,
    stack_size: usize,
}

/// Bounded FIFO worker pool over OS threads.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
    config: Mutex<WorkerPoolConfig>,
}

impl WorkerPool {
    /// Construct a pool and spawn its workers.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] if the configuration fails
    /// [`WorkerPoolConfig::validate`].
    pub fn new(config: WorkerPoolConfig) -> Result<Self> {
        config.validate()?;
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState {
                jobs: VecDeque::new(),
                stopping: false,
                target_threads: config.max_threads,
                live_threads: 0,
                active: 0,
            }),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
            queue_capacity: config.queue_capacity,
            stack_size: config.stack_size,
        });
        let pool = Self {
            inner,
            handles: Mutex::new(Vec::new()),
            config: Mutex::new(config),
        };
        pool.spawn_workers(config.max_threads)?;
        debug!(workers = config.max_threads, queue = config.queue_capacity, "Worker pool started");
        Ok(pool)
    }

    fn spawn_workers(&self, count: usize) -> Result<()> {
        let mut handles = self.handles.lock().unwrap();
        for _ in 0..count {
            {
                let mut state = self.inner.state.lock().unwrap();
                state.live_threads += 1;
            }
            let inner = Arc::clone(&self.inner);
            let handle = thread::Builder::new()
                .name("mk-worker".to_string())
                .stack_size(self.inner.stack_size)
                .spawn(move || worker_loop(&inner))
                .map_err(KernelError::Io)?;
            handles.push(handle);
        }
        Ok(())
    }

    /// Enqueue a closure for execution.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::PoolStopped`] after `stop`, or
    /// [`KernelError::QueueFull`] when the queue is at capacity.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        if state.stopping {
            return Err(KernelError::PoolStopped);
        }
        if state.jobs.len() >= self.inner.queue_capacity {
            return Err(KernelError::QueueFull {
                capacity: self.inner.queue_capacity,
            });
        }
        state.jobs.push_back(Box::new(job));
        drop(state);
        self.inner.work_cv.notify_one();
        Ok(())
    }

    /// Block until the queue is empty and no worker is executing.
    pub fn wait_for_completion(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while !state.jobs.is_empty() || state.active > 0 {
            state = self.inner.idle_cv.wait(state).unwrap();
        }
    }

    /// Drain the queue and stop all workers. Idempotent.
    ///
    /// Returns once every worker has exited; further `submit` calls fail
    /// with [`KernelError::PoolStopped`] until `restart`.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.stopping {
                return;
            }
            state.stopping = true;
        }
        self.inner.work_cv.notify_all();
        let handles: Vec<_> = self.handles.lock().unwrap().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            // A worker can end up dropping its own pool (a queued closure
            // holding the last handle to the owning kernel); it cannot join
            // itself and is already past its final dequeue, so detach it.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Worker thread panicked during shutdown");
            }
        }
        debug!("Worker pool stopped");
    }

    /// Restart a stopped pool with its current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Internal`] if the pool was not stopped first.
    pub fn restart(&self) -> Result<()> {
        let target = {
            let mut state = self.inner.state.lock().unwrap();
            if !state.stopping {
                return Err(KernelError::internal("restart requires a stopped pool"));
            }
            state.stopping = false;
            state.target_threads = self.config.lock().unwrap().max_threads;
            state.target_threads
        };
        self.spawn_workers(target)?;
        debug!(workers = target, "Worker pool restarted");
        Ok(())
    }

    /// Sample the pool counters atomically.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.inner.state.lock().unwrap();
        PoolMetrics {
            active_threads: state.active,
            queue_size: state.jobs.len(),
            total_threads: state.live_threads,
        }
    }

    /// Log a metrics sample.
    pub fn update_metrics(&self) {
        let m = self.metrics();
        debug!(
            active = m.active_threads,
            queued = m.queue_size,
            total = m.total_threads,
            "Worker pool metrics"
        );
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().unwrap().jobs.len()
    }

    /// Returns true if no tasks are queued.
    #[must_use]
    pub fn is_queue_empty(&self) -> bool {
        self.queue_len() == 0
    }

    /// Workers currently executing a task.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().unwrap().active
    }

    /// Returns true after `stop` and before a successful `restart`.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().unwrap().stopping
    }

    /// Current configuration.
    #[must_use]
    pub fn configuration(&self) -> WorkerPoolConfig {
        *self.config.lock().unwrap()
    }

    /// Apply a new configuration, growing or shrinking the worker set.
    ///
    /// Extra workers retire at their next dequeue; missing workers are
    /// spawned immediately.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] if the new configuration is
    /// invalid; the previous configuration stays in effect.
    pub fn set_configuration(&self, config: WorkerPoolConfig) -> Result<()> {
        config.validate()?;
        let to_spawn = {
            let mut state = self.inner.state.lock().unwrap();
            state.target_threads = config.max_threads;
            if state.stopping {
                0
            } else {
                config.max_threads.saturating_sub(state.live_threads)
            }
        };
        *self.config.lock().unwrap() = config;
        if to_spawn > 0 {
            self.spawn_workers(to_spawn)?;
        }
        self.inner.work_cv.notify_all();
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(inner: &Arc<PoolInner>) {
    loop {
        let job = {
            let mut state = inner.state.lock().unwrap();
            loop {
                if state.live_threads > state.target_threads && state.jobs.is_empty() {
                    state.live_threads -= 1;
                    debug!("Worker retiring");
                    return;
                }
                if let Some(job) = state.jobs.pop_front() {
                    state.active += 1;
                    break job;
                }
                if state.stopping {
                    state.live_threads -= 1;
                    return;
                }
                state = inner.work_cv.wait(state).unwrap();
            }
        };

        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("Task panicked in worker");
        }

        let mut state = inner.state.lock().unwrap();
        state.active -= 1;
        if state.jobs.is_empty() && state.active == 0 {
            drop(state);
            inner.idle_cv.notify_all();
        }
    }
}
