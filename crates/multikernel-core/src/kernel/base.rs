//! Shared kernel internals.
//!
//! [`KernelCore`] carries everything the variants have in common: the
//! lifecycle state machine, performance and extended metrics, resource
//! limits, and the owned cache / worker pool / recovery manager. Variants
//! embed a core and delegate the [`Kernel`](super::Kernel) contract to it,
//! layering their own task semantics on top.

use crate::cache::DynamicCache;
use crate::kernel::{KernelConfig, KernelState, KernelType, ResourceKind};
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::observability::KernelCounters;
use crate::pool::{Job, WorkerPool};
use crate::recovery::RecoveryManager;
use crate::task::TaskDescriptor;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{OnceLock, RwLock};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Handler invoked for every processed task.
pub type TaskCallback = Box<dyn Fn(&TaskDescriptor) + Send + Sync>;
/// Handler receiving `(event, detail)` notifications; parents register one
/// instead of holding a back reference into the child.
pub type EventCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Baseline power draw reported when no platform probe is wired in.
const BASELINE_POWER_WATTS: f64 = 50.0;

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Milliseconds of `t` relative to the process epoch; monotonic across
/// tasks created after startup.
pub(crate) fn instant_millis(t: Instant) -> u128 {
    t.checked_duration_since(process_epoch())
        .map_or(0, |d| d.as_millis())
}

/// Lifecycle, metrics, limits and owned components shared by all variants.
pub struct KernelCore {
    id: String,
    kernel_type: KernelType,
    state: RwLock<KernelState>,
    perf: RwLock<PerformanceMetrics>,
    extended: RwLock<ExtendedKernelMetrics>,
    limits: RwLock<HashMap<ResourceKind, f64>>,
    cache: DynamicCache<String, Vec<u8>>,
    pool: Option<WorkerPool>,
    recovery: RwLock<Option<RecoveryManager>>,
    recovery_config: Option<crate::recovery::RecoveryConfig>,
    task_callback: RwLock<Option<TaskCallback>>,
    event_callback: RwLock<Option<EventCallback>>,
    counters: KernelCounters,
}

impl KernelCore {
    /// Build the shared components from a variant's configuration.
    ///
    /// # Errors
    ///
    /// Returns the pool's [`KernelError`](crate::error::KernelError) when
    /// its configuration is invalid.
    pub fn new(
        id: impl Into<String>,
        kernel_type: KernelType,
        config: KernelConfig,
    ) -> crate::error::Result<Self> {
        let id = id.into();
        let cache = DynamicCache::new(config.cache.initial_capacity, config.cache.default_ttl_seconds);
        cache.set_cleanup_interval(config.cache.cleanup_interval_seconds);
        if config.cache.auto_resize {
            cache.set_auto_resize(true, config.cache.min_capacity, config.cache.max_capacity);
        }
        let pool = config.pool.map(WorkerPool::new).transpose()?;
        let recovery = config.recovery.clone().map(RecoveryManager::new);
        Ok(Self {
            id,
            kernel_type,
            state: RwLock::new(KernelState::Created),
            perf: RwLock::new(PerformanceMetrics::default()),
            extended: RwLock::new(ExtendedKernelMetrics::default()),
            limits: RwLock::new(HashMap::new()),
            cache,
            pool,
            recovery: RwLock::new(recovery),
            recovery_config: config.recovery,
            task_callback: RwLock::new(None),
            event_callback: RwLock::new(None),
            counters: KernelCounters::default(),
        })
    }

    /// Kernel id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Variant tag.
    #[must_use]
    pub fn kernel_type(&self) -> KernelType {
        self.kernel_type
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> KernelState {
        *self.state.read().unwrap()
    }

    /// Local cache handle.
    #[must_use]
    pub fn cache(&self) -> &DynamicCache<String, Vec<u8>> {
        &self.cache
    }

    /// Local worker pool, when the variant has one.
    #[must_use]
    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    /// Execution counters.
    #[must_use]
    pub fn counters(&self) -> &KernelCounters {
        &self.counters
    }

    /// Run `f` against the recovery manager, if one is owned and live.
    pub fn with_recovery<R>(&self, f: impl FnOnce(&RecoveryManager) -> R) -> Option<R> {
        self.recovery.read().unwrap().as_ref().map(f)
    }

    /// Create a recovery point, if a recovery manager is owned.
    /// Returns `None` without one, `Some(id)` otherwise (empty id = failure).
    pub fn checkpoint(&self) -> Option<String> {
        self.with_recovery(|rm| rm.create_recovery_point())
    }

    /// Start the owned components and enter `Running`.
    ///
    /// Valid from `Created`; re-initializing a running kernel warns and
    /// returns true, initializing a shut-down kernel (without `reset`)
    /// returns false.
    pub fn initialize(&self) -> bool {
        match self.state() {
            KernelState::Running | KernelState::Paused => {
                warn!(kernel = %self.id, "Kernel already initialized");
                return true;
            }
            KernelState::ShutDown => {
                warn!(kernel = %self.id, "initialize called on a shut-down kernel; reset first");
                return false;
            }
            KernelState::Created | KernelState::Initialized => {}
        }
        *self.state.write().unwrap() = KernelState::Initialized;

        if let Some(pool) = &self.pool {
            if pool.is_stopped() {
                if let Err(err) = pool.restart() {
                    warn!(kernel = %self.id, %err, "Failed to restart worker pool");
                    *self.state.write().unwrap() = KernelState::Created;
                    return false;
                }
            }
        }

        // A previously shut-down recovery manager is terminal; rebuild it
        // from the retained configuration.
        let recovery_ok = {
            let mut recovery = self.recovery.write().unwrap();
            if let Some(config) = &self.recovery_config {
                let needs_rebuild = recovery
                    .as_ref()
                    .map(|rm| rm.state() == crate::recovery::RecoveryState::ShutDown)
                    .unwrap_or(true);
                if needs_rebuild {
                    *recovery = Some(RecoveryManager::new(config.clone()));
                }
                recovery.as_ref().map_or(true, |rm| rm.initialize())
            } else {
                true
            }
        };
        if !recovery_ok {
            warn!(kernel = %self.id, "Recovery manager failed to initialize");
            *self.state.write().unwrap() = KernelState::Created;
            return false;
        }

        *self.state.write().unwrap() = KernelState::Running;
        debug!(kernel = %self.id, kind = %self.kernel_type, "Kernel initialized");
        true
    }

    /// Stop components and enter `ShutDown`. Idempotent.
    pub fn shutdown(&self) {
        {
            let state = self.state.read().unwrap();
            if *state == KernelState::ShutDown || *state == KernelState::Created {
                return;
            }
        }
        if let Some(pool) = &self.pool {
            pool.stop();
        }
        self.cache.clear();
        if let Some(rm) = self.recovery.read().unwrap().as_ref() {
            rm.shutdown();
        }
        *self.state.write().unwrap() = KernelState::ShutDown;
        debug!(kernel = %self.id, "Kernel shut down");
    }

    /// Returns true while the kernel is `Running`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == KernelState::Running
    }

    /// Enter `Paused` from `Running`.
    pub fn pause(&self) {
        let mut state = self.state.write().unwrap();
        if *state == KernelState::Running {
            *state = KernelState::Paused;
            trace!(kernel = %self.id, "Kernel paused");
        }
    }

    /// Leave `Paused`.
    pub fn resume(&self) {
        let mut state = self.state.write().unwrap();
        if *state == KernelState::Paused {
            *state = KernelState::Running;
            trace!(kernel = %self.id, "Kernel resumed");
        }
    }

    /// Shutdown, then return to `Created` so `initialize` works again.
    pub fn reset(&self) {
        self.shutdown();
        *self.state.write().unwrap() = KernelState::Created;
        debug!(kernel = %self.id, "Kernel reset");
    }

    /// Latest performance snapshot.
    #[must_use]
    pub fn performance(&self) -> PerformanceMetrics {
        *self.perf.read().unwrap()
    }

    /// Latest balancer-facing snapshot.
    #[must_use]
    pub fn extended(&self) -> ExtendedKernelMetrics {
        *self.extended.read().unwrap()
    }

    /// Recompute performance and extended metrics. The variant supplies its
    /// current efficiency score.
    pub fn update_metrics(&self, efficiency_score: f64) {
        let (cpu, queued) = match &self.pool {
            Some(pool) => {
                let m = pool.metrics();
                let cpu = if m.total_threads == 0 {
                    0.0
                } else {
                    m.active_threads as f64 / m.total_threads as f64
                };
                (cpu, m.queue_size)
            }
            None => (0.0, 0),
        };
        let memory = (self.cache.len() as f64 / 1000.0).min(1.0);

        let perf = PerformanceMetrics {
            cpu_usage: cpu,
            memory_usage: memory,
            power_consumption: BASELINE_POWER_WATTS,
            temperature: 0.0,
            instructions_per_second: (efficiency_score * 1_000_000_000.0) as u64,
            efficiency_score,
            timestamp: Instant::now(),
        };
        *self.perf.write().unwrap() = perf;

        let mut extended =
            ExtendedKernelMetrics::from_performance(&perf, self.kernel_type, queued);
        extended.latency = self.counters.avg_latency_us();
        extended.cache_efficiency = self.cache.stats().hit_rate();
        *self.extended.write().unwrap() = extended;
        trace!(kernel = %self.id, "Metrics updated");
    }

    /// Apply a named resource limit. Unknown names warn and no-op.
    pub fn set_resource_limit(&self, resource: &str, limit: f64) {
        let kind = match resource.parse::<ResourceKind>() {
            Ok(kind) => kind,
            Err(_) => {
                warn!(kernel = %self.id, resource, "Unknown resource");
                return;
            }
        };
        match kind {
            ResourceKind::Threads => {
                if let Some(pool) = &self.pool {
                    let mut config = pool.configuration();
                    config.max_threads = (limit as usize).max(1);
                    config.min_threads = config.min_threads.min(config.max_threads);
                    if let Err(err) = pool.set_configuration(config) {
                        warn!(kernel = %self.id, %err, "Failed to apply thread limit");
                        return;
                    }
                    debug!(kernel = %self.id, limit, "Thread limit applied");
                }
            }
            ResourceKind::Cache => {
                self.cache.resize(limit as usize);
                debug!(kernel = %self.id, limit, "Cache limit applied");
            }
            ResourceKind::Cpu | ResourceKind::Memory => {
                self.limits.write().unwrap().insert(kind, limit);
            }
        }
    }

    /// Configured limit for a named resource, when one is in effect.
    #[must_use]
    pub fn resource_limit(&self, resource: &str) -> Option<f64> {
        let kind = resource.parse::<ResourceKind>().ok()?;
        match kind {
            ResourceKind::Threads => self
                .pool
                .as_ref()
                .map(|p| p.configuration().max_threads as f64),
            ResourceKind::Cache => Some(self.cache.capacity() as f64),
            ResourceKind::Cpu | ResourceKind::Memory => {
                self.limits.read().unwrap().get(&kind).copied()
            }
        }
    }

    /// Current usage of a named resource. Unknown names warn and return 0.
    #[must_use]
    pub fn resource_usage(&self, resource: &str) -> f64 {
        let kind = match resource.parse::<ResourceKind>() {
            Ok(kind) => kind,
            Err(_) => {
                warn!(kernel = %self.id, resource, "Unknown resource");
                return 0.0;
            }
        };
        match kind {
            ResourceKind::Threads => self
                .pool
                .as_ref()
                .map_or(0.0, |p| p.metrics().active_threads as f64),
            ResourceKind::Cache => self.cache.len() as f64,
            ResourceKind::Cpu => self.perf.read().unwrap().cpu_usage,
            ResourceKind::Memory => self.perf.read().unwrap().memory_usage,
        }
    }

    /// Install the per-task callback.
    pub fn set_task_callback<F>(&self, callback: F)
    where
        F: Fn(&TaskDescriptor) + Send + Sync + 'static,
    {
        *self.task_callback.write().unwrap() = Some(Box::new(callback));
    }

    /// Install the event callback.
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        *self.event_callback.write().unwrap() = Some(Box::new(callback));
    }

    /// Emit an event to the registered handler, isolating panics.
    pub fn notify_event(&self, event: &str, detail: &str) {
        if let Some(callback) = self.event_callback.read().unwrap().as_ref() {
            if catch_unwind(AssertUnwindSafe(|| callback(event, detail))).is_err() {
                warn!(kernel = %self.id, event, "Event callback panicked");
            }
        }
    }

    /// Default task processing: memoize the payload, run the task callback,
    /// refresh metrics and emit `task_processed`.
    pub fn process_task_default(&self, task: &TaskDescriptor, efficiency_score: f64) -> bool {
        if !self.is_running() {
            warn!(kernel = %self.id, "Task processed on a stopped kernel");
            return false;
        }
        let started = Instant::now();
        if let Some(callback) = self.task_callback.read().unwrap().as_ref() {
            if catch_unwind(AssertUnwindSafe(|| callback(task))).is_err() {
                warn!(kernel = %self.id, "Task callback panicked");
            }
        }
        let key = format!(
            "task_{}_{}",
            task.priority,
            instant_millis(task.enqueue_time)
        );
        self.cache.put(key, task.data.clone());
        self.update_metrics(efficiency_score);
        self.counters.record_execution(started.elapsed(), true);
        self.notify_event("task_processed", &self.id);
        trace!(
            kernel = %self.id,
            kind = %task.task_type,
            priority = task.priority,
            "Task processed"
        );
        true
    }

    /// Pull every stored entry from a preload manager into the local cache.
    /// Returns the number of entries loaded and emits `warmup_completed`.
    pub fn warmup_from_preload(&self, preload: &crate::cache::preload::PreloadManager) -> usize {
        let keys = preload.all_keys();
        let mut loaded = 0;
        for key in keys {
            if let Some(data) = preload.data_for_key(&key) {
                self.cache.put(key, data);
                loaded += 1;
            }
        }
        debug!(kernel = %self.id, loaded, "Cache warm-up complete");
        self.notify_event("warmup_completed", &loaded.to_string());
        loaded
    }

    /// Forward a closure to the worker pool, or run it inline for variants
    /// without one. Returns false when the submission is rejected.
    pub fn schedule(&self, job: Job, priority: i32) -> bool {
        if !self.is_running() {
            warn!(kernel = %self.id, "Task scheduled on a stopped kernel");
            return false;
        }
        match &self.pool {
            Some(pool) => match pool.submit(job) {
                Ok(()) => {
                    trace!(kernel = %self.id, priority, "Task scheduled");
                    true
                }
                Err(err) => {
                    warn!(kernel = %self.id, %err, "Task submission rejected");
                    false
                }
            },
            None => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!(kernel = %self.id, "Inline task panicked");
                }
                true
            }
        }
    }
}
