//! Kernel owning a set of child kernels.
//!
//! The parent forwards balancing and orchestration to its children and
//! adapts its own worker pool and cache from their aggregated metrics.
//! Children notify the parent through the event callback they register;
//! the child graph stays acyclic.

use crate::balancer::LoadBalancer;
use crate::error::Result;
use crate::kernel::{
    Kernel, KernelConfig, KernelCore, KernelType, OrchestrationKernel, SharedKernel,
};
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::pool::Job;
use crate::task::TaskDescriptor;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Worker-pool growth cap applied by metric adaptation.
const MAX_ADAPTIVE_THREADS: usize = 32;
/// Worker-pool shrink floor applied by metric adaptation.
const MIN_ADAPTIVE_THREADS: usize = 2;

/// Kernel that owns children and forwards balancing/orchestration to them.
pub struct ParentKernel {
    core: KernelCore,
    children: RwLock<Vec<SharedKernel>>,
    balancer: RwLock<Arc<LoadBalancer>>,
    orchestration: OrchestrationKernel,
}

impl ParentKernel {
    /// Create a parent kernel with the variant defaults.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_config(id, KernelConfig::parent())
    }

    /// Create a parent kernel with explicit component sizing.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn with_config(id: impl Into<String>, config: KernelConfig) -> Result<Self> {
        Self::with_configs(id, config, KernelConfig::orchestration())
    }

    /// Create a parent kernel, also sizing the owned orchestration kernel.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn with_configs(
        id: impl Into<String>,
        config: KernelConfig,
        orchestration_config: KernelConfig,
    ) -> Result<Self> {
        let id = id.into();
        let orchestration =
            OrchestrationKernel::with_config(format!("{id}-orchestration"), orchestration_config)?;
        Ok(Self {
            core: KernelCore::new(id, KernelType::Parent, config)?,
            children: RwLock::new(Vec::new()),
            balancer: RwLock::new(Arc::new(LoadBalancer::new())),
            orchestration,
        })
    }

    /// Append a child. Shared ownership; the child outlives the parent only
    /// if another holder exists.
    pub fn add_child(&self, child: SharedKernel) {
        info!(parent = %self.core.id(), child = %child.id(), "Child added");
        self.children.write().unwrap().push(child);
    }

    /// Remove the child with `id`, if present.
    pub fn remove_child(&self, id: &str) {
        let mut children = self.children.write().unwrap();
        let before = children.len();
        children.retain(|c| c.id() != id);
        if children.len() < before {
            info!(parent = %self.core.id(), child = %id, "Child removed");
        }
    }

    /// Snapshot of the children in insertion order.
    #[must_use]
    pub fn children(&self) -> Vec<SharedKernel> {
        self.children.read().unwrap().clone()
    }

    /// Install the load balancer used by `balance_load`.
    pub fn set_load_balancer(&self, balancer: Arc<LoadBalancer>) {
        *self.balancer.write().unwrap() = balancer;
    }

    /// The installed load balancer.
    #[must_use]
    pub fn load_balancer(&self) -> Arc<LoadBalancer> {
        Arc::clone(&self.balancer.read().unwrap())
    }

    /// The owned orchestration kernel; enqueue tasks here for
    /// [`orchestrate_tasks`](Self::orchestrate_tasks).
    #[must_use]
    pub fn orchestration(&self) -> &OrchestrationKernel {
        &self.orchestration
    }

    /// Forward the children and their metrics to the installed balancer.
    pub fn balance_load(&self) {
        let children = self.children();
        let metrics: Vec<_> = children
            .iter()
            .map(|c| c.extended_metrics().project())
            .collect();
        self.load_balancer().balance(&children, &[], &metrics);
        debug!(parent = %self.core.id(), children = children.len(), "Load balanced");
    }

    /// Dispatch the orchestration kernel's pending tasks to the children.
    pub fn orchestrate_tasks(&self) {
        let children = self.children();
        self.orchestration.orchestrate(&children);
        debug!(parent = %self.core.id(), "Orchestration round complete");
    }

    /// Shared internals, exposed for composition and tests.
    #[must_use]
    pub fn core(&self) -> &KernelCore {
        &self.core
    }

    fn adapt_from_children(&self, avg_cpu: f64) {
        if let Some(pool) = self.core.pool() {
            let mut config = pool.configuration();
            if avg_cpu > 0.8 && config.max_threads < MAX_ADAPTIVE_THREADS {
                config.max_threads += 2;
                if pool.set_configuration(config).is_ok() {
                    info!(parent = %self.core.id(), max_threads = config.max_threads, avg_cpu, "Worker pool grown");
                }
            } else if avg_cpu < 0.3 && config.max_threads > MIN_ADAPTIVE_THREADS {
                config.max_threads -= 1;
                if pool.set_configuration(config).is_ok() {
                    info!(parent = %self.core.id(), max_threads = config.max_threads, avg_cpu, "Worker pool shrunk");
                }
            }
        }

        let cache = self.core.cache();
        let size = cache.len();
        let capacity = cache.capacity();
        if size > 0 {
            if size < 100 {
                cache.resize(capacity + capacity / 5);
                info!(parent = %self.core.id(), capacity = cache.capacity(), "Cache grown");
            } else if size > 1000 && capacity > 16 {
                cache.resize(capacity - capacity / 5);
                info!(parent = %self.core.id(), capacity = cache.capacity(), "Cache shrunk");
            }
        }
    }
}

impl Kernel for ParentKernel {
    fn initialize(&self) -> bool {
        if !self.core.initialize() {
            return false;
        }
        if !self.orchestration.initialize() {
            warn!(parent = %self.core.id(), "Orchestration kernel failed to initialize");
            self.core.shutdown();
            return false;
        }
        for child in self.children() {
            if !child.initialize() {
                warn!(parent = %self.core.id(), child = %child.id(), "Child failed to initialize");
                return false;
            }
        }
        true
    }

    /// Tears down children in insertion order, then the owned components.
    fn shutdown(&self) {
        let children: Vec<SharedKernel> = {
            let mut guard = self.children.write().unwrap();
            guard.drain(..).collect()
        };
        for child in children {
            child.shutdown();
        }
        self.orchestration.shutdown();
        self.core.shutdown();
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn metrics(&self) -> PerformanceMetrics {
        self.core.performance()
    }

    /// Aggregates the children's metrics and adapts the parent's pool and
    /// cache sizing from them.
    fn update_metrics(&self) {
        let children = self.children();
        let mut total_cpu = 0.0;
        let mut total_efficiency = 0.0;
        for child in &children {
            child.update_metrics();
            let m = child.metrics();
            total_cpu += m.cpu_usage;
            total_efficiency += m.efficiency_score;
        }
        let count = children.len();
        let (avg_cpu, avg_efficiency) = if count > 0 {
            (total_cpu / count as f64, total_efficiency / count as f64)
        } else {
            (0.0, 0.0)
        };

        self.adapt_from_children(avg_cpu);
        self.core.update_metrics(avg_efficiency);

        let aggregate = serde_json::json!({
            "children": count,
            "avg_cpu": avg_cpu,
            "avg_efficiency": avg_efficiency,
        });
        self.core
            .cache()
            .put("metrics".to_string(), aggregate.to_string().into_bytes());
    }

    fn extended_metrics(&self) -> ExtendedKernelMetrics {
        self.core.extended()
    }

    fn set_resource_limit(&self, resource: &str, limit: f64) {
        self.core.set_resource_limit(resource, limit);
    }

    fn resource_usage(&self, resource: &str) -> f64 {
        self.core.resource_usage(resource)
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::Parent
    }

    fn id(&self) -> String {
        self.core.id().to_string()
    }

    fn pause(&self) {
        self.core.pause();
    }

    fn resume(&self) {
        self.core.resume();
    }

    fn reset(&self) {
        self.shutdown();
        self.orchestration.reset();
        self.core.reset();
    }

    fn supported_features(&self) -> Vec<String> {
        vec![
            "dynamic_thread_pool".to_string(),
            "dynamic_cache".to_string(),
            "task_orchestration".to_string(),
            "load_balancing".to_string(),
        ]
    }

    fn schedule_task(&self, task: Job, priority: i32) -> bool {
        self.core.schedule(task, priority)
    }

    fn process_task(&self, task: &TaskDescriptor) -> bool {
        let efficiency = self.core.performance().efficiency_score;
        self.core.process_task_default(task, efficiency)
    }
}
