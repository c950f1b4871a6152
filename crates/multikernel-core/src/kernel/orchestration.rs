//! Task intake and dispatch kernel.
//!
//! Accepts opaque task bytes with a priority, keeps them in a pending
//! queue, and periodically hands the queue to the load balancer over a set
//! of target kernels, checkpointing after each round.

use crate::balancer::LoadBalancer;
use crate::error::Result;
use crate::kernel::{Kernel, KernelConfig, KernelCore, KernelType, SharedKernel};
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::pool::Job;
use crate::task::{TaskDescriptor, TaskType};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Base efficiency reported by an orchestration kernel.
const ORCHESTRATION_EFFICIENCY: f64 = 0.75;

/// Kernel owning a pending task queue and a load balancer.
pub struct OrchestrationKernel {
    core: KernelCore,
    balancer: Arc<LoadBalancer>,
    pending: Mutex<VecDeque<TaskDescriptor>>,
    task_index: AtomicU64,
}

impl OrchestrationKernel {
    /// Create an orchestration kernel with the variant defaults.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_config(id, KernelConfig::orchestration())
    }

    /// Create an orchestration kernel with explicit component sizing.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn with_config(id: impl Into<String>, config: KernelConfig) -> Result<Self> {
        let balancer = Arc::new(LoadBalancer::new());
        balancer.set_strategy_name("hybrid_adaptive");
        balancer.set_resource_weights(0.3, 0.25, 0.25, 0.2);
        balancer.set_adaptive_thresholds(0.8, 0.7);
        Ok(Self {
            core: KernelCore::new(id, KernelType::Orchestration, config)?,
            balancer,
            pending: Mutex::new(VecDeque::new()),
            task_index: AtomicU64::new(0),
        })
    }

    /// Append a task, inferring its type from the payload size.
    pub fn enqueue_task(&self, data: Vec<u8>, priority: i32) {
        self.enqueue(TaskDescriptor::new(data, priority));
    }

    /// Append a task with an explicit workload class.
    pub fn enqueue_task_with_type(&self, data: Vec<u8>, priority: i32, task_type: TaskType) {
        self.enqueue(TaskDescriptor::with_type(data, priority, task_type));
    }

    fn enqueue(&self, task: TaskDescriptor) {
        let index = self.task_index.fetch_add(1, Ordering::Relaxed);
        self.core
            .cache()
            .put(format!("task_{index}"), task.data.clone());
        debug!(
            kernel = %self.core.id(),
            priority = task.priority,
            kind = %task.task_type,
            bytes = task.data.len(),
            "Task enqueued"
        );
        self.pending.lock().unwrap().push_back(task);
    }

    /// Tasks waiting for dispatch.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// The owned load balancer.
    #[must_use]
    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    /// Dispatch the pending queue across `kernels` and checkpoint.
    ///
    /// Collects each target's balancer metrics, invokes the load balancer
    /// once over the drained queue, then creates a recovery point. A round
    /// with no targets or no pending tasks is a logged no-op.
    pub fn orchestrate(&self, kernels: &[SharedKernel]) {
        if !self.core.is_running() {
            return;
        }
        let tasks: Vec<TaskDescriptor> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain(..).collect()
        };
        if kernels.is_empty() || tasks.is_empty() {
            debug!(kernel = %self.core.id(), "Nothing to orchestrate");
            // Undispatched tasks go back to the queue.
            self.pending.lock().unwrap().extend(tasks);
            return;
        }
        info!(
            kernel = %self.core.id(),
            targets = kernels.len(),
            tasks = tasks.len(),
            "Orchestrating"
        );

        let metrics: Vec<_> = kernels
            .iter()
            .map(|k| {
                k.update_metrics();
                k.extended_metrics().project()
            })
            .collect();
        self.balancer.balance(kernels, &tasks, &metrics);

        self.core.checkpoint();
        self.core.update_metrics(ORCHESTRATION_EFFICIENCY);
    }

    /// Shared internals, exposed for composition and tests.
    #[must_use]
    pub fn core(&self) -> &KernelCore {
        &self.core
    }
}

impl Kernel for OrchestrationKernel {
    fn initialize(&self) -> bool {
        self.core.initialize()
    }

    fn shutdown(&self) {
        self.pending.lock().unwrap().clear();
        self.core.shutdown();
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn metrics(&self) -> PerformanceMetrics {
        self.core.performance()
    }

    fn update_metrics(&self) {
        self.core.update_metrics(ORCHESTRATION_EFFICIENCY);
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
        KernelType::Orchestration
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
        self.pending.lock().unwrap().clear();
        self.task_index.store(0, Ordering::Relaxed);
        self.core.reset();
    }

    fn supported_features(&self) -> Vec<String> {
        vec![
            "task_orchestration".to_string(),
            "load_balancing".to_string(),
            "recovery_management".to_string(),
            "dynamic_thread_pool".to_string(),
            "cache_optimization".to_string(),
        ]
    }

    fn schedule_task(&self, task: Job, priority: i32) -> bool {
        self.core.schedule(task, priority)
    }

    fn process_task(&self, task: &TaskDescriptor) -> bool {
        self.core.process_task_default(task, ORCHESTRATION_EFFICIENCY)
    }
}
