//! Minimal kernel: memoize the payload and checkpoint.

use crate::error::Result;
use crate::kernel::{Kernel, KernelConfig, KernelCore, KernelType};
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::pool::Job;
use crate::task::TaskDescriptor;
use tracing::debug;

/// Base efficiency reported by a micro kernel.
const MICRO_EFFICIENCY: f64 = 0.7;

/// The smallest kernel variant: every executed task is memoized in the
/// local cache and followed by a recovery point.
pub struct MicroKernel {
    core: KernelCore,
}

impl MicroKernel {
    /// Create a micro kernel with the variant defaults.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_config(id, KernelConfig::micro())
    }

    /// Create a micro kernel with explicit component sizing.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn with_config(id: impl Into<String>, config: KernelConfig) -> Result<Self> {
        Ok(Self {
            core: KernelCore::new(id, KernelType::Micro, config)?,
        })
    }

    /// Memoize `data` and create a recovery point.
    pub fn execute_task(&self, data: &[u8]) -> bool {
        if !self.core.is_running() {
            return false;
        }
        debug!(kernel = %self.core.id(), bytes = data.len(), "Executing task");
        self.core.cache().put("task".to_string(), data.to_vec());
        self.core.checkpoint();
        true
    }

    /// Shared internals, exposed for composition and tests.
    #[must_use]
    pub fn core(&self) -> &KernelCore {
        &self.core
    }
}

impl Kernel for MicroKernel {
    fn initialize(&self) -> bool {
        self.core.initialize()
    }

    fn shutdown(&self) {
        self.core.shutdown();
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn metrics(&self) -> PerformanceMetrics {
        self.core.performance()
    }

    fn update_metrics(&self) {
        self.core.update_metrics(MICRO_EFFICIENCY);
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
        KernelType::Micro
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
        self.core.reset();
    }

    fn supported_features(&self) -> Vec<String> {
        vec![
            "task_memoization".to_string(),
            "recovery_management".to_string(),
            "dynamic_thread_pool".to_string(),
        ]
    }

    fn schedule_task(&self, task: Job, priority: i32) -> bool {
        self.core.schedule(task, priority)
    }

    fn process_task(&self, task: &TaskDescriptor) -> bool {
        self.core.process_task_default(task, MICRO_EFFICIENCY)
    }
}
