//! Compute kernel: content-keyed memoization over a byte transform.

use crate::accel::SharedAccelerator;
use crate::error::Result;
use crate::kernel::{Kernel, KernelConfig, KernelCore, KernelType};
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::pool::Job;
use crate::recovery::checksum_hex;
use crate::task::TaskDescriptor;
use tracing::{debug, trace};

/// Kernel executing a deterministic byte transform, memoizing results under
/// a content-derived key and checkpointing after each computation.
pub struct ComputationalKernel {
    core: KernelCore,
    accelerator: Option<SharedAccelerator>,
}

impl ComputationalKernel {
    /// Create a computational kernel with the variant defaults.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_config(id, KernelConfig::computational())
    }

    /// Create a computational kernel with explicit component sizing.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn with_config(id: impl Into<String>, config: KernelConfig) -> Result<Self> {
        Ok(Self {
            core: KernelCore::new(id, KernelType::Computational, config)?,
            accelerator: None,
        })
    }

    /// Attach an acceleration capability; computations prefer it when
    /// available.
    pub fn set_accelerator(&mut self, accelerator: SharedAccelerator) {
        self.accelerator = Some(accelerator);
    }

    /// Transform `data`, consulting the result cache first.
    ///
    /// On a miss the transform runs on the accelerator when present and
    /// available, otherwise in software; the result is cached and a
    /// recovery point created.
    pub fn compute(&self, data: &[u8]) -> bool {
        if !self.core.is_running() {
            return false;
        }
        let key = format!("compute_{}", &checksum_hex(data)[..16]);
        if self.core.cache().get(&key).is_some() {
            trace!(kernel = %self.core.id(), %key, "Result served from cache");
            return true;
        }

        let result = self
            .accelerator
            .as_ref()
            .filter(|a| a.is_available())
            .and_then(|a| a.transform(data))
            .unwrap_or_else(|| software_transform(data));

        self.core.cache().put(key, result);
        self.core.checkpoint();
        debug!(kernel = %self.core.id(), bytes = data.len(), "Computation complete");
        true
    }

    fn efficiency(&self) -> f64 {
        match &self.accelerator {
            Some(accel) if accel.is_available() => 0.9,
            Some(_) => 0.7,
            None => 0.6,
        }
    }

    /// Shared internals, exposed for composition and tests.
    #[must_use]
    pub fn core(&self) -> &KernelCore {
        &self.core
    }
}

/// The software computation applied when no accelerator takes the job.
pub(crate) fn software_transform(data: &[u8]) -> Vec<u8> {
    data.iter()
        .map(|&b| {
            let b = (b as u16 * 5 + 11) % 256;
            let b = (b as u8) ^ 0x3C;
            ((b as u16 + 23) % 256) as u8
        })
        .collect()
}

impl Kernel for ComputationalKernel {
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
        self.core.update_metrics(self.efficiency());
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
        KernelType::Computational
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
        let mut features = vec![
            "cache_optimization".to_string(),
            "recovery_management".to_string(),
            "dynamic_thread_pool".to_string(),
        ];
        if let Some(accel) = &self.accelerator {
            features.push("hardware_acceleration".to_string());
            if accel.is_available() {
                features.push("accelerated_transform".to_string());
            }
        }
        features
    }

    fn schedule_task(&self, task: Job, priority: i32) -> bool {
        self.core.schedule(task, priority)
    }

    fn process_task(&self, task: &TaskDescriptor) -> bool {
        self.core.process_task_default(task, self.efficiency())
    }
}
