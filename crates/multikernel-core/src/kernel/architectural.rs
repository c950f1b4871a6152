//! Cache topology and placement optimizer kernel.
//!
//! Runs no worker pool of its own; scheduled closures execute inline on
//! the caller's thread.

use crate::accel::SharedAccelerator;
use crate::cache::profile::PlatformProfile;
use crate::error::Result;
use crate::kernel::{Kernel, KernelConfig, KernelCore, KernelType};
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::pool::Job;
use crate::task::TaskDescriptor;
use tracing::{debug, info};

/// Kernel recomputing cache sizing from the platform profile and current
/// utilization.
pub struct ArchitecturalKernel {
    core: KernelCore,
    profile: PlatformProfile,
    accelerator: Option<SharedAccelerator>,
}

impl ArchitecturalKernel {
    /// Create an architectural kernel with the variant defaults and the
    /// detected platform profile.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_profile(id, KernelConfig::architectural(), PlatformProfile::detect())
    }

    /// Create an architectural kernel with explicit sizing and profile.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn with_profile(
        id: impl Into<String>,
        config: KernelConfig,
        profile: PlatformProfile,
    ) -> Result<Self> {
        let mut config = config;
        config.pool = None;
        Ok(Self {
            core: KernelCore::new(id, KernelType::Architectural, config)?,
            profile,
            accelerator: None,
        })
    }

    /// Attach an acceleration capability.
    pub fn set_accelerator(&mut self, accelerator: SharedAccelerator) {
        self.accelerator = Some(accelerator);
    }

    /// Resize the local cache to the platform profile's optimum and record
    /// the topology snapshot.
    pub fn optimize_topology(&self) {
        if !self.core.is_running() {
            return;
        }
        let optimal = self.profile.optimal_cache_capacity();
        self.core.cache().resize(optimal);

        let mut topology = self.profile.describe().into_bytes();
        if let Some(accel) = &self.accelerator {
            topology.push(u8::from(accel.is_available()));
            topology.extend(accel.platform_info().into_bytes());
        }
        self.core.cache().put("topology_info".to_string(), topology);
        info!(kernel = %self.core.id(), capacity = optimal, "Topology optimized");
    }

    /// Rebalance cache sizing by utilization: shrink to 70 % when under
    /// 30 % full, grow to 150 % when over 90 % full.
    pub fn optimize_placement(&self) {
        if !self.core.is_running() {
            return;
        }
        let size = self.core.cache().len();
        let capacity = self.core.cache().capacity();
        if capacity > 0 {
            if size * 10 < capacity * 3 {
                let target = (capacity * 7 / 10).max(1);
                self.core.cache().resize(target);
                debug!(kernel = %self.core.id(), capacity = target, "Cache shrunk");
            } else if size * 10 > capacity * 9 {
                let target = capacity * 3 / 2;
                self.core.cache().resize(target);
                debug!(kernel = %self.core.id(), capacity = target, "Cache grown");
            }
        }

        let placement = vec![
            u8::from(self.accelerator.as_ref().is_some_and(|a| a.is_available())),
            0x01, // cpu placement rank
            0x02, // memory placement rank
            0x03, // cache placement rank
        ];
        self.core.cache().put("placement_info".to_string(), placement);
    }

    fn efficiency(&self) -> f64 {
        match &self.accelerator {
            Some(accel) if accel.is_available() => 0.85,
            Some(_) => 0.6,
            None => 0.5,
        }
    }

    /// Shared internals, exposed for composition and tests.
    #[must_use]
    pub fn core(&self) -> &KernelCore {
        &self.core
    }
}

impl Kernel for ArchitecturalKernel {
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
        KernelType::Architectural
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
            "topology_optimization".to_string(),
            "placement_optimization".to_string(),
            "cache_optimization".to_string(),
            "platform_analysis".to_string(),
        ];
        if self.accelerator.as_ref().is_some_and(|a| a.is_available()) {
            features.push("hardware_acceleration".to_string());
        }
        features
    }

    // No worker pool; scheduled closures run inline.
    fn schedule_task(&self, task: Job, priority: i32) -> bool {
        self.core.schedule(task, priority)
    }

    fn process_task(&self, task: &TaskDescriptor) -> bool {
        self.core.process_task_default(task, self.efficiency())
    }
}
