//! Performance observations and the derived balancing view.
//!
//! Each kernel owns one [`PerformanceMetrics`] record, overwritten by
//! `update_metrics` and read via snapshot copy. [`ExtendedKernelMetrics`]
//! is derived from it at each update and projects into the
//! [`KernelMetrics`](crate::task::KernelMetrics) the load balancer scores.

use crate::kernel::KernelType;
use crate::task::KernelMetrics;
use std::time::Instant;

/// Raw per-kernel performance observation.
#[derive(Clone, Copy, Debug)]
pub struct PerformanceMetrics {
    /// CPU utilization in `[0, 1]`.
    pub cpu_usage: f64,
    /// Memory utilization in `[0, 1]`.
    pub memory_usage: f64,
    /// Power draw in watts.
    pub power_consumption: f64,
    /// Die temperature in Celsius.
    pub temperature: f64,
    /// Instruction throughput.
    pub instructions_per_second: u64,
    /// Aggregate efficiency in `[0, 1]`.
    pub efficiency_score: f64,
    /// When the observation was taken.
    pub timestamp: Instant,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            cpu_usage: 0.0,
            memory_usage: 0.0,
            power_consumption: 0.0,
            temperature: 0.0,
            instructions_per_second: 0,
            efficiency_score: 0.0,
            timestamp: Instant::now(),
        }
    }
}

/// Balancer-facing metrics derived from a performance observation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtendedKernelMetrics {
    /// Overall load in `[0, 1]`.
    pub load: f64,
    /// Average task latency in microseconds.
    pub latency: f64,
    /// Local cache hit rate in `[0, 1]`.
    pub cache_efficiency: f64,
    /// Inter-kernel transfer bandwidth in MB/s.
    pub tunnel_bandwidth: f64,
    /// Tasks queued or executing.
    pub active_tasks: usize,
    /// CPU utilization in `[0, 1]`.
    pub cpu_usage: f64,
    /// Memory utilization in `[0, 1]`.
    pub memory_usage: f64,
    /// Network bandwidth in MB/s.
    pub network_bandwidth: f64,
    /// Disk throughput in IOPS.
    pub disk_io: f64,
    /// Power draw in watts.
    pub energy_consumption: f64,
    /// Efficiency for CPU-bound tasks.
    pub cpu_task_efficiency: f64,
    /// Efficiency for IO-bound tasks.
    pub io_task_efficiency: f64,
    /// Efficiency for memory-bound tasks.
    pub memory_task_efficiency: f64,
    /// Efficiency for network-bound tasks.
    pub network_task_efficiency: f64,
}

impl ExtendedKernelMetrics {
    /// Derive the balancer view from a raw observation.
    ///
    /// The four workload efficiencies are the base `efficiency_score` biased
    /// by the kernel variant: computational kernels favor CPU work, micro
    /// kernels IO, architectural kernels memory, orchestration kernels
    /// network traffic.
    #[must_use]
    pub fn from_performance(
        perf: &PerformanceMetrics,
        kernel_type: KernelType,
        active_tasks: usize,
    ) -> Self {
        let base = perf.efficiency_score;
        let bias = |target: KernelType, factor: f64| {
            if kernel_type == target {
                (base * factor).min(1.0)
            } else {
                base
            }
        };
        Self {
            load: perf.cpu_usage,
            latency: 0.0,
            cache_efficiency: 0.0,
            tunnel_bandwidth: 0.0,
            active_tasks,
            cpu_usage: perf.cpu_usage,
            memory_usage: perf.memory_usage,
            network_bandwidth: 1000.0,
            disk_io: 1000.0,
            energy_consumption: perf.power_consumption,
            cpu_task_efficiency: bias(KernelType::Computational, 1.2),
            io_task_efficiency: bias(KernelType::Micro, 1.1),
            memory_task_efficiency: bias(KernelType::Architectural, 1.15),
            network_task_efficiency: bias(KernelType::Orchestration, 1.25),
        }
    }

    /// Project into the nine-field record the load balancer consumes.
    #[must_use]
    pub fn project(&self) -> KernelMetrics {
        KernelMetrics {
            cpu_usage: self.cpu_usage,
            memory_usage: self.memory_usage,
            network_bandwidth: self.network_bandwidth,
            disk_io: self.disk_io,
            energy_consumption: self.energy_consumption,
            cpu_task_efficiency: self.cpu_task_efficiency,
            io_task_efficiency: self.io_task_efficiency,
            memory_task_efficiency: self.memory_task_efficiency,
            network_task_efficiency: self.network_task_efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(score: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            cpu_usage: 0.5,
            memory_usage: 0.25,
            efficiency_score: score,
            ..Default::default()
        }
    }

    #[test]
    fn test_computational_bias() {
        let ext =
            ExtendedKernelMetrics::from_performance(&observation(0.5), KernelType::Computational, 0);
        assert!((ext.cpu_task_efficiency - 0.6).abs() < 1e-12);
        assert!((ext.io_task_efficiency - 0.5).abs() < 1e-12);
        assert!((ext.memory_task_efficiency - 0.5).abs() < 1e-12);
        assert!((ext.network_task_efficiency - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_orchestration_bias() {
        let ext =
            ExtendedKernelMetrics::from_performance(&observation(0.4), KernelType::Orchestration, 2);
        assert!((ext.network_task_efficiency - 0.5).abs() < 1e-12);
        assert_eq!(ext.active_tasks, 2);
    }

    #[test]
    fn test_bias_clamped_to_one() {
        let ext =
            ExtendedKernelMetrics::from_performance(&observation(0.95), KernelType::Computational, 0);
        assert!(ext.cpu_task_efficiency <= 1.0);
    }

    #[test]
    fn test_projection_carries_resource_fields() {
        let ext = ExtendedKernelMetrics::from_performance(&observation(0.8), KernelType::Micro, 1);
        let projected = ext.project();
        assert!((projected.cpu_usage - 0.5).abs() < 1e-12);
        assert!((projected.memory_usage - 0.25).abs() < 1e-12);
        assert!((projected.io_task_efficiency - ext.io_task_efficiency).abs() < 1e-12);
    }
}
