//! Task descriptors and balancing metrics.
//!
//! A task is an opaque byte payload with priority and type hints. The
//! [`TaskType`] drives workload-specific balancing; [`KernelMetrics`] is the
//! per-kernel view the load balancer scores against.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Priority at or above which a task is treated as high-priority.
pub const HIGH_PRIORITY_THRESHOLD: i32 = 7;

/// Workload class of a task, used for workload-specific balancing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Dominated by CPU work.
    CpuIntensive,
    /// Dominated by disk or pipe traffic.
    IoIntensive,
    /// Dominated by working-set size.
    MemoryIntensive,
    /// Dominated by network traffic.
    NetworkIntensive,
    /// No dominant resource.
    #[default]
    Mixed,
}

impl TaskType {
    /// Returns the type name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TaskType::CpuIntensive => "cpu_intensive",
            TaskType::IoIntensive => "io_intensive",
            TaskType::MemoryIntensive => "memory_intensive",
            TaskType::NetworkIntensive => "network_intensive",
            TaskType::Mixed => "mixed",
        }
    }

    /// Infer a type from the payload size when the caller does not specify one.
    ///
    /// Payloads over 1 MiB are memory-bound, payloads under 1 KiB are
    /// dominated by dispatch overhead and classed as IO, everything else
    /// defaults to CPU work.
    #[must_use]
    pub fn infer_from_len(len: usize) -> Self {
        if len > 1024 * 1024 {
            TaskType::MemoryIntensive
        } else if len < 1024 {
            TaskType::IoIntensive
        } else {
            TaskType::CpuIntensive
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An opaque task awaiting dispatch. Immutable after enqueue.
#[derive(Clone, Debug)]
pub struct TaskDescriptor {
    /// Opaque payload bytes.
    pub data: Vec<u8>,
    /// Priority in `[0, 10]`; `>= 7` is the high-priority class.
    pub priority: i32,
    /// Monotonic enqueue instant.
    pub enqueue_time: Instant,
    /// Workload class hint.
    pub task_type: TaskType,
    /// Estimated working-set size in bytes.
    pub est_memory_bytes: u64,
    /// Estimated CPU time in microseconds.
    pub est_cpu_time: u64,
}

impl TaskDescriptor {
    /// Create a descriptor with the type inferred from the payload size.
    #[must_use]
    pub fn new(data: Vec<u8>, priority: i32) -> Self {
        let task_type = TaskType::infer_from_len(data.len());
        Self::with_type(data, priority, task_type)
    }

    /// Create a descriptor with an explicit workload class.
    #[must_use]
    pub fn with_type(data: Vec<u8>, priority: i32, task_type: TaskType) -> Self {
        Self {
            data,
            priority: priority.clamp(0, 10),
            enqueue_time: Instant::now(),
            task_type,
            est_memory_bytes: 0,
            est_cpu_time: 0,
        }
    }

    /// Set the estimated working-set size.
    #[must_use]
    pub fn with_est_memory(mut self, bytes: u64) -> Self {
        self.est_memory_bytes = bytes;
        self
    }

    /// Set the estimated CPU time in microseconds.
    #[must_use]
    pub fn with_est_cpu_time(mut self, micros: u64) -> Self {
        self.est_cpu_time = micros;
        self
    }

    /// Returns true if this task is in the high-priority class.
    #[must_use]
    pub fn is_high_priority(&self) -> bool {
        self.priority >= HIGH_PRIORITY_THRESHOLD
    }
}

/// Per-kernel metrics projected for the load balancer.
///
/// Produced by each kernel from its own performance observations; never
/// shared mutably across kernels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelMetrics {
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
    /// Efficiency for CPU-bound tasks in `[0, 1]`.
    pub cpu_task_efficiency: f64,
    /// Efficiency for IO-bound tasks in `[0, 1]`.
    pub io_task_efficiency: f64,
    /// Efficiency for memory-bound tasks in `[0, 1]`.
    pub memory_task_efficiency: f64,
    /// Efficiency for network-bound tasks in `[0, 1]`.
    pub network_task_efficiency: f64,
}

impl KernelMetrics {
    /// Efficiency field matching a task type; `Mixed` averages the four.
    #[must_use]
    pub fn efficiency_for(&self, task_type: TaskType) -> f64 {
        match task_type {
            TaskType::CpuIntensive => self.cpu_task_efficiency,
            TaskType::IoIntensive => self.io_task_efficiency,
            TaskType::MemoryIntensive => self.memory_task_efficiency,
            TaskType::NetworkIntensive => self.network_task_efficiency,
            TaskType::Mixed => {
                (self.cpu_task_efficiency
                    + self.io_task_efficiency
                    + self.memory_task_efficiency
                    + self.network_task_efficiency)
                    / 4.0
            }
        }
    }
}
