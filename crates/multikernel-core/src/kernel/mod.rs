//! Kernel contract and variants.
//!
//! A kernel is a named in-process execution unit with a lifecycle, a local
//! worker pool, a local cache and variant-specific task semantics. The
//! closed set of variants implements the shared [`Kernel`] contract and is
//! dispatched through `Arc<dyn Kernel>`; the load balancer treats all
//! kernels uniformly and never needs the concrete type.

mod architectural;
mod base;
mod computational;
mod crypto;
mod micro;
mod orchestration;
mod parent;

pub use architectural::ArchitecturalKernel;
pub use base::{EventCallback, KernelCore, TaskCallback};
pub use computational::ComputationalKernel;
pub use crypto::CryptoMicroKernel;
pub use micro::MicroKernel;
pub use orchestration::OrchestrationKernel;
pub use parent::ParentKernel;

use crate::config::CacheSettings;
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::pool::{Job, WorkerPoolConfig};
use crate::recovery::{RecoveryConfig, RecoveryPointConfig};
use crate::task::TaskDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Kernel variant tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelType {
    /// Minimal memoizing kernel.
    Micro,
    /// Byte-transform compute kernel.
    Computational,
    /// Cache topology/placement optimizer.
    Architectural,
    /// Byte-scrambling kernel.
    CryptoMicro,
    /// Kernel owning a set of children.
    Parent,
    /// Task intake and dispatch kernel.
    Orchestration,
}

impl KernelType {
    /// Returns the variant name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            KernelType::Micro => "micro",
            KernelType::Computational => "computational",
            KernelType::Architectural => "architectural",
            KernelType::CryptoMicro => "crypto_micro",
            KernelType::Parent => "parent",
            KernelType::Orchestration => "orchestration",
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kernel lifecycle states.
///
/// `Created -> Initialized -> (Running <-> Paused) -> ShutDown`; `shutdown`
/// is idempotent from any post-Created state, `reset` returns to `Created`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelState {
    /// Constructed, components not started.
    Created,
    /// Components prepared.
    Initialized,
    /// Accepting and executing tasks.
    Running,
    /// Temporarily not accepting tasks.
    Paused,
    /// Terminal until `reset`.
    ShutDown,
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Initialized => write!(f, "Initialized"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
            Self::ShutDown => write!(f, "ShutDown"),
        }
    }
}

/// Resources a kernel accepts limits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// CPU utilization bound.
    Cpu,
    /// Memory utilization bound.
    Memory,
    /// Worker-pool thread bound.
    Threads,
    /// Cache capacity bound in entries.
    Cache,
}

impl ResourceKind {
    /// External name of the resource.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Threads => "threads",
            ResourceKind::Cache => "cache",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(ResourceKind::Cpu),
            "memory" => Ok(ResourceKind::Memory),
            "threads" => Ok(ResourceKind::Threads),
            "cache" => Ok(ResourceKind::Cache),
            other => Err(format!("unknown resource '{other}'")),
        }
    }
}

/// Per-kernel component sizing.
#[derive(Clone, Debug)]
pub struct KernelConfig {
    /// Local cache sizing.
    pub cache: CacheSettings,
    /// Local worker pool sizing; `None` for kernels that run tasks inline.
    pub pool: Option<WorkerPoolConfig>,
    /// Recovery manager configuration; `None` for kernels without one.
    pub recovery: Option<RecoveryConfig>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::micro()
    }
}

impl KernelConfig {
    /// Defaults for a micro kernel.
    #[must_use]
    pub fn micro() -> Self {
        Self {
            cache: CacheSettings::default(),
            pool: Some(WorkerPoolConfig::default()),
            recovery: Some(RecoveryConfig {
                max_points: 3,
                checkpoint_interval: Duration::from_secs(120),
                enable_state_validation: false,
                point: RecoveryPointConfig {
                    storage_path: "./recovery_points/micro".into(),
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }

    /// Defaults for a computational kernel: more workers, compressed
    /// validated checkpoints, 30-minute result TTL.
    #[must_use]
    pub fn computational() -> Self {
        Self {
            cache: CacheSettings {
                default_ttl_seconds: 1800,
                cleanup_interval_seconds: 600,
                auto_resize: true,
                min_capacity: 50,
                max_capacity: 5000,
                ..Default::default()
            },
            pool: Some(WorkerPoolConfig {
                max_threads: 16,
                ..Default::default()
            }),
            recovery: Some(RecoveryConfig {
                max_points: 5,
                checkpoint_interval: Duration::from_secs(60),
                point: RecoveryPointConfig {
                    max_size: 4 * 1024 * 1024,
                    enable_compression: true,
                    storage_path: "./recovery_points/compute".into(),
                    retention_period: Duration::from_secs(12 * 3600),
                },
                ..Default::default()
            }),
        }
    }

    /// Defaults for an architectural kernel: no pool, long-lived entries.
    #[must_use]
    pub fn architectural() -> Self {
        Self {
            cache: CacheSettings {
                default_ttl_seconds: 7200,
                cleanup_interval_seconds: 1800,
                auto_resize: true,
                min_capacity: 100,
                max_capacity: 2000,
                ..Default::default()
            },
            pool: None,
            recovery: None,
        }
    }

    /// Defaults for a crypto micro kernel: short TTL, few validated points.
    #[must_use]
    pub fn crypto() -> Self {
        Self {
            cache: CacheSettings {
                default_ttl_seconds: 900,
                cleanup_interval_seconds: 300,
                auto_resize: true,
                min_capacity: 25,
                max_capacity: 1000,
                ..Default::default()
            },
            pool: Some(WorkerPoolConfig {
                queue_capacity: 512,
                ..Default::default()
            }),
            recovery: Some(RecoveryConfig {
                max_points: 3,
                checkpoint_interval: Duration::from_secs(120),
                point: RecoveryPointConfig {
                    max_size: 2 * 1024 * 1024,
                    enable_compression: true,
                    storage_path: "./recovery_points/crypto".into(),
                    retention_period: Duration::from_secs(6 * 3600),
                },
                ..Default::default()
            }),
        }
    }

    /// Defaults for an orchestration kernel: validation off for fast
    /// checkpoints, 30-minute tracking TTL.
    #[must_use]
    pub fn orchestration() -> Self {
        Self {
            cache: CacheSettings {
                initial_capacity: 1000,
                default_ttl_seconds: 1800,
                cleanup_interval_seconds: 300,
                auto_resize: true,
                min_capacity: 100,
                max_capacity: 10000,
                ..Default::default()
            },
            pool: Some(WorkerPoolConfig {
                queue_capacity: 512,
                ..Default::default()
            }),
            recovery: Some(RecoveryConfig {
                max_points: 5,
                checkpoint_interval: Duration::from_secs(60),
                enable_state_validation: false,
                point: RecoveryPointConfig {
                    storage_path: "./recovery_points/orchestration".into(),
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }

    /// Defaults for a parent kernel.
    #[must_use]
    pub fn parent() -> Self {
        Self {
            cache: CacheSettings::default(),
            pool: Some(WorkerPoolConfig {
                max_threads: 16,
                ..Default::default()
            }),
            recovery: None,
        }
    }
}

/// Shared contract implemented by every kernel variant.
pub trait Kernel: Send + Sync {
    /// Start the kernel's components. Returns false on failure, leaving the
    /// kernel in `Created`.
    fn initialize(&self) -> bool;

    /// Stop components and release resources. Idempotent; succeeds from any
    /// post-`Created` state.
    fn shutdown(&self);

    /// Returns true while the kernel is in `Running`.
    fn is_running(&self) -> bool;

    /// Snapshot of the latest performance observation.
    fn metrics(&self) -> PerformanceMetrics;

    /// Refresh performance and extended metrics.
    fn update_metrics(&self);

    /// Snapshot of the balancer-facing metrics.
    fn extended_metrics(&self) -> ExtendedKernelMetrics;

    /// Apply a named resource limit; unknown names warn and no-op.
    fn set_resource_limit(&self, resource: &str, limit: f64);

    /// Current usage of a named resource; unknown names warn and return 0.
    fn resource_usage(&self, resource: &str) -> f64;

    /// Variant tag.
    fn kernel_type(&self) -> KernelType;

    /// Kernel id, unique within a parent's child set.
    fn id(&self) -> String;

    /// Stop accepting tasks until `resume`.
    fn pause(&self);

    /// Leave `Paused`.
    fn resume(&self);

    /// Equivalent to `shutdown` followed by returning to `Created`.
    fn reset(&self);

    /// Capability strings of this variant.
    fn supported_features(&self) -> Vec<String>;

    /// Forward a closure to the local worker pool. The priority is advisory
    /// and resolved upstream. Returns false if the submission was rejected.
    fn schedule_task(&self, task: Job, priority: i32) -> bool;

    /// Process a balanced task. Returns false on failure.
    fn process_task(&self, task: &TaskDescriptor) -> bool;
}

/// Shared kernel handle.
pub type SharedKernel = Arc<dyn Kernel>;
