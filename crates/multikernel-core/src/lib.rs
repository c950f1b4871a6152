//! # Multikernel Core
//!
//! Core abstractions for the multikernel compute substrate.
//!
//! This crate provides:
//! - The kernel contract and its closed set of variants
//! - The hybrid adaptive load balancer
//! - A dynamic LRU + TTL cache with background maintenance
//! - A recovery manager for checksummed state snapshots
//! - A bounded worker pool over OS threads
//!
//! The substrate is pure OS-thread parallel; there is no scheduler-level
//! async. It exposes no CLI and is meant to be embedded.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accel;
pub mod balancer;
pub mod cache;
pub mod config;
pub mod error;
pub mod kernel;
pub mod metrics;
pub mod observability;
pub mod pool;
pub mod recovery;
pub mod task;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::accel::{Accelerator, SharedAccelerator, SoftwareOnly};
    pub use crate::balancer::{BalancingStrategy, DecisionCounters, LoadBalancer, TaskOrchestrator};
    pub use crate::cache::preload::{PreloadConfig, PreloadManager, PreloadMetrics};
    pub use crate::cache::profile::PlatformProfile;
    pub use crate::cache::sync::{CacheSyncHub, SharedByteCache};
    pub use crate::cache::{CacheStats, DynamicCache};
    pub use crate::config::{CacheSettings, ConfigError, CoreConfig};
    pub use crate::error::{KernelError, Result};
    pub use crate::kernel::{
        ArchitecturalKernel, ComputationalKernel, CryptoMicroKernel, Kernel, KernelConfig,
        KernelState, KernelType, MicroKernel, OrchestrationKernel, ParentKernel, SharedKernel,
    };
    pub use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
    pub use crate::observability::{LogConfig, LogLevel};
    pub use crate::pool::{PoolMetrics, WorkerPool, WorkerPoolConfig};
    pub use crate::recovery::{
        RecoveryConfig, RecoveryManager, RecoveryMetrics, RecoveryPoint, RecoveryPointConfig,
        RecoveryState,
    };
    pub use crate::task::{KernelMetrics, TaskDescriptor, TaskType};
}
