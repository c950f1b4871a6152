//! # Multikernel
//!
//! A multi-kernel compute substrate: a process hosting several interacting
//! kernel workers that distributes opaque byte-payload tasks among them
//! under resource and workload constraints, keeps a hot per-kernel working
//! set in a tiered cache, and takes periodic consistency checkpoints so the
//! process can resume after failure.
//!
//! ## Components
//!
//! - **Kernels**: a closed set of variants (micro, computational,
//!   architectural, crypto, parent, orchestration) sharing one lifecycle
//!   and task-execution contract
//! - **Load balancer**: hybrid resource-aware + workload-specific scoring
//!   with automatic strategy switching under saturation
//! - **Dynamic cache**: LRU + TTL with adaptive resizing and a cooperative
//!   background maintenance thread
//! - **Recovery manager**: checksummed, optionally compressed state
//!   snapshots persisted as JSON documents
//! - **Worker pool**: bounded FIFO execution over OS threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multikernel::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     let worker: SharedKernel = Arc::new(ComputationalKernel::new("compute-0")?);
//!     worker.initialize();
//!
//!     let orchestrator = OrchestrationKernel::new("orchestrator")?;
//!     orchestrator.initialize();
//!     orchestrator.enqueue_task(vec![0u8; 4096], 8);
//!     orchestrator.orchestrate(&[worker]);
//!     Ok(())
//! }
//! ```
//!
//! The substrate is pure OS-thread parallel and exposes no CLI; ambient
//! configuration arrives through each component's constructor.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core crate
pub use multikernel_core as core;

/// Prelude module for convenient imports.
///
/// Import everything you need with:
/// ```rust,ignore
/// use multikernel::prelude::*;
/// ```
pub mod prelude {
    pub use multikernel_core::prelude::*;
}

/// Version information.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _kind = KernelType::Computational;
        let _strategy = BalancingStrategy::HybridAdaptive;
        let _state = KernelState::Created;
    }

    #[test]
    fn test_version() {
        assert!(!crate::version::VERSION.is_empty());
    }
}
