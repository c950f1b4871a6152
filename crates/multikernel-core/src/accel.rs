//! Optional hardware-acceleration capability.
//!
//! Real drivers live outside the core; the substrate only depends on this
//! byte-transform seam. Kernels that hold an accelerator use it when
//! [`Accelerator::is_available`] reports true and fall back to their
//! software path otherwise.

use std::sync::Arc;

/// A byte-transform capability supplied by the embedding application.
pub trait Accelerator: Send + Sync {
    /// Whether the backing hardware is usable right now.
    fn is_available(&self) -> bool;

    /// Transform `input`, returning `None` when the device cannot take the
    /// job (the caller then runs its software path).
    fn transform(&self, input: &[u8]) -> Option<Vec<u8>>;

    /// Human-readable device description.
    fn platform_info(&self) -> String;
}

/// Shared accelerator handle.
pub type SharedAccelerator = Arc<dyn Accelerator>;

/// Null accelerator: never available, never transforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareOnly;

impl Accelerator for SoftwareOnly {
    fn is_available(&self) -> bool {
        false
    }

    fn transform(&self, _input: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn platform_info(&self) -> String {
        "software-only".to_string()
    }
}
