//! Byte-scrambling kernel.

use crate::accel::SharedAccelerator;
use crate::error::Result;
use crate::kernel::{Kernel, KernelConfig, KernelCore, KernelType};
use crate::metrics::{ExtendedKernelMetrics, PerformanceMetrics};
use crate::pool::Job;
use crate::recovery::checksum_hex;
use crate::task::TaskDescriptor;
use tracing::{debug, trace};

/// Inputs above this size get the additional block pass.
const BLOCK_PASS_THRESHOLD: usize = 512;

/// Kernel applying a fixed byte-scrambling transform, memoizing results
/// and checkpointing after each task.
pub struct CryptoMicroKernel {
    core: KernelCore,
    accelerator: Option<SharedAccelerator>,
}

impl CryptoMicroKernel {
    /// Create a crypto micro kernel with the variant defaults.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_config(id, KernelConfig::crypto())
    }

    /// Create a crypto micro kernel with explicit component sizing.
    ///
    /// # Errors
    ///
    /// Propagates component configuration errors.
    pub fn with_config(id: impl Into<String>, config: KernelConfig) -> Result<Self> {
        Ok(Self {
            core: KernelCore::new(id, KernelType::CryptoMicro, config)?,
            accelerator: None,
        })
    }

    /// Attach an acceleration capability.
    pub fn set_accelerator(&mut self, accelerator: SharedAccelerator) {
        self.accelerator = Some(accelerator);
    }

    /// Scramble `data` into `result`.
    ///
    /// The result is memoized under a content-derived key and followed by a
    /// recovery point. Returns false when the kernel is not running.
    pub fn execute_crypto_task(&self, data: &[u8], result: &mut Vec<u8>) -> bool {
        if !self.core.is_running() {
            return false;
        }
        let key = format!("crypto_{}", &checksum_hex(data)[..16]);
        if let Some(cached) = self.core.cache().get(&key) {
            trace!(kernel = %self.core.id(), %key, "Scramble served from cache");
            *result = cached;
            return true;
        }

        let output = match self
            .accelerator
            .as_ref()
            .filter(|a| a.is_available())
            .and_then(|a| a.transform(data))
        {
            Some(accelerated) => hardware_finish(accelerated),
            None => software_scramble(data),
        };

        self.core.cache().put(key, output.clone());
        self.core.checkpoint();
        *result = output;
        debug!(kernel = %self.core.id(), bytes = data.len(), "Crypto task complete");
        true
    }

    fn efficiency(&self) -> f64 {
        match &self.accelerator {
            Some(accel) if accel.is_available() => 0.95,
            Some(_) => 0.8,
            None => 0.7,
        }
    }

    /// Shared internals, exposed for composition and tests.
    #[must_use]
    pub fn core(&self) -> &KernelCore {
        &self.core
    }
}

/// Finishing pass applied on top of an accelerated copy.
fn hardware_finish(mut bytes: Vec<u8>) -> Vec<u8> {
    for b in &mut bytes {
        *b ^= 0x55;
        *b = ((*b as u16 * 3 + 7) % 256) as u8;
    }
    bytes
}

/// The software scramble: per-byte mixing, plus a 16-byte-block index XOR
/// for inputs over [`BLOCK_PASS_THRESHOLD`] bytes.
pub(crate) fn software_scramble(data: &[u8]) -> Vec<u8> {
    let mut result: Vec<u8> = data
        .iter()
        .map(|&b| {
            let b = b ^ 0xAA;
            let b = ((b as u16 * 7 + 13) % 256) as u8;
            let b = b ^ 0x55;
            ((b as u16 + 17) % 256) as u8
        })
        .collect();

    if data.len() > BLOCK_PASS_THRESHOLD {
        for block in (0..result.len()).step_by(16) {
            let end = (block + 16).min(result.len());
            for j in block..end {
                result[j] ^= (j % 256) as u8;
            }
        }
    }
    result
}

impl Kernel for CryptoMicroKernel {
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
        KernelType::CryptoMicro
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
            "byte_scrambling".to_string(),
            "cache_optimization".to_string(),
            "recovery_management".to_string(),
        ];
        if self
            .accelerator
            .as_ref()
            .is_some_and(|a| a.is_available())
        {
            features.push("hardware_acceleration".to_string());
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;
    use crate::pool::WorkerPoolConfig;

    fn kernel() -> CryptoMicroKernel {
        let config = KernelConfig {
            cache: CacheSettings {
                initial_capacity: 32,
                ..Default::default()
            },
            pool: Some(WorkerPoolConfig {
                min_threads: 1,
                max_threads: 2,
                queue_capacity: 16,
                stack_size: 256 * 1024,
            }),
            recovery: None,
        };
        CryptoMicroKernel::with_config("crypto-test", config).unwrap()
    }

    #[test]
    fn test_scramble_formula() {
        // 0x00: ^0xAA = 0xAA(170); *7+13 = 1203 % 256 = 179; ^0x55 = 0xE6(230);
        // +17 = 247
        assert_eq!(software_scramble(&[0x00]), vec![247]);
    }

    #[test]
    fn test_small_input_skips_block_pass() {
        let data = vec![0x11u8; 512];
        let scrambled = software_scramble(&data);
        // All input bytes equal, so without the block pass all outputs equal.
        assert!(scrambled.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_large_input_gets_block_pass() {
        let data = vec![0x11u8; 513];
        let scrambled = software_scramble(&data);
        // The index XOR differentiates positions within a block.
        assert_ne!(scrambled[0], scrambled[1]);
        let base = software_scramble(&vec![0x11u8; 16]);
        assert_eq!(scrambled[3], base[3] ^ 3);
        assert_eq!(scrambled[260], base[0] ^ (260 % 256) as u8);
    }

    #[test]
    fn test_execute_returns_and_caches() {
        let kernel = kernel();
        assert!(kernel.initialize());
        let mut out = Vec::new();
        assert!(kernel.execute_crypto_task(&[1, 2, 3], &mut out));
        assert_eq!(out, software_scramble(&[1, 2, 3]));

        let mut cached = Vec::new();
        assert!(kernel.execute_crypto_task(&[1, 2, 3], &mut cached));
        assert_eq!(cached, out);
        assert!(kernel.core().cache().stats().hits >= 1);
    }

    #[test]
    fn test_execute_requires_running() {
        let kernel = kernel();
        let mut out = Vec::new();
        assert!(!kernel.execute_crypto_task(&[1], &mut out));
        assert!(out.is_empty());
    }
}
