//! Platform-derived cache sizing.
//!
//! The architectural kernel consults a [`PlatformProfile`] when recomputing
//! an optimal cache capacity for the host it runs on.

use serde::{Deserialize, Serialize};
use std::thread;

/// Host characteristics relevant to cache sizing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Logical CPUs available to the process.
    pub parallelism: usize,
    /// Recommended cache entry bound.
    pub max_entries: usize,
    /// Recommended default entry lifetime in seconds.
    pub entry_lifetime_seconds: u64,
}

impl PlatformProfile {
    /// Probe the current host.
    #[must_use]
    pub fn detect() -> Self {
        let parallelism = thread::available_parallelism().map_or(1, |n| n.get());
        Self::for_parallelism(parallelism)
    }

    /// Profile for an explicit CPU count. Entry budget scales with
    /// parallelism, bounded to a sane range.
    #[must_use]
    pub fn for_parallelism(parallelism: usize) -> Self {
        Self {
            parallelism,
            max_entries: (parallelism * 512).clamp(1024, 16384),
            entry_lifetime_seconds: 3600,
        }
    }

    /// Capacity recommendation for a kernel-local cache.
    #[must_use]
    pub fn optimal_cache_capacity(&self) -> usize {
        self.max_entries
    }

    /// Human-readable description of the profile.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} logical cpus, {} cache entries",
            self.parallelism, self.max_entries
        )
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_budget_scales_with_parallelism() {
        assert_eq!(PlatformProfile::for_parallelism(1).max_entries, 1024);
        assert_eq!(PlatformProfile::for_parallelism(8).max_entries, 4096);
        assert_eq!(PlatformProfile::for_parallelism(512).max_entries, 16384);
    }

    #[test]
    fn test_detect_is_nonzero() {
        let profile = PlatformProfile::detect();
        assert!(profile.parallelism >= 1);
        assert!(profile.optimal_cache_capacity() >= 1024);
    }
}
