//! Logging configuration and per-kernel execution counters.
//!
//! The substrate emits structured `tracing` events; the embedding
//! application picks the sink. [`LogConfig::init`] installs a formatted
//! subscriber for applications that do not bring their own.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Developer diagnostics.
    Debug,
    /// Default operational level.
    #[default]
    Info,
    /// Degraded but functioning.
    Warn,
    /// Failures.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level.
    pub level: LogLevel,
    /// Emit JSON records instead of human-readable lines.
    pub structured: bool,
    /// Include thread ids in each record.
    pub include_thread_ids: bool,
    /// Include caller file/line.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            structured: false,
            include_thread_ids: false,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Verbose human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            include_location: true,
            ..Default::default()
        }
    }

    /// Structured JSON output with thread ids.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            structured: true,
            include_thread_ids: true,
            ..Default::default()
        }
    }

    /// Install a global `tracing` subscriber for this configuration.
    ///
    /// A subscriber installed earlier wins; this call is then a no-op.
    pub fn init(&self) {
        use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));
        let registry = tracing_subscriber::registry().with(filter);

        if self.structured {
            let layer = fmt::layer()
                .json()
                .with_thread_ids(self.include_thread_ids)
                .with_file(self.include_location)
                .with_line_number(self.include_location);
            registry.with(layer).try_init().ok();
        } else {
            let layer = fmt::layer()
                .with_thread_ids(self.include_thread_ids)
                .with_file(self.include_location)
                .with_line_number(self.include_location);
            registry.with(layer).try_init().ok();
        }
    }
}

/// Atomic execution counters owned by one kernel.
#[derive(Debug, Default)]
pub struct KernelCounters {
    /// Tasks processed.
    pub tasks_total: AtomicU64,
    /// Tasks that completed successfully.
    pub tasks_success: AtomicU64,
    /// Tasks that failed.
    pub tasks_failed: AtomicU64,
    /// Cumulative processing time in nanoseconds.
    pub processing_time_ns: AtomicU64,
}

impl KernelCounters {
    /// Record one task execution.
    pub fn record_execution(&self, latency: Duration, success: bool) {
        self.tasks_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.tasks_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.processing_time_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Mean task latency in microseconds.
    #[must_use]
    pub fn avg_latency_us(&self) -> f64 {
        let total = self.tasks_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let time_ns = self.processing_time_ns.load(Ordering::Relaxed);
        (time_ns as f64 / total as f64) / 1000.0
    }

    /// Fraction of tasks that succeeded, in `[0, 1]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.tasks_total.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        self.tasks_success.load(Ordering::Relaxed) as f64 / total as f64
    }
}
