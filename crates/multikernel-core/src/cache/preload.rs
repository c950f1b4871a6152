//! Predictive cache preloading.
//!
//! A [`PreloadManager`] accumulates candidate entries ahead of demand and
//! hands them to kernels for cache warm-up. Candidates above the prediction
//! threshold are kept in the preload store; kernels pull the whole store on
//! [`warmup`](crate::kernel::KernelCore::warmup_from_preload).

use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Preload tuning knobs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Bound on queued preload candidates.
    pub max_queue_size: usize,
    /// Candidates admitted per processing pass.
    pub max_batch_size: usize,
    /// Access-history window considered by the predictor.
    pub prediction_window: Duration,
    /// Minimum predicted re-access score for admission, in `(0, 1]`.
    pub prediction_threshold: f64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_batch_size: 64,
            prediction_window: Duration::from_secs(300),
            prediction_threshold: 0.5,
        }
    }
}

impl PreloadConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] when a bound is zero or the
    /// threshold is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(KernelError::config("max_queue_size must be > 0"));
        }
        if self.max_batch_size == 0 {
            return Err(KernelError::config("max_batch_size must be > 0"));
        }
        if self.prediction_window.is_zero() {
            return Err(KernelError::config("prediction_window must be > 0"));
        }
        if self.prediction_threshold <= 0.0 {
            return Err(KernelError::config("prediction_threshold must be > 0"));
        }
        Ok(())
    }
}

/// Preload activity counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreloadMetrics {
    /// Candidates waiting for a processing pass.
    pub queue_size: usize,
    /// Entries admitted to the store.
    pub stored_entries: usize,
    /// Fraction of candidates admitted, in `[0, 1]`.
    pub admission_rate: f64,
}

struct PreloadTask {
    key: String,
    data: Vec<u8>,
    enqueued: Instant,
}

struct AccessRecord {
    count: u64,
    last_seen: Instant,
}

/// Thread-safe manager of preload candidates and the warm-up store.
pub struct PreloadManager {
    config: RwLock<PreloadConfig>,
    queue: Mutex<VecDeque<PreloadTask>>,
    store: RwLock<HashMap<String, Vec<u8>>>,
    history: Mutex<HashMap<String, AccessRecord>>,
    initialized: AtomicBool,
    offered: AtomicU64,
    admitted: AtomicU64,
}

impl PreloadManager {
    /// Construct an uninitialized manager.
    #[must_use]
    pub fn new(config: PreloadConfig) -> Self {
        Self {
            config: RwLock::new(config),
            queue: Mutex::new(VecDeque::new()),
            store: RwLock::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            offered: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
        }
    }

    /// Validate the configuration and start accepting candidates.
    /// Idempotent; returns false on invalid configuration.
    pub fn initialize(&self) -> bool {
        if self.initialized.load(Ordering::Acquire) {
            return true;
        }
        if let Err(err) = self.config.read().unwrap().validate() {
            warn!(%err, "Invalid preload configuration");
            return false;
        }
        self.initialized.store(true, Ordering::Release);
        debug!("Preload manager initialized");
        true
    }

    /// Offer a candidate for preloading. Queued candidates are admitted to
    /// the store in batches when the predictor scores them above threshold.
    ///
    /// Returns false before `initialize` or when the queue is full.
    pub fn preload_data(&self, key: impl Into<String>, data: Vec<u8>) -> bool {
        if !self.initialized.load(Ordering::Acquire) {
            return false;
        }
        let key = key.into();
        let config = *self.config.read().unwrap();
        {
            let mut queue = self.queue.lock().unwrap();
            if queue.len() >= config.max_queue_size {
                trace!(%key, "Preload queue full, candidate dropped");
                return false;
            }
            queue.push_back(PreloadTask {
                key,
                data,
                enqueued: Instant::now(),
            });
        }
        self.offered.fetch_add(1, Ordering::Relaxed);
        self.process_batch(&config);
        true
    }

    /// Insert directly into the warm-up store, bypassing prediction.
    pub fn add_data(&self, key: impl Into<String>, data: Vec<u8>) -> bool {
        if !self.initialized.load(Ordering::Acquire) {
            return false;
        }
        self.store.write().unwrap().insert(key.into(), data);
        self.admitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Record an observed access; feeds the predictor.
    pub fn record_access(&self, key: &str) {
        let mut history = self.history.lock().unwrap();
        let record = history.entry(key.to_string()).or_insert(AccessRecord {
            count: 0,
            last_seen: Instant::now(),
        });
        record.count += 1;
        record.last_seen = Instant::now();
    }

    /// Predicted re-access score for `key` in `[0, 1]`: access frequency
    /// decayed to zero outside the prediction window.
    #[must_use]
    pub fn predict_next_access(&self, key: &str) -> f64 {
        let config = *self.config.read().unwrap();
        let history = self.history.lock().unwrap();
        match history.get(key) {
            Some(record) if record.last_seen.elapsed() <= config.prediction_window => {
                (record.count as f64 / 10.0).min(1.0)
            }
            _ => 0.0,
        }
    }

    fn process_batch(&self, config: &PreloadConfig) {
        let batch: Vec<PreloadTask> = {
            let mut queue = self.queue.lock().unwrap();
            let take = queue.len().min(config.max_batch_size);
            queue.drain(..take).collect()
        };
        if batch.is_empty() {
            return;
        }
        let mut store = self.store.write().unwrap();
        for task in batch {
            // Stale candidates and cold keys are rejected; an explicitly
            // offered but never-seen key still passes once as a warm start.
            let score = self.predict_score_unlocked(&task.key, config);
            let fresh = task.enqueued.elapsed() <= config.prediction_window;
            if fresh && (score >= config.prediction_threshold || score == 0.0) {
                store.insert(task.key, task.data);
                self.admitted.fetch_add(1, Ordering::Relaxed);
            } else {
                trace!(key = %task.key, score, "Preload candidate rejected");
            }
        }
    }

    fn predict_score_unlocked(&self, key: &str, config: &PreloadConfig) -> f64 {
        let history = self.history.lock().unwrap();
        match history.get(key) {
            Some(record) if record.last_seen.elapsed() <= config.prediction_window => {
                (record.count as f64 / 10.0).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// Keys currently in the warm-up store.
    #[must_use]
    pub fn all_keys(&self) -> Vec<String> {
        self.store.read().unwrap().keys().cloned().collect()
    }

    /// Stored bytes for `key`, if admitted.
    #[must_use]
    pub fn data_for_key(&self, key: &str) -> Option<Vec<u8>> {
        self.store.read().unwrap().get(key).cloned()
    }

    /// Activity counters.
    #[must_use]
    pub fn metrics(&self) -> PreloadMetrics {
        let offered = self.offered.load(Ordering::Relaxed);
        let admitted = self.admitted.load(Ordering::Relaxed);
        PreloadMetrics {
            queue_size: self.queue.lock().unwrap().len(),
            stored_entries: self.store.read().unwrap().len(),
            admission_rate: if offered == 0 {
                0.0
            } else {
                admitted as f64 / offered as f64
            },
        }
    }

    /// Replace the configuration.
    pub fn set_configuration(&self, config: PreloadConfig) {
        *self.config.write().unwrap() = config;
    }

    /// Current configuration.
    #[must_use]
    pub fn configuration(&self) -> PreloadConfig {
        *self.config.read().unwrap()
    }

    /// Stop accepting candidates and drop the queue. Idempotent.
    pub fn shutdown(&self) {
        self.initialized.store(false, Ordering::Release);
        self.queue.lock().unwrap().clear();
        debug!("Preload manager shut down");
    }
}
