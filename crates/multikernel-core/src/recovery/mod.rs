//! Checkpoint/restore of caller-supplied state blobs.
//!
//! The recovery manager captures opaque byte snapshots through an installed
//! capture callback, persists each as a single JSON document under the
//! configured storage directory, and restores them through a caller-supplied
//! restore callback. Snapshots are checksummed with SHA-256 and optionally
//! run-length compressed when that shrinks the payload.
//!
//! State machine: `Uninitialized -> Initialized <-> RecoveryInProgress`;
//! `Initialized -> ShutDown` is terminal. All operations have total return
//! types; failures surface through the error callback.

pub mod codec;

use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Callback producing the state bytes to snapshot.
pub type StateCaptureCallback = Box<dyn Fn() -> Vec<u8> + Send + Sync>;
/// Callback receiving restored state bytes; returns false to abort.
pub type StateRestoreCallback = Box<dyn Fn(&[u8]) -> bool + Send + Sync>;
/// Callback receiving a short diagnostic on failure.
pub type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Blob captured when no capture callback is installed.
const DEFAULT_STATE: [u8; 5] = [0x01, 0x02, 0x03, 0x04, 0x05];

/// Metadata key marking a compressed `state` field.
const META_COMPRESSED: &str = "compressed";

/// Per-point persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryPointConfig {
    /// Largest accepted state blob in bytes (pre-compression).
    pub max_size: u64,
    /// Run-length compress payloads when it shrinks them.
    pub enable_compression: bool,
    /// Directory holding one `{id}.json` per point.
    pub storage_path: PathBuf,
    /// Points older than this are eligible for eviction.
    pub retention_period: Duration,
}

impl Default for RecoveryPointConfig {
    fn default() -> Self {
        Self {
            max_size: 5 * 1024 * 1024,
            enable_compression: false,
            storage_path: PathBuf::from("./recovery_points"),
            retention_period: Duration::from_secs(3600),
        }
    }
}

/// Recovery manager configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Bound on points held in memory.
    pub max_points: usize,
    /// Interval between automatic checkpoints.
    pub checkpoint_interval: Duration,
    /// Restore the newest consistent point after a failure.
    pub enable_auto_recovery: bool,
    /// Checksum snapshots and verify them on load.
    pub enable_state_validation: bool,
    /// Per-point persistence settings.
    pub point: RecoveryPointConfig,
    /// Diagnostic log destination for the embedding application's sink.
    pub log_path: PathBuf,
    /// Log rotation threshold in bytes.
    pub max_log_size: u64,
    /// Rotated log file count.
    pub max_log_files: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_points: 10,
            checkpoint_interval: Duration::from_secs(30),
            enable_auto_recovery: true,
            enable_state_validation: true,
            point: RecoveryPointConfig::default(),
            log_path: PathBuf::from("logs/recovery.log"),
            max_log_size: 1024 * 1024,
            max_log_files: 2,
        }
    }
}

impl RecoveryConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] when a bound is zero or the
    /// storage path is empty.
    pub fn validate(&self) -> Result<()> {
        if self.max_points == 0 {
            return Err(KernelError::config("max_points must be > 0"));
        }
        if self.checkpoint_interval.is_zero() {
            return Err(KernelError::config("checkpoint_interval must be > 0"));
        }
        if self.point.max_size == 0 {
            return Err(KernelError::config("point.max_size must be > 0"));
        }
        if self.point.storage_path.as_os_str().is_empty() {
            return Err(KernelError::config("point.storage_path must not be empty"));
        }
        Ok(())
    }
}

/// A persisted, checksummed snapshot of caller-provided state bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecoveryPoint {
    /// 16 lowercase hex characters, unique within the process.
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// State bytes, possibly run-length compressed, stored as base64.
    #[serde(with = "codec::base64_bytes")]
    pub state: Vec<u8>,
    /// Pre-compression state length in bytes.
    pub size: u64,
    /// Whether the state passed validation at creation time.
    #[serde(rename = "isConsistent")]
    pub is_consistent: bool,
    /// SHA-256 of the pre-compression bytes, 64 hex characters.
    pub checksum: String,
    /// Free-form annotations.
    pub metadata: HashMap<String, String>,
}

impl RecoveryPoint {
    /// Returns true if the `state` field is run-length compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.metadata.get(META_COMPRESSED).map(String::as_str) == Some("true")
    }
}

/// Lifecycle states of the recovery manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryState {
    /// Constructed, storage not yet prepared.
    Uninitialized,
    /// Ready to create and restore points.
    Initialized,
    /// A restore is in flight.
    RecoveryInProgress,
    /// Terminal.
    ShutDown,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::RecoveryInProgress => write!(f, "RecoveryInProgress"),
            Self::ShutDown => write!(f, "ShutDown"),
        }
    }
}

/// Counters describing recovery activity.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecoveryMetrics {
    /// Points currently indexed.
    pub total_points: usize,
    /// Restores that completed.
    pub successful_recoveries: u64,
    /// Restores that failed.
    pub failed_recoveries: u64,
    /// Running mean restore duration in milliseconds.
    pub average_recovery_time_ms: f64,
    /// Completion instant of the latest restore.
    pub last_recovery: Option<Instant>,
}

/// Creates, persists, validates and restores state snapshots.
pub struct RecoveryManager {
    config: RwLock<RecoveryConfig>,
    points: RwLock<HashMap<String, RecoveryPoint>>,
    state: RwLock<RecoveryState>,
    recovery_in_progress: AtomicBool,
    last_checkpoint: Mutex<Option<Instant>>,
    metrics: Mutex<RecoveryMetrics>,
    capture_cb: RwLock<Option<StateCaptureCallback>>,
    restore_cb: RwLock<Option<StateRestoreCallback>>,
    error_cb: RwLock<Option<ErrorCallback>>,
}

impl RecoveryManager {
    /// Construct an uninitialized manager.
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config: RwLock::new(config),
            points: RwLock::new(HashMap::new()),
            state: RwLock::new(RecoveryState::Uninitialized),
            recovery_in_progress: AtomicBool::new(false),
            last_checkpoint: Mutex::new(None),
            metrics: Mutex::new(RecoveryMetrics::default()),
            capture_cb: RwLock::new(None),
            restore_cb: RwLock::new(None),
            error_cb: RwLock::new(None),
        }
    }

    /// Prepare the storage directory and validate the configuration.
    ///
    /// Idempotent; returns false on invalid configuration or I/O failure
    /// and leaves the manager `Uninitialized`.
    pub fn initialize(&self) -> bool {
        {
            let state = self.state.read().unwrap();
            match *state {
                RecoveryState::Initialized | RecoveryState::RecoveryInProgress => {
                    warn!("Recovery manager already initialized");
                    return true;
                }
                RecoveryState::ShutDown => {
                    self.handle_error("initialize called after shutdown");
                    return false;
                }
                RecoveryState::Uninitialized => {}
            }
        }
        let config = self.config.read().unwrap().clone();
        if let Err(err) = config.validate() {
            self.handle_error(&format!("invalid recovery configuration: {err}"));
            return false;
        }
        if let Err(err) = fs::create_dir_all(&config.point.storage_path) {
            self.handle_error(&format!(
                "failed to create storage directory {}: {err}",
                config.point.storage_path.display()
            ));
            return false;
        }
        *self.state.write().unwrap() = RecoveryState::Initialized;
        info!(storage = %config.point.storage_path.display(), "Recovery manager initialized");
        true
    }

    /// Terminal shutdown. Idempotent.
    pub fn shutdown(&self) {
        let mut state = self.state.write().unwrap();
        if *state == RecoveryState::ShutDown {
            return;
        }
        *state = RecoveryState::ShutDown;
        info!("Recovery manager shut down");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RecoveryState {
        *self.state.read().unwrap()
    }

    /// Capture and persist a snapshot. Returns the new point's id, or an
    /// empty string on failure.
    pub fn create_recovery_point(&self) -> String {
        if self.state() != RecoveryState::Initialized {
            self.handle_error("create_recovery_point requires an initialized manager");
            return String::new();
        }
        let started = Instant::now();
        match self.try_create_point() {
            Ok(id) => {
                *self.last_checkpoint.lock().unwrap() = Some(Instant::now());
                let mut metrics = self.metrics.lock().unwrap();
                metrics.total_points = self.points.read().unwrap().len();
                drop(metrics);
                debug!(
                    point = %id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Recovery point created"
                );
                id
            }
            Err(err) => {
                self.handle_error(&format!("failed to create recovery point: {err}"));
                String::new()
            }
        }
    }

    fn try_create_point(&self) -> Result<String> {
        let config = self.config.read().unwrap().clone();
        let raw = match self.capture_cb.read().unwrap().as_ref() {
            Some(capture) => capture(),
            None => DEFAULT_STATE.to_vec(),
        };
        if raw.len() as u64 > config.point.max_size {
            return Err(KernelError::validation(format!(
                "state blob of {} bytes exceeds max_size {}",
                raw.len(),
                config.point.max_size
            )));
        }

        let (checksum, is_consistent) = if config.enable_state_validation {
            (checksum_hex(&raw), !raw.is_empty())
        } else {
            (String::new(), true)
        };

        let size = raw.len() as u64;
        let mut metadata = HashMap::new();
        let state = if config.point.enable_compression {
            match codec::compress_if_smaller(&raw) {
                Some(compressed) => {
                    metadata.insert(META_COMPRESSED.to_string(), "true".to_string());
                    compressed
                }
                None => raw,
            }
        } else {
            raw
        };

        // Index mutation and file I/O happen under the writer lock; a failed
        // write must not leave a dangling index entry.
        let mut points = self.points.write().unwrap();
        let id = generate_point_id(&points);
        let point = RecoveryPoint {
            id: id.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            state,
            size,
            is_consistent,
            checksum,
            metadata,
        };
        write_point_file(&config.point.storage_path, &point)?;
        points.insert(id.clone(), point);
        Self::enforce_bounds(&mut points, &config);
        Ok(id)
    }

    /// Load a point, verify it and hand its bytes to the restore callback.
    ///
    /// Returns false on any failure; the caller's state is left untouched.
    pub fn restore_from_point(&self, id: &str) -> bool {
        {
            let mut state = self.state.write().unwrap();
            if *state != RecoveryState::Initialized {
                drop(state);
                self.handle_error("restore_from_point requires an initialized manager");
                return false;
            }
            *state = RecoveryState::RecoveryInProgress;
        }
        self.recovery_in_progress.store(true, Ordering::Release);
        let started = Instant::now();
        let outcome = self.try_restore(id);
        self.recovery_in_progress.store(false, Ordering::Release);
        {
            let mut state = self.state.write().unwrap();
            if *state == RecoveryState::RecoveryInProgress {
                *state = RecoveryState::Initialized;
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as f64;
        let mut metrics = self.metrics.lock().unwrap();
        match outcome {
            Ok(()) => {
                metrics.successful_recoveries += 1;
                let n = metrics.successful_recoveries as f64;
                metrics.average_recovery_time_ms =
                    (metrics.average_recovery_time_ms * (n - 1.0) + elapsed_ms) / n;
                metrics.last_recovery = Some(Instant::now());
                drop(metrics);
                info!(point = %id, elapsed_ms, "Restored from recovery point");
                true
            }
            Err(err) => {
                metrics.failed_recoveries += 1;
                drop(metrics);
                self.handle_error(&format!("failed to restore from point {id}: {err}"));
                false
            }
        }
    }

    fn try_restore(&self, id: &str) -> Result<()> {
        let config = self.config.read().unwrap().clone();
        // File I/O under the writer lock on the manager's state.
        let guard = self.points.write().unwrap();
        let path = config.point.storage_path.join(format!("{id}.json"));
        let contents = fs::read(&path).map_err(|_| KernelError::PointNotFound(id.to_string()))?;
        let point: RecoveryPoint = serde_json::from_slice(&contents)?;
        drop(guard);

        let bytes = if point.is_compressed() {
            codec::rle_decode(&point.state)?
        } else {
            point.state.clone()
        };

        if config.enable_state_validation {
            if bytes.is_empty() {
                return Err(KernelError::validation("restored state is empty"));
            }
            let computed = checksum_hex(&bytes);
            if computed != point.checksum {
                return Err(KernelError::validation(format!(
                    "checksum mismatch for point {id}: stored {}, computed {computed}",
                    point.checksum
                )));
            }
        }

        match self.restore_cb.read().unwrap().as_ref() {
            Some(restore) => {
                if restore(&bytes) {
                    Ok(())
                } else {
                    Err(KernelError::validation("restore callback rejected state"))
                }
            }
            None => {
                info!("No restore callback installed, skipping state restoration");
                Ok(())
            }
        }
    }

    /// Remove a point from memory and disk.
    pub fn delete_recovery_point(&self, id: &str) {
        let config = self.config.read().unwrap().clone();
        let mut points = self.points.write().unwrap();
        points.remove(id);
        let path = config.point.storage_path.join(format!("{id}.json"));
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                drop(points);
                self.handle_error(&format!("failed to delete point file {id}: {err}"));
                return;
            }
        }
        let total = points.len();
        drop(points);
        self.metrics.lock().unwrap().total_points = total;
        debug!(point = %id, "Recovery point deleted");
    }

    /// Returns true iff validation is disabled or the bytes are non-empty.
    #[must_use]
    pub fn validate_state(&self, state: &[u8]) -> bool {
        if !self.config.read().unwrap().enable_state_validation {
            return true;
        }
        !state.is_empty()
    }

    /// Install the state capture callback.
    pub fn set_state_capture_callback<F>(&self, callback: F)
    where
        F: Fn() -> Vec<u8> + Send + Sync + 'static,
    {
        *self.capture_cb.write().unwrap() = Some(Box::new(callback));
    }

    /// Install the state restore callback.
    pub fn set_state_restore_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        *self.restore_cb.write().unwrap() = Some(Box::new(callback));
    }

    /// Install the error callback.
    pub fn set_error_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.error_cb.write().unwrap() = Some(Box::new(callback));
    }

    /// Replace the configuration and re-apply the point bounds.
    pub fn set_configuration(&self, config: RecoveryConfig) {
        let mut points = self.points.write().unwrap();
        *self.config.write().unwrap() = config.clone();
        Self::enforce_bounds(&mut points, &config);
        let total = points.len();
        drop(points);
        self.metrics.lock().unwrap().total_points = total;
    }

    /// Current configuration.
    #[must_use]
    pub fn configuration(&self) -> RecoveryConfig {
        self.config.read().unwrap().clone()
    }

    /// Activity counters; `total_points` reflects the live index.
    #[must_use]
    pub fn metrics(&self) -> RecoveryMetrics {
        let mut metrics = *self.metrics.lock().unwrap();
        metrics.total_points = self.points.read().unwrap().len();
        metrics
    }

    /// When the latest point was created.
    #[must_use]
    pub fn last_checkpoint_time(&self) -> Option<Instant> {
        *self.last_checkpoint.lock().unwrap()
    }

    /// Returns true while a restore is in flight.
    #[must_use]
    pub fn is_recovery_in_progress(&self) -> bool {
        self.recovery_in_progress.load(Ordering::Acquire)
    }

    /// Ids of the indexed points.
    #[must_use]
    pub fn point_ids(&self) -> Vec<String> {
        self.points.read().unwrap().keys().cloned().collect()
    }

    /// Evict retention-expired points, then the oldest points past
    /// `max_points`. Files of evicted points are removed from disk.
    fn enforce_bounds(points: &mut HashMap<String, RecoveryPoint>, config: &RecoveryConfig) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let retention_ms = config.point.retention_period.as_millis() as i64;
        let expired: Vec<String> = points
            .values()
            .filter(|p| retention_ms > 0 && now_ms - p.timestamp > retention_ms)
            .map(|p| p.id.clone())
            .collect();
        for id in expired {
            points.remove(&id);
            let _ = fs::remove_file(config.point.storage_path.join(format!("{id}.json")));
            debug!(point = %id, "Retention-expired recovery point evicted");
        }
        while points.len() > config.max_points {
            let oldest = points
                .values()
                .min_by_key(|p| p.timestamp)
                .map(|p| p.id.clone());
            match oldest {
                Some(id) => {
                    points.remove(&id);
                    let _ = fs::remove_file(config.point.storage_path.join(format!("{id}.json")));
                    debug!(point = %id, "Oldest recovery point evicted");
                }
                None => break,
            }
        }
    }

    fn handle_error(&self, message: &str) {
        error!("{message}");
        if let Some(callback) = self.error_cb.read().unwrap().as_ref() {
            callback(message);
        }
    }
}

/// SHA-256 of `data` as 64 lowercase hex characters.
#[must_use]
pub fn checksum_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Draw 16 lowercase hex characters, re-drawing on collision with the index.
fn generate_point_id(existing: &HashMap<String, RecoveryPoint>) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    loop {
        let bytes: [u8; 8] = rng.gen();
        let id: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        if !existing.contains_key(&id) {
            return id;
        }
    }
}

/// Serialize a point to `{storage}/{id}.json`, writing through a temporary
/// file and renaming so a crash never leaves a partial document.
fn write_point_file(storage: &std::path::Path, point: &RecoveryPoint) -> Result<()> {
    let json = serde_json::to_vec_pretty(point)?;
    let tmp = storage.join(format!("{}.json.tmp", point.id));
    let path = storage.join(format!("{}.json", point.id));
    fs::write(&tmp, &json)?;
    if let Err(err) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(KernelError::Io(err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn test_config(dir: &std::path::Path) -> RecoveryConfig {
        RecoveryConfig {
            max_points: 5,
            point: RecoveryPointConfig {
                storage_path: dir.to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn initialized_manager(dir: &std::path::Path) -> RecoveryManager {
        let manager = RecoveryManager::new(test_config(dir));
        assert!(manager.initialize());
        manager
    }

    #[test]
    fn test_initialize_creates_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("points/nested");
        let manager = RecoveryManager::new(test_config(&nested));
        assert!(manager.initialize());
        assert!(nested.is_dir());
        assert_eq!(manager.state(), RecoveryState::Initialized);
        // Idempotent.
        assert!(manager.initialize());
    }

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_points = 0;
        let manager = RecoveryManager::new(config);
        assert!(!manager.initialize());
        assert_eq!(manager.state(), RecoveryState::Uninitialized);
    }

    #[test]
    fn test_create_writes_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        manager.set_state_capture_callback(|| vec![1, 2, 3]);

        let id = manager.create_recovery_point();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        let path = dir.path().join(format!("{id}.json"));
        let doc: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc["id"], id);
        assert_eq!(doc["size"], 3);
        assert_eq!(doc["isConsistent"], true);
        assert_eq!(doc["state"], "AQID");
        assert_eq!(doc["checksum"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_round_trip_delivers_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        manager.set_state_capture_callback(|| vec![0x01, 0x02, 0x03]);

        let id = manager.create_recovery_point();
        assert!(!id.is_empty());

        let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            manager.set_state_restore_callback(move |bytes| {
                *seen.lock().unwrap() = bytes.to_vec();
                true
            });
        }
        assert!(manager.restore_from_point(&id));
        assert_eq!(*seen.lock().unwrap(), vec![0x01, 0x02, 0x03]);
        assert_eq!(
            checksum_hex(&[0x01, 0x02, 0x03]),
            serde_json::from_slice::<RecoveryPoint>(
                &fs::read(dir.path().join(format!("{id}.json"))).unwrap()
            )
            .unwrap()
            .checksum
        );
    }

    #[test]
    fn test_compressed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.point.enable_compression = true;
        let manager = RecoveryManager::new(config);
        assert!(manager.initialize());

        let blob = vec![0xABu8; 4096];
        {
            let blob = blob.clone();
            manager.set_state_capture_callback(move || blob.clone());
        }
        let id = manager.create_recovery_point();
        let point: RecoveryPoint = serde_json::from_slice(
            &fs::read(dir.path().join(format!("{id}.json"))).unwrap(),
        )
        .unwrap();
        assert!(point.is_compressed());
        assert!(point.state.len() < blob.len());
        assert_eq!(point.size, 4096);

        let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            manager.set_state_restore_callback(move |bytes| {
                *seen.lock().unwrap() = bytes.to_vec();
                true
            });
        }
        assert!(manager.restore_from_point(&id));
        assert_eq!(*seen.lock().unwrap(), blob);
    }

    #[test]
    fn test_restore_rejects_tampered_state() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        manager.set_state_capture_callback(|| b"genuine".to_vec());
        let id = manager.create_recovery_point();

        // Corrupt the stored checksum.
        let path = dir.path().join(format!("{id}.json"));
        let mut doc: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        doc["checksum"] = serde_json::Value::String("0".repeat(64));
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let restored = Arc::new(AtomicUsize::new(0));
        {
            let restored = Arc::clone(&restored);
            manager.set_state_restore_callback(move |_| {
                restored.fetch_add(1, Ordering::SeqCst);
                true
            });
        }
        assert!(!manager.restore_from_point(&id));
        assert_eq!(restored.load(Ordering::SeqCst), 0);
        assert_eq!(manager.metrics().failed_recoveries, 1);
    }

    #[test]
    fn test_restore_callback_rejection_fails_restore() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        let id = manager.create_recovery_point();
        manager.set_state_restore_callback(|_| false);
        assert!(!manager.restore_from_point(&id));
        assert_eq!(manager.state(), RecoveryState::Initialized);
    }

    #[test]
    fn test_missing_point_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        let errors = Arc::new(AtomicUsize::new(0));
        {
            let errors = Arc::clone(&errors);
            manager.set_error_callback(move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(!manager.restore_from_point("feedfacefeedface"));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_blob_without_capture_callback() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        let id = manager.create_recovery_point();
        let point: RecoveryPoint = serde_json::from_slice(
            &fs::read(dir.path().join(format!("{id}.json"))).unwrap(),
        )
        .unwrap();
        assert_eq!(point.state, DEFAULT_STATE.to_vec());
    }

    #[test]
    fn test_oldest_points_evicted_past_bound() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        let mut ids = Vec::new();
        for _ in 0..7 {
            let id = manager.create_recovery_point();
            assert!(!id.is_empty());
            ids.push(id);
            // Distinct millisecond timestamps keep the age ordering strict.
            std::thread::sleep(Duration::from_millis(2));
        }
        let remaining = manager.point_ids();
        assert_eq!(remaining.len(), 5);
        assert!(!remaining.contains(&ids[0]));
        assert!(!remaining.contains(&ids[1]));
        assert!(!dir.path().join(format!("{}.json", ids[0])).exists());
        assert!(remaining.contains(&ids[6]));
    }

    #[test]
    fn test_delete_removes_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        let id = manager.create_recovery_point();
        assert!(dir.path().join(format!("{id}.json")).exists());
        manager.delete_recovery_point(&id);
        assert!(manager.point_ids().is_empty());
        assert!(!dir.path().join(format!("{id}.json")).exists());
    }

    #[test]
    fn test_validate_state_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        assert!(manager.validate_state(&[1]));
        assert!(!manager.validate_state(&[]));
        let mut config = manager.configuration();
        config.enable_state_validation = false;
        manager.set_configuration(config);
        assert!(manager.validate_state(&[]));
    }

    #[test]
    fn test_shutdown_is_terminal_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = initialized_manager(dir.path());
        manager.shutdown();
        manager.shutdown();
        assert_eq!(manager.state(), RecoveryState::ShutDown);
        assert!(manager.create_recovery_point().is_empty());
        assert!(!manager.initialize());
    }

    #[test]
    fn test_create_before_initialize_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = RecoveryManager::new(test_config(dir.path()));
        assert!(manager.create_recovery_point().is_empty());
    }
}
