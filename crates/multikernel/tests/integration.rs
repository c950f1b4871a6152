//! Integration tests for the multikernel substrate.
//!
//! These exercise cross-component flows: cache semantics under churn,
//! balancer dispatch ordering, recovery round-trips and pool drain.

use multikernel::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

fn inline_kernel_config() -> KernelConfig {
    // No worker pool: scheduled closures run inline, which makes dispatch
    // order directly observable.
    KernelConfig {
        cache: CacheSettings {
            initial_capacity: 128,
            ..Default::default()
        },
        pool: None,
        recovery: None,
    }
}

fn pooled_kernel_config() -> KernelConfig {
    KernelConfig {
        cache: CacheSettings {
            initial_capacity: 128,
            ..Default::default()
        },
        pool: Some(WorkerPoolConfig {
            min_threads: 1,
            max_threads: 2,
            queue_capacity: 128,
            stack_size: 256 * 1024,
        }),
        recovery: None,
    }
}

fn inline_kernel(id: &str) -> Arc<MicroKernel> {
    let kernel = MicroKernel::with_config(id, inline_kernel_config()).unwrap();
    assert!(kernel.initialize());
    Arc::new(kernel)
}

fn idle_metrics() -> KernelMetrics {
    KernelMetrics {
        cpu_usage: 0.2,
        memory_usage: 0.2,
        network_bandwidth: 500.0,
        disk_io: 200.0,
        energy_consumption: 40.0,
        cpu_task_efficiency: 0.8,
        io_task_efficiency: 0.7,
        memory_task_efficiency: 0.6,
        network_task_efficiency: 0.9,
    }
}

// ============================================================================
// S1/S2 — Cache scenarios
// ============================================================================

#[test]
fn test_capacity_one_cache_lru() {
    let cache: DynamicCache<String, i32> = DynamicCache::new(1, 0);
    cache.put("a".to_string(), 1);
    cache.put("b".to_string(), 2);
    assert_eq!(cache.get(&"a".to_string()), None);
    assert_eq!(cache.get(&"b".to_string()), Some(2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_ttl_expiry_with_cleanup() {
    let cache: DynamicCache<String, Vec<u8>> = DynamicCache::new(10, 0);
    cache.put_with_ttl("k".to_string(), vec![42], 1);
    assert_eq!(cache.get(&"k".to_string()), Some(vec![42]));
    std::thread::sleep(Duration::from_secs(2));
    cache.cleanup_sync();
    assert_eq!(cache.get(&"k".to_string()), None);
    assert_eq!(cache.len(), 0);
}

// ============================================================================
// S3 — Load balancer priority split
// ============================================================================

#[test]
fn test_high_priority_dispatched_first() {
    let a = inline_kernel("s3-a");
    let b = inline_kernel("s3-b");
    let order: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
    for kernel in [&a, &b] {
        let order = Arc::clone(&order);
        kernel.core().set_task_callback(move |task| {
            order.lock().unwrap().push(task.priority);
        });
    }
    let kernels: Vec<SharedKernel> = vec![a, b];
    let metrics = vec![idle_metrics(), idle_metrics()];

    let tasks: Vec<TaskDescriptor> = [1, 8, 2, 9]
        .iter()
        .enumerate()
        .map(|(i, &priority)| TaskDescriptor::new(vec![i as u8; 2048], priority))
        .collect();

    let balancer = LoadBalancer::new();
    balancer.balance(&kernels, &tasks, &metrics);

    let recorded = order.lock().unwrap().clone();
    assert_eq!(recorded, vec![8, 9, 1, 2]);
}

// ============================================================================
// S4 — Strategy switch at saturation
// ============================================================================

#[test]
fn test_saturation_switches_to_workload_specific() {
    let weak = inline_kernel("s4-weak");
    let strong = inline_kernel("s4-strong");
    let strong_hits = Arc::new(AtomicUsize::new(0));
    {
        let strong_hits = Arc::clone(&strong_hits);
        strong.core().set_task_callback(move |_| {
            strong_hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    let kernels: Vec<SharedKernel> = vec![weak, strong];

    let saturated = |cpu_eff: f64| KernelMetrics {
        cpu_usage: 0.95,
        memory_usage: 0.95,
        cpu_task_efficiency: cpu_eff,
        ..idle_metrics()
    };
    let metrics = vec![saturated(0.4), saturated(0.9)];

    let balancer = LoadBalancer::new();
    balancer.set_strategy(BalancingStrategy::ResourceAware);
    let task = TaskDescriptor::with_type(vec![0u8; 2048], 5, TaskType::CpuIntensive);
    balancer.balance(&kernels, &[task], &metrics);

    assert_eq!(balancer.strategy(), BalancingStrategy::WorkloadSpecific);
    assert_eq!(balancer.decisions().workload_specific, 1);
    assert_eq!(strong_hits.load(Ordering::SeqCst), 1);
}

// ============================================================================
// S5 — Recovery round-trip
// ============================================================================

#[test]
fn test_recovery_round_trip_with_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let config = RecoveryConfig {
        enable_state_validation: true,
        point: RecoveryPointConfig {
            storage_path: dir.path().to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    };
    let manager = RecoveryManager::new(config);
    assert!(manager.initialize());

    manager.set_state_capture_callback(|| vec![0x01, 0x02, 0x03]);
    let point = manager.create_recovery_point();
    assert!(!point.is_empty());

    let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(vec![0xFF]));
    {
        let seen = Arc::clone(&seen);
        manager.set_state_restore_callback(move |bytes| {
            *seen.lock().unwrap() = bytes.to_vec();
            true
        });
    }
    assert!(manager.restore_from_point(&point));
    let delivered = seen.lock().unwrap().clone();
    assert_eq!(delivered, vec![0x01, 0x02, 0x03]);

    let mut hasher = Sha256::new();
    hasher.update(&delivered);
    let expected = format!("{:x}", hasher.finalize());

    let raw = std::fs::read(dir.path().join(format!("{point}.json"))).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(doc["checksum"].as_str().unwrap(), expected);
    assert_eq!(doc["size"].as_u64().unwrap(), 3);
    assert_eq!(doc["isConsistent"].as_bool().unwrap(), true);
}

// ============================================================================
// S6 — Worker pool drain
// ============================================================================

#[test]
fn test_pool_drains_thousand_tasks() {
    let pool = WorkerPool::new(WorkerPoolConfig {
        min_threads: 2,
        max_threads: 4,
        queue_capacity: 100,
        stack_size: 256 * 1024,
    })
    .unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..1000 {
        loop {
            let counter = Arc::clone(&counter);
            match pool.submit(move || {
                std::thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            }) {
                Ok(()) => break,
                Err(KernelError::QueueFull { .. }) => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(other) => panic!("unexpected submit failure: {other}"),
            }
        }
    }
    pool.wait_for_completion();
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
    let metrics = pool.metrics();
    assert_eq!(metrics.queue_size, 0);
    assert_eq!(metrics.active_threads, 0);
}

// ============================================================================
// P4 — Idempotent shutdown across components
// ============================================================================

#[test]
fn test_shutdown_idempotent_everywhere() {
    let kernel = MicroKernel::with_config("p4-kernel", pooled_kernel_config()).unwrap();
    assert!(kernel.initialize());
    kernel.shutdown();
    kernel.shutdown();
    assert!(!kernel.is_running());

    let dir = tempfile::tempdir().unwrap();
    let manager = RecoveryManager::new(RecoveryConfig {
        point: RecoveryPointConfig {
            storage_path: dir.path().to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    });
    assert!(manager.initialize());
    manager.shutdown();
    manager.shutdown();
    assert_eq!(manager.state(), RecoveryState::ShutDown);

    let pool = WorkerPool::new(WorkerPoolConfig::default()).unwrap();
    pool.stop();
    pool.stop();
}

// ============================================================================
// P7/P8 — Weight normalization and tie-break fairness
// ============================================================================

#[test]
fn test_weights_normalize_to_one() {
    let balancer = LoadBalancer::new();
    balancer.set_resource_weights(1.0, 1.0, 1.0, 1.0);
    let (cpu, memory, network, energy) = balancer.resource_weights();
    assert!((cpu + memory + network + energy - 1.0).abs() < 1e-9);
    assert!((cpu - 0.25).abs() < 1e-9);
}

#[test]
fn test_tie_break_visits_all_kernels_round_robin() {
    let kernels: Vec<Arc<MicroKernel>> = (0..3)
        .map(|i| inline_kernel(&format!("p8-{i}")))
        .collect();
    let hits: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let sequence: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    for (kernel, hit) in kernels.iter().zip(&hits) {
        let hit = Arc::clone(hit);
        let sequence = Arc::clone(&sequence);
        let id = kernel.id();
        kernel.core().set_task_callback(move |_| {
            hit.fetch_add(1, Ordering::SeqCst);
            sequence.lock().unwrap().push(id.clone());
        });
    }
    let shared: Vec<SharedKernel> = kernels.iter().map(|k| Arc::clone(k) as SharedKernel).collect();
    let metrics = vec![idle_metrics(); 3];

    let balancer = LoadBalancer::new();
    balancer.set_strategy(BalancingStrategy::ResourceAware);
    for i in 0..6 {
        let tasks = vec![TaskDescriptor::new(vec![i as u8; 2048], 5)];
        balancer.balance(&shared, &tasks, &metrics);
    }

    for hit in &hits {
        assert_eq!(hit.load(Ordering::SeqCst), 2);
    }
    let recorded = sequence.lock().unwrap().clone();
    assert_eq!(recorded[0..3], recorded[3..6]);
}

// ============================================================================
// Property — cache behaves like an ordered reference model
// ============================================================================

#[test]
fn test_cache_matches_reference_model() {
    const CAPACITY: usize = 8;
    let cache: DynamicCache<u32, u32> = DynamicCache::new(CAPACITY, 0);
    let mut model: Vec<(u32, u32)> = Vec::new(); // LRU order: front = oldest

    // Deterministic operation stream.
    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for _ in 0..4000 {
        let op = next() % 3;
        let key = (next() % 24) as u32;
        match op {
            0 => {
                let value = (next() % 1000) as u32;
                if let Some(pos) = model.iter().position(|(k, _)| *k == key) {
                    model.remove(pos);
                } else if model.len() == CAPACITY {
                    model.remove(0);
                }
                model.push((key, value));
                cache.put(key, value);
            }
            1 => {
                let expected = model.iter().position(|(k, _)| *k == key).map(|pos| {
                    let entry = model.remove(pos);
                    model.push(entry);
                    model.last().unwrap().1
                });
                assert_eq!(cache.get(&key), expected);
            }
            _ => {
                model.retain(|(k, _)| *k != key);
                cache.remove(&key);
            }
        }
        assert!(cache.len() <= CAPACITY);
        assert_eq!(cache.len(), model.len());
    }

    let exported = cache.export_all();
    let model_map: HashMap<u32, u32> = model.into_iter().collect();
    assert_eq!(exported, model_map);
}

// ============================================================================
// Property — balancer counters account for every task
// ============================================================================

#[test]
fn test_decision_counters_account_for_all_tasks() {
    let kernels: Vec<SharedKernel> = vec![inline_kernel("ct-a"), inline_kernel("ct-b")];
    let metrics = vec![idle_metrics(), idle_metrics()];
    let balancer = LoadBalancer::new();

    let mut dispatched = 0u64;
    for round in 0..5 {
        let tasks: Vec<TaskDescriptor> = (0..round + 1)
            .map(|i| TaskDescriptor::new(vec![i as u8; 2048], (i % 11) as i32))
            .collect();
        dispatched += tasks.len() as u64;
        balancer.balance(&kernels, &tasks, &metrics);
    }

    let counters = balancer.decisions();
    assert_eq!(counters.total, dispatched);
    assert_eq!(counters.per_strategy_sum(), dispatched);
}

// ============================================================================
// End-to-end — orchestration over heterogeneous kernels
// ============================================================================

#[test]
fn test_orchestration_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = inline_kernel_config();
    config.recovery = Some(RecoveryConfig {
        enable_state_validation: false,
        point: RecoveryPointConfig {
            storage_path: dir.path().to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    });
    let orchestrator = OrchestrationKernel::with_config("e2e-orchestrator", config).unwrap();
    assert!(orchestrator.initialize());

    let compute = ComputationalKernel::with_config("e2e-compute", inline_kernel_config()).unwrap();
    assert!(compute.initialize());
    let micro = inline_kernel("e2e-micro");

    let processed = Arc::new(AtomicUsize::new(0));
    for core in [compute.core(), micro.core()] {
        let processed = Arc::clone(&processed);
        core.set_task_callback(move |_| {
            processed.fetch_add(1, Ordering::SeqCst);
        });
    }

    let targets: Vec<SharedKernel> = vec![Arc::new(compute), micro];
    for i in 0..6u8 {
        orchestrator.enqueue_task(vec![i; 2048], i32::from(i));
    }
    orchestrator.orchestrate(&targets);

    assert_eq!(orchestrator.pending_len(), 0);
    assert_eq!(processed.load(Ordering::SeqCst), 6);
    assert_eq!(orchestrator.balancer().decisions().total, 6);
    // The orchestration round ends in a persisted checkpoint.
    assert_eq!(
        orchestrator
            .core()
            .with_recovery(|rm| rm.metrics().total_points)
            .unwrap(),
        1
    );
}

// ============================================================================
// Kernel contract — uniform behavior across all variants
// ============================================================================

fn all_variants() -> Vec<SharedKernel> {
    let mut orchestration_config = inline_kernel_config();
    orchestration_config.recovery = None;
    vec![
        Arc::new(MicroKernel::with_config("contract-micro", pooled_kernel_config()).unwrap()),
        Arc::new(
            ComputationalKernel::with_config("contract-compute", pooled_kernel_config()).unwrap(),
        ),
        Arc::new(
            ArchitecturalKernel::with_profile(
                "contract-arch",
                inline_kernel_config(),
                PlatformProfile::for_parallelism(2),
            )
            .unwrap(),
        ),
        Arc::new(CryptoMicroKernel::with_config("contract-crypto", pooled_kernel_config()).unwrap()),
        Arc::new(
            ParentKernel::with_configs(
                "contract-parent",
                pooled_kernel_config(),
                orchestration_config.clone(),
            )
            .unwrap(),
        ),
        Arc::new(
            OrchestrationKernel::with_config("contract-orch", orchestration_config).unwrap(),
        ),
    ]
}

#[test]
fn test_lifecycle_uniform_across_variants() {
    for kernel in all_variants() {
        assert!(!kernel.is_running(), "{} started early", kernel.id());
        assert!(kernel.initialize(), "{} failed to initialize", kernel.id());
        assert!(kernel.is_running());

        kernel.pause();
        assert!(!kernel.is_running(), "{} still running after pause", kernel.id());
        kernel.resume();
        assert!(kernel.is_running());

        kernel.shutdown();
        kernel.shutdown();
        assert!(!kernel.is_running());

        kernel.reset();
        assert!(kernel.initialize(), "{} failed to re-initialize", kernel.id());
        kernel.shutdown();
    }
}

#[test]
fn test_process_task_uniform_across_variants() {
    for kernel in all_variants() {
        assert!(kernel.initialize());
        let task = TaskDescriptor::with_type(vec![0xAB; 256], 6, TaskType::Mixed);
        assert!(kernel.process_task(&task), "{} rejected a task", kernel.id());
        kernel.update_metrics();
        let projected = kernel.extended_metrics().project();
        assert!(projected.cpu_usage >= 0.0 && projected.cpu_usage <= 1.0);
        kernel.shutdown();
    }
}

#[test]
fn test_stopped_kernels_reject_tasks() {
    for kernel in all_variants() {
        let task = TaskDescriptor::new(vec![1, 2, 3], 5);
        assert!(
            !kernel.process_task(&task),
            "{} accepted a task before initialize",
            kernel.id()
        );
        assert!(!kernel.schedule_task(Box::new(|| {}), 5));
    }
}

#[test]
fn test_features_and_resources_uniform() {
    for kernel in all_variants() {
        assert!(kernel.initialize());
        assert!(
            !kernel.supported_features().is_empty(),
            "{} reports no features",
            kernel.id()
        );
        // Unknown resources are a logged no-op everywhere.
        kernel.set_resource_limit("gpu", 1.0);
        assert_eq!(kernel.resource_usage("gpu"), 0.0);
        // The cache limit is applied immediately.
        kernel.set_resource_limit("cache", 8.0);
        assert!(kernel.resource_usage("cache") <= 8.0);
        kernel.shutdown();
    }
}

// ============================================================================
// End-to-end — preload warm-up
// ============================================================================

#[test]
fn test_preload_warmup_flow() {
    let preload = PreloadManager::new(PreloadConfig::default());
    assert!(preload.initialize());
    assert!(preload.add_data("warm-1", vec![1]));
    assert!(preload.add_data("warm-2", vec![2]));

    let kernel = inline_kernel("warmup");
    let warmed = Arc::new(AtomicUsize::new(0));
    {
        let warmed = Arc::clone(&warmed);
        kernel.core().set_event_callback(move |event, _| {
            if event == "warmup_completed" {
                warmed.fetch_add(1, Ordering::SeqCst);
            }
        });
    }
    let loaded = kernel.core().warmup_from_preload(&preload);
    assert_eq!(loaded, 2);
    assert_eq!(
        kernel.core().cache().get(&"warm-1".to_string()),
        Some(vec![1])
    );
    assert_eq!(warmed.load(Ordering::SeqCst), 1);
}

// ============================================================================
// End-to-end — parent kernel adaptation
// ============================================================================

#[test]
fn test_parent_kernel_flow() {
    let mut orchestration_config = inline_kernel_config();
    orchestration_config.recovery = None;
    let parent = ParentKernel::with_configs(
        "e2e-parent",
        pooled_kernel_config(),
        orchestration_config,
    )
    .unwrap();

    parent.add_child(inline_kernel("e2e-child-a") as SharedKernel);
    parent.add_child(inline_kernel("e2e-child-b") as SharedKernel);
    assert!(parent.initialize());
    assert!(parent.is_running());

    parent.orchestration().enqueue_task(vec![7u8; 2048], 9);
    parent.orchestration().enqueue_task(vec![8u8; 2048], 1);
    parent.orchestrate_tasks();
    assert_eq!(parent.orchestration().pending_len(), 0);

    parent.update_metrics();
    parent.balance_load();

    parent.shutdown();
    assert!(!parent.is_running());
    assert!(parent.children().is_empty());
}
