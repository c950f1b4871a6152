//! Hybrid adaptive load balancer.
//!
//! Maps tasks to kernels using resource-aware and workload-specific scoring
//! with automatic strategy switching under saturation. The balancer is
//! stateless with respect to kernels (they are passed per call) and holds
//! an internal mutex only over its weights, cursor and counters; it takes
//! no locks on the kernels it selects.

mod orchestrator;

pub use orchestrator::TaskOrchestrator;

use crate::kernel::SharedKernel;
use crate::task::{KernelMetrics, TaskDescriptor, TaskType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info};

/// Scores within this distance count as equal for the round-robin tie-break.
const SCORE_EPSILON: f64 = 0.001;

/// Mean utilization above which the adaptive switch toggles strategies.
const SATURATION_THRESHOLD: f64 = 0.9;

/// Balancing strategies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancingStrategy {
    /// Score by free CPU/memory/network/energy.
    ResourceAware,
    /// Score by per-task-type efficiency.
    WorkloadSpecific,
    /// Weighted blend of the two scores.
    #[default]
    HybridAdaptive,
    /// Reserved; behaves as `HybridAdaptive`.
    PriorityAdaptive,
    /// Pick the kernel with the lowest CPU usage.
    LeastLoaded,
    /// Rotate through kernels.
    RoundRobin,
}

impl BalancingStrategy {
    /// Returns the strategy's external name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceAware => "resource_aware",
            Self::WorkloadSpecific => "workload_specific",
            Self::HybridAdaptive => "hybrid_adaptive",
            Self::PriorityAdaptive => "priority_adaptive",
            Self::LeastLoaded => "least_loaded",
            Self::RoundRobin => "round_robin",
        }
    }

    /// Parse an external name; unknown names map to `PriorityAdaptive`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "resource_aware" => Self::ResourceAware,
            "workload_specific" => Self::WorkloadSpecific,
            "hybrid_adaptive" => Self::HybridAdaptive,
            "least_loaded" => Self::LeastLoaded,
            "round_robin" => Self::RoundRobin,
            _ => Self::PriorityAdaptive,
        }
    }
}

impl fmt::Display for BalancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dispatch decisions recorded per strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecisionCounters {
    /// Decisions made by the resource-aware score.
    pub resource_aware: u64,
    /// Decisions made by the workload-specific score.
    pub workload_specific: u64,
    /// Decisions made by the hybrid blend.
    pub hybrid_adaptive: u64,
    /// Decisions made under the reserved strategy.
    pub priority_adaptive: u64,
    /// Decisions made by least-loaded selection.
    pub least_loaded: u64,
    /// Decisions made by rotation.
    pub round_robin: u64,
    /// All decisions.
    pub total: u64,
}

impl DecisionCounters {
    /// Sum of the per-strategy counters.
    #[must_use]
    pub fn per_strategy_sum(&self) -> u64 {
        self.resource_aware
            + self.workload_specific
            + self.hybrid_adaptive
            + self.priority_adaptive
            + self.least_loaded
            + self.round_robin
    }
}

/// Resource score weights; normalized to sum to 1.
#[derive(Clone, Copy, Debug)]
struct ResourceWeights {
    cpu: f64,
    memory: f64,
    network: f64,
    energy: f64,
}

impl Default for ResourceWeights {
    fn default() -> Self {
        Self {
            cpu: 0.30,
            memory: 0.25,
            network: 0.25,
            energy: 0.20,
        }
    }
}

struct BalancerState {
    strategy: BalancingStrategy,
    rr_cursor: usize,
    weights: ResourceWeights,
    resource_threshold: f64,
    workload_threshold: f64,
    counters: DecisionCounters,
}

/// Per-task kernel selection over live metrics.
pub struct LoadBalancer {
    state: Mutex<BalancerState>,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer {
    /// Create a balancer with the hybrid adaptive strategy and default
    /// weights.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BalancerState {
                strategy: BalancingStrategy::HybridAdaptive,
                rr_cursor: 0,
                weights: ResourceWeights::default(),
                resource_threshold: 0.8,
                workload_threshold: 0.7,
                counters: DecisionCounters::default(),
            }),
        }
    }

    /// Dispatch `tasks` across `kernels`.
    ///
    /// No-op unless `kernels` is non-empty and `metrics` matches it
    /// one-to-one. High-priority tasks dispatch before low-priority ones;
    /// relative order within each class is preserved. Each selected kernel
    /// receives a closure wrapping the task via `schedule_task`.
    pub fn balance(
        &self,
        kernels: &[SharedKernel],
        tasks: &[TaskDescriptor],
        metrics: &[KernelMetrics],
    ) {
        let mut state = self.state.lock().unwrap();
        if kernels.is_empty() || tasks.is_empty() || metrics.len() != kernels.len() {
            return;
        }
        info!(
            tasks = tasks.len(),
            kernels = kernels.len(),
            strategy = %state.strategy,
            "Balancing tasks"
        );

        if saturated(metrics) {
            match state.strategy {
                BalancingStrategy::ResourceAware => {
                    state.strategy = BalancingStrategy::WorkloadSpecific;
                    info!("Saturation detected, switching to workload-specific strategy");
                }
                BalancingStrategy::WorkloadSpecific => {
                    state.strategy = BalancingStrategy::ResourceAware;
                    info!("Saturation detected, switching to resource-aware strategy");
                }
                _ => {}
            }
        }

        let (high, low): (Vec<&TaskDescriptor>, Vec<&TaskDescriptor>) =
            tasks.iter().partition(|t| t.is_high_priority());

        for task in high.into_iter().chain(low) {
            let selected = self.select(&mut state, metrics, task);
            let kernel = &kernels[selected];
            let wrapped = task.clone();
            // The queued closure holds only a weak handle: a kernel must not
            // be kept alive by work sitting in its own queue.
            let target = std::sync::Arc::downgrade(kernel);
            kernel.schedule_task(
                Box::new(move || {
                    if let Some(kernel) = target.upgrade() {
                        kernel.process_task(&wrapped);
                    }
                }),
                task.priority,
            );
            debug!(
                strategy = %state.strategy,
                kernel = selected,
                kind = %task.task_type,
                priority = task.priority,
                "Task dispatched"
            );
        }

        let counters = state.counters;
        if counters.total > 0 {
            debug!(
                total = counters.total,
                resource_aware = counters.resource_aware,
                workload_specific = counters.workload_specific,
                "Balancing decision counters"
            );
        }
    }

    fn select(
        &self,
        state: &mut BalancerState,
        metrics: &[KernelMetrics],
        task: &TaskDescriptor,
    ) -> usize {
        let (selected, strategy) = match state.strategy {
            BalancingStrategy::ResourceAware => (
                select_resource_aware(state, metrics, task),
                BalancingStrategy::ResourceAware,
            ),
            BalancingStrategy::WorkloadSpecific => (
                select_workload_specific(state, metrics, task),
                BalancingStrategy::WorkloadSpecific,
            ),
            BalancingStrategy::HybridAdaptive => (
                select_hybrid(state, metrics, task),
                BalancingStrategy::HybridAdaptive,
            ),
            BalancingStrategy::PriorityAdaptive => (
                select_hybrid(state, metrics, task),
                BalancingStrategy::PriorityAdaptive,
            ),
            BalancingStrategy::LeastLoaded => (
                select_least_loaded(metrics),
                BalancingStrategy::LeastLoaded,
            ),
            BalancingStrategy::RoundRobin => {
                (advance_cursor(state, metrics.len()), BalancingStrategy::RoundRobin)
            }
        };
        let counters = &mut state.counters;
        match strategy {
            BalancingStrategy::ResourceAware => counters.resource_aware += 1,
            BalancingStrategy::WorkloadSpecific => counters.workload_specific += 1,
            BalancingStrategy::HybridAdaptive => counters.hybrid_adaptive += 1,
            BalancingStrategy::PriorityAdaptive => counters.priority_adaptive += 1,
            BalancingStrategy::LeastLoaded => counters.least_loaded += 1,
            BalancingStrategy::RoundRobin => counters.round_robin += 1,
        }
        counters.total += 1;
        selected
    }

    /// Set the strategy by external name; unknown names map to
    /// `PriorityAdaptive`.
    pub fn set_strategy_name(&self, name: &str) {
        self.set_strategy(BalancingStrategy::from_name(name));
    }

    /// Set the strategy.
    pub fn set_strategy(&self, strategy: BalancingStrategy) {
        let mut state = self.state.lock().unwrap();
        state.strategy = strategy;
        debug!(strategy = %strategy, "Strategy set");
    }

    /// Current strategy.
    #[must_use]
    pub fn strategy(&self) -> BalancingStrategy {
        self.state.lock().unwrap().strategy
    }

    /// Set the resource score weights; they are normalized to sum to 1.
    pub fn set_resource_weights(&self, cpu: f64, memory: f64, network: f64, energy: f64) {
        let sum = cpu + memory + network + energy;
        if sum <= 0.0 {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.weights = ResourceWeights {
            cpu: cpu / sum,
            memory: memory / sum,
            network: network / sum,
            energy: energy / sum,
        };
        info!(cpu, memory, network, energy, "Resource weights updated");
    }

    /// Current normalized resource weights `(cpu, memory, network, energy)`.
    #[must_use]
    pub fn resource_weights(&self) -> (f64, f64, f64, f64) {
        let state = self.state.lock().unwrap();
        let w = state.weights;
        (w.cpu, w.memory, w.network, w.energy)
    }

    /// Set the adaptive thresholds.
    pub fn set_adaptive_thresholds(&self, resource: f64, workload: f64) {
        let mut state = self.state.lock().unwrap();
        state.resource_threshold = resource;
        state.workload_threshold = workload;
        info!(resource, workload, "Adaptive thresholds updated");
    }

    /// Current `(resource, workload)` adaptive thresholds.
    #[must_use]
    pub fn adaptive_thresholds(&self) -> (f64, f64) {
        let state = self.state.lock().unwrap();
        (state.resource_threshold, state.workload_threshold)
    }

    /// Snapshot of the decision counters.
    #[must_use]
    pub fn decisions(&self) -> DecisionCounters {
        self.state.lock().unwrap().counters
    }
}

fn saturated(metrics: &[KernelMetrics]) -> bool {
    let n = metrics.len() as f64;
    let avg_cpu = metrics.iter().map(|m| m.cpu_usage).sum::<f64>() / n;
    let avg_memory = metrics.iter().map(|m| m.memory_usage).sum::<f64>() / n;
    avg_cpu > SATURATION_THRESHOLD || avg_memory > SATURATION_THRESHOLD
}

fn advance_cursor(state: &mut BalancerState, len: usize) -> usize {
    let selected = state.rr_cursor % len;
    state.rr_cursor = (state.rr_cursor + 1) % len;
    selected
}

/// Resource availability score; lower is better.
fn resource_score(weights: &ResourceWeights, m: &KernelMetrics, task: &TaskDescriptor) -> f64 {
    let cpu_score = (1.0 - m.cpu_usage) * weights.cpu;
    let mut memory_score = (1.0 - m.memory_usage) * weights.memory;
    if task.est_memory_bytes > 0 {
        memory_score *= 1.0 - task.est_memory_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    }
    let network_score = (m.network_bandwidth / 1000.0) * weights.network;
    let energy_score = (1.0 - m.energy_consumption / 100.0) * weights.energy;
    cpu_score + memory_score + network_score + energy_score
}

/// Workload fit score; lower is better.
fn workload_score(m: &KernelMetrics, task: &TaskDescriptor) -> f64 {
    let mut efficiency = m.efficiency_for(task.task_type);
    match task.task_type {
        TaskType::CpuIntensive => efficiency *= 1.0 - m.cpu_usage * 0.3,
        TaskType::IoIntensive => efficiency *= 1.0 + m.disk_io / 1000.0 * 0.1,
        TaskType::MemoryIntensive => efficiency *= 1.0 - m.memory_usage * 0.3,
        TaskType::NetworkIntensive => efficiency *= 1.0 + m.network_bandwidth / 1000.0 * 0.1,
        TaskType::Mixed => {}
    }
    1.0 - efficiency.clamp(0.0, 1.0)
}

fn select_resource_aware(
    state: &mut BalancerState,
    metrics: &[KernelMetrics],
    task: &TaskDescriptor,
) -> usize {
    let scores: Vec<f64> = metrics
        .iter()
        .map(|m| resource_score(&state.weights, m, task))
        .collect();
    if all_within_epsilon(&scores) {
        return advance_cursor(state, metrics.len());
    }
    argmin(&scores)
}

fn select_workload_specific(
    _state: &mut BalancerState,
    metrics: &[KernelMetrics],
    task: &TaskDescriptor,
) -> usize {
    let scores: Vec<f64> = metrics.iter().map(|m| workload_score(m, task)).collect();
    argmin(&scores)
}

fn select_hybrid(
    state: &mut BalancerState,
    metrics: &[KernelMetrics],
    task: &TaskDescriptor,
) -> usize {
    let resource_scores: Vec<f64> = metrics
        .iter()
        .map(|m| resource_score(&state.weights, m, task))
        .collect();
    let workload_scores: Vec<f64> = metrics.iter().map(|m| workload_score(m, task)).collect();
    if all_within_epsilon(&resource_scores) && all_within_epsilon(&workload_scores) {
        return advance_cursor(state, metrics.len());
    }

    let combined: Vec<f64> = resource_scores
        .iter()
        .zip(&workload_scores)
        .map(|(&r, &w)| {
            let (mut resource_w, mut workload_w) = (0.6, 0.4);
            if task.task_type != TaskType::Mixed {
                resource_w = 0.3;
                workload_w = 0.7;
            }
            if r > state.resource_threshold {
                resource_w = 0.8;
                workload_w = 0.2;
            }
            resource_w * r + workload_w * w
        })
        .collect();
    argmin(&combined)
}

fn select_least_loaded(metrics: &[KernelMetrics]) -> usize {
    let scores: Vec<f64> = metrics.iter().map(|m| m.cpu_usage).collect();
    argmin(&scores)
}

fn all_within_epsilon(scores: &[f64]) -> bool {
    scores
        .iter()
        .all(|&s| (s - scores[0]).abs() <= SCORE_EPSILON)
}

fn argmin(scores: &[f64]) -> usize {
    let mut best = 0;
    let mut best_score = f64::MAX;
    for (i, &score) in scores.iter().enumerate() {
        if score < best_score {
            best_score = score;
            best = i;
        }
    }
    best
}
